//! Configuration management for Stuff.
//!
//! Every option can be given as a command-line flag or through the
//! environment variable named next to it:
//!
//! - `IMAGE_URL` - Public base URL images are served from (required)
//! - `MONGODB_URI` - MongoDB connection string (default: mongodb://localhost:27017)
//! - `MONGODB_DATABASE` - Database name (required)
//! - `SECRET_KEY` - Secret used to sign session cookies (required)
//! - `URL_SCHEME` - Scheme of the public URL (default: https)
//! - `SERVER_NAME` - Public host[:port] of the site (required)
//! - `OIDC_CLIENT_ID`, `OIDC_CLIENT_SECRET`, `OIDC_ISSUER` - Identity provider (required)
//! - `S3_BUCKET`, `S3_KEY`, `S3_SECRET` - Image bucket and credentials (required)
//! - `S3_ENDPOINT` - Custom endpoint for S3-compatible services
//! - `S3_REGION` - Region (default: us-east-1)
//! - `WTF_CSRF_ENABLED` - Require CSRF tokens on forms (default: false)
//! - `QUARTERMASTERS` - Comma-separated usernames with quartermaster rights
//! - `ENTITY` - Route noun for item pages, e.g. `game` (default: item)
//! - `SESSION_TTL` - Session lifetime in seconds (default: 43200)
//! - `HOST`, `PORT` - Bind address (default: 0.0.0.0:8080)

use clap::{ArgAction, Parser, Subcommand};
use url::Url;

use crate::env_check::parse_bool;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default MongoDB connection string.
pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";

/// Default public URL scheme.
pub const DEFAULT_URL_SCHEME: &str = "https";

/// Default route noun for item pages.
pub const DEFAULT_ENTITY: &str = "item";

/// Default session lifetime in seconds (12 hours).
pub const DEFAULT_SESSION_TTL: u64 = 12 * 60 * 60;

/// First path segments already taken by fixed routes.
const RESERVED_SEGMENTS: &[&str] = &[
    "api",
    "delete",
    "edit",
    "health",
    "login",
    "logout",
    "random",
    "redirect_uri",
    "submissions",
    "submit",
];

// =============================================================================
// CLI Arguments
// =============================================================================

/// Stuff - a catalog of things people own, with pictures.
#[derive(Parser, Debug, Clone)]
#[command(name = "stuff")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the web server.
    Serve(ServeConfig),

    /// Verify the environment variables the server needs, reporting each one.
    Check(CheckConfig),

    /// Issue a new API key directly against the database.
    ///
    /// This is how the first quartermaster key is created.
    Key(KeyConfig),
}

/// Configuration for the `serve` command.
#[derive(Parser, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Scheme of the public site URL (http or https).
    #[arg(long, default_value = DEFAULT_URL_SCHEME, env = "URL_SCHEME")]
    pub url_scheme: String,

    /// Public host (and optional port) of the site, e.g. stuff.example.com.
    #[arg(long, env = "SERVER_NAME")]
    pub server_name: String,

    /// Secret key for signing session cookies.
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Base URL item images are publicly served from.
    #[arg(long, env = "IMAGE_URL")]
    pub image_url: String,

    /// Route noun for item pages (`/<entity>/<name>`).
    #[arg(long, default_value = DEFAULT_ENTITY, env = "ENTITY")]
    pub entity: String,

    // =========================================================================
    // Database Configuration
    // =========================================================================
    /// MongoDB connection string.
    #[arg(long, default_value = DEFAULT_MONGODB_URI, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: String,

    /// MongoDB database name.
    #[arg(long, env = "MONGODB_DATABASE")]
    pub mongodb_database: String,

    // =========================================================================
    // OIDC Configuration
    // =========================================================================
    /// OpenID Connect issuer URL.
    #[arg(long, env = "OIDC_ISSUER")]
    pub oidc_issuer: String,

    /// OpenID Connect client ID.
    #[arg(long, env = "OIDC_CLIENT_ID")]
    pub oidc_client_id: String,

    /// OpenID Connect client secret.
    #[arg(long, env = "OIDC_CLIENT_SECRET", hide_env_values = true)]
    pub oidc_client_secret: String,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// S3 bucket holding item images.
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: String,

    /// S3 access key ID.
    #[arg(long, env = "S3_KEY")]
    pub s3_key: String,

    /// S3 secret access key.
    #[arg(long, env = "S3_SECRET", hide_env_values = true)]
    pub s3_secret: String,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Access Configuration
    // =========================================================================
    /// Require CSRF tokens on HTML form submissions.
    ///
    /// Any case of "true" enables the check; every other value disables it.
    #[arg(
        long,
        env = "WTF_CSRF_ENABLED",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_parser = parse_flag
    )]
    pub csrf_enabled: bool,

    /// Usernames with quartermaster rights (comma-separated).
    #[arg(long, env = "QUARTERMASTERS", value_delimiter = ',')]
    pub quartermasters: Vec<String>,

    /// Session lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL, env = "SESSION_TTL")]
    pub session_ttl: u64,

    /// Allowed CORS origins for the JSON API (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret_key.is_empty() {
            return Err("SECRET_KEY must not be empty".to_string());
        }

        if self.url_scheme != "http" && self.url_scheme != "https" {
            return Err(format!(
                "URL_SCHEME must be http or https, got '{}'",
                self.url_scheme
            ));
        }

        if self.server_name.is_empty() {
            return Err("SERVER_NAME is required".to_string());
        }
        if Url::parse(&self.external_url()).is_err() {
            return Err(format!(
                "URL_SCHEME and SERVER_NAME do not form a valid URL: {}",
                self.external_url()
            ));
        }

        validate_url("IMAGE_URL", &self.image_url)?;
        validate_url("OIDC_ISSUER", &self.oidc_issuer)?;
        if let Some(ref endpoint) = self.s3_endpoint {
            validate_url("S3_ENDPOINT", endpoint)?;
        }

        for (name, value) in [
            ("MONGODB_DATABASE", &self.mongodb_database),
            ("OIDC_CLIENT_ID", &self.oidc_client_id),
            ("OIDC_CLIENT_SECRET", &self.oidc_client_secret),
            ("S3_BUCKET", &self.s3_bucket),
            ("S3_KEY", &self.s3_key),
            ("S3_SECRET", &self.s3_secret),
        ] {
            if value.is_empty() {
                return Err(format!("{} must not be empty", name));
            }
        }

        validate_entity(&self.entity)?;

        if self.session_ttl == 0 {
            return Err("session_ttl must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Public base URL of the site, e.g. "https://stuff.example.com".
    pub fn external_url(&self) -> String {
        format!("{}://{}", self.url_scheme, self.server_name)
    }

    /// OIDC redirect URI registered with the identity provider.
    pub fn redirect_uri(&self) -> String {
        format!("{}/redirect_uri", self.external_url())
    }

    /// Whether cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.url_scheme == "https"
    }
}

/// Lenient boolean used for environment flags, matching `stuff check`.
fn parse_flag(value: &str) -> Result<bool, String> {
    Ok(parse_bool(value))
}

fn validate_url(name: &str, value: &str) -> Result<(), String> {
    match Url::parse(value) {
        Ok(url) if url.has_host() => Ok(()),
        _ => Err(format!("{} must be a valid URL, got '{}'", name, value)),
    }
}

fn validate_entity(entity: &str) -> Result<(), String> {
    let well_formed = !entity.is_empty()
        && entity
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    if !well_formed {
        return Err(format!(
            "entity must be a lowercase path segment, got '{}'",
            entity
        ));
    }
    if RESERVED_SEGMENTS.contains(&entity) {
        return Err(format!("entity '{}' collides with a built-in route", entity));
    }
    Ok(())
}

/// Configuration for the `check` command.
#[derive(Parser, Debug, Clone)]
pub struct CheckConfig {
    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Configuration for the `key` command.
#[derive(Parser, Debug, Clone)]
pub struct KeyConfig {
    /// MongoDB connection string.
    #[arg(long, default_value = DEFAULT_MONGODB_URI, env = "MONGODB_URI", hide_env_values = true)]
    pub mongodb_uri: String,

    /// MongoDB database name.
    #[arg(long, env = "MONGODB_DATABASE")]
    pub mongodb_database: String,

    /// Issue a quartermaster key instead of a read-only key.
    #[arg(long, default_value_t = false)]
    pub quartermaster: bool,
}

// =============================================================================
// Tests
// =============================================================================
