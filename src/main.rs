//! Stuff - a catalog of things people own.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stuff::{
    catalog::{ApiKeys, MongoStore},
    config::{CheckConfig, Cli, Command, KeyConfig, ServeConfig},
    env_check::{all_passed, verify_environment},
    oidc::OidcClient,
    principal::Quartermasters,
    server::{create_router, AppState, RouterConfig, SessionAuth, SiteConfig},
    storage::{create_s3_client, S3Credentials, S3ImageStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config),
        Command::Key(config) => run_key(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Stuff v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Site: {}", config.external_url());
    info!("  Images: {}", config.image_url);
    info!("  Database: {}", config.mongodb_database);
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!("  OIDC issuer: {}", config.oidc_issuer);
    info!(
        "  CSRF: {}",
        if config.csrf_enabled { "enabled" } else { "disabled" }
    );
    info!("  Quartermasters: {}", config.quartermasters.len());

    // Connect to MongoDB
    info!("Connecting to MongoDB...");
    let store = match MongoStore::connect(&config.mongodb_uri, &config.mongodb_database).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to MongoDB: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = store.ensure_indexes().await {
        error!("Failed to create database indexes: {}", e);
        error!("  Please check that MONGODB_URI is reachable and the user may create indexes");
        return ExitCode::FAILURE;
    }
    info!("  Connected successfully");

    // Create S3 client
    let s3_client = create_s3_client(
        config.s3_endpoint.as_deref(),
        &config.s3_region,
        Some(S3Credentials {
            access_key: config.s3_key.clone(),
            secret_key: config.s3_secret.clone(),
        }),
    )
    .await;
    let images = S3ImageStore::new(s3_client, config.s3_bucket.clone());

    let session = SessionAuth::new(
        &config.secret_key,
        Quartermasters::new(config.quartermasters.clone()),
    )
    .with_ttl(Duration::from_secs(config.session_ttl))
    .with_secure_cookies(config.secure_cookies())
    .with_csrf(config.csrf_enabled);

    let oidc = OidcClient::new(
        &config.oidc_issuer,
        &config.oidc_client_id,
        &config.oidc_client_secret,
        config.redirect_uri(),
    );

    let site = SiteConfig::new(&config.image_url, &config.entity);
    let state = AppState::new(Arc::new(store), images, session, oidc, site);
    let router = create_router(state, build_router_config(&config));

    let addr = config.bind_address();
    info!("Server listening on http://{}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "stuff=debug,tower_http=debug"
    } else {
        "stuff=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new(config.entity.clone());

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config.with_tracing(!config.no_tracing)
}

// =============================================================================
// Check Command
// =============================================================================

fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Stuff Environment Check");
    println!("═══════════════════════");
    println!();

    let checks = verify_environment(|name| std::env::var(name).ok());
    for check in &checks {
        let mark = if check.passed { '✓' } else { '✗' };
        println!("{} {}: {}", mark, check.name, check.detail);
    }

    println!();
    println!("═══════════════════════");
    if all_passed(&checks) {
        println!("✓ All checks passed!");
        ExitCode::SUCCESS
    } else {
        let failed = checks.iter().filter(|c| !c.passed).count();
        println!("✗ {} check(s) failed", failed);
        ExitCode::FAILURE
    }
}

// =============================================================================
// Key Command
// =============================================================================

async fn run_key(config: KeyConfig) -> ExitCode {
    init_logging(false);

    let store = match MongoStore::connect(&config.mongodb_uri, &config.mongodb_database).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = store.ensure_indexes().await {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let keys = ApiKeys::new(Arc::new(store));
    match keys.generate_api_key(config.quartermaster).await {
        Ok(key) => {
            println!("{}", key.key);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
