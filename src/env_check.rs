//! Environment verification for `stuff check`.
//!
//! Every variable is checked and reported, so an operator sees all problems
//! at once instead of the first one.

use url::Url;

use crate::config::DEFAULT_URL_SCHEME;

/// Result of checking one environment variable (or combination of them).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl EnvCheck {
    fn pass(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            detail: detail.into(),
        }
    }

    fn fail(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// Variables that only have to be present and non-empty.
const REQUIRED: &[&str] = &[
    "MONGODB_DATABASE",
    "SECRET_KEY",
    "OIDC_CLIENT_ID",
    "OIDC_CLIENT_SECRET",
    "S3_BUCKET",
    "S3_KEY",
    "S3_SECRET",
];

/// Variables that must hold an absolute URL.
const REQUIRED_URLS: &[&str] = &["IMAGE_URL", "OIDC_ISSUER"];

/// Check the environment as seen through `lookup`.
///
/// `lookup` is usually `|name| std::env::var(name).ok()`; tests pass a map.
pub fn verify_environment<F>(lookup: F) -> Vec<EnvCheck>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut checks = Vec::new();

    for &name in REQUIRED_URLS {
        checks.push(match get(name) {
            None => EnvCheck::fail(name, "not set"),
            Some(value) if is_url(&value) => EnvCheck::pass(name, value),
            Some(value) => EnvCheck::fail(name, format!("'{}' is not a valid URL", value)),
        });
    }

    for &name in REQUIRED {
        checks.push(match get(name) {
            Some(_) => EnvCheck::pass(name, "set"),
            None => EnvCheck::fail(name, "not set"),
        });
    }

    let scheme = get("URL_SCHEME").unwrap_or_else(|| DEFAULT_URL_SCHEME.to_string());
    checks.push(match get("SERVER_NAME") {
        None => EnvCheck::fail("SERVER_NAME", "not set"),
        Some(server) => {
            let combined = format!("{}://{}", scheme, server);
            if (scheme == "http" || scheme == "https") && is_url(&combined) {
                EnvCheck::pass("URL_SCHEME://SERVER_NAME", combined)
            } else {
                EnvCheck::fail(
                    "URL_SCHEME://SERVER_NAME",
                    format!("'{}' is not a valid URL", combined),
                )
            }
        }
    });

    checks.push(match get("S3_ENDPOINT") {
        None => EnvCheck::pass("S3_ENDPOINT", "not set, using the AWS endpoint"),
        Some(value) if is_url(&value) => EnvCheck::pass("S3_ENDPOINT", value),
        Some(value) => EnvCheck::fail("S3_ENDPOINT", format!("'{}' is not a valid URL", value)),
    });

    let csrf = lookup("WTF_CSRF_ENABLED").is_some_and(|v| parse_bool(&v));
    checks.push(EnvCheck::pass(
        "WTF_CSRF_ENABLED",
        if csrf { "enabled" } else { "disabled" },
    ));

    checks
}

/// Whether every check passed.
pub fn all_passed(checks: &[EnvCheck]) -> bool {
    checks.iter().all(|c| c.passed)
}

/// Lenient boolean: only a case-insensitive "true" is true.
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn is_url(value: &str) -> bool {
    Url::parse(value).map(|u| u.has_host()).unwrap_or(false)
}
