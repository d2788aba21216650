//! Environment-driven configuration.
//!
//! All of these are construction-time inputs: they select how an engine or
//! connection is built and play no part in the runtime state machine.

use std::time::Duration;

use once_cell::sync::Lazy;

/// API key for the cloud approval backend.
pub const API_KEY_ENV: &str = "HANDRAIL_API_KEY";
/// Base URL override for the cloud approval backend.
pub const API_BASE_ENV: &str = "HANDRAIL_API_BASE";
/// Approval method override: `cli` or `backend`.
pub const APPROVAL_METHOD_ENV: &str = "HANDRAIL_APPROVAL_METHOD";
/// Run id override, shared by every request an agent run creates.
pub const RUN_ID_ENV: &str = "HANDRAIL_RUN_ID";
/// HTTP timeout in seconds for backend calls.
pub const HTTP_TIMEOUT_ENV: &str = "HANDRAIL_HTTP_TIMEOUT_SECONDS";

/// Default cloud endpoint, used when no explicit or env base URL is given.
pub const DEFAULT_API_BASE: &str = "https://api.handrail.dev/handrail/v1";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

static DOTENV: Lazy<()> = Lazy::new(|| {
    dotenvy::dotenv().ok();
});

/// Load `.env` once per process. Safe to call from every constructor.
pub(crate) fn bootstrap_env() {
    Lazy::force(&DOTENV);
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn api_key_from_env() -> Option<String> {
    non_empty(API_KEY_ENV)
}

pub(crate) fn api_base_from_env() -> Option<String> {
    non_empty(API_BASE_ENV)
}

pub(crate) fn approval_method_from_env() -> Option<String> {
    non_empty(APPROVAL_METHOD_ENV)
}

pub(crate) fn run_id_from_env() -> Option<String> {
    non_empty(RUN_ID_ENV)
}

pub(crate) fn http_timeout() -> Duration {
    let secs = non_empty(HTTP_TIMEOUT_ENV)
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);
    Duration::from_secs(secs)
}

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
