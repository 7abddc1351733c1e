//! Shared HTTP client construction

use crate::error::Result;
use reqwest::Client;
use std::time::Duration;

// ============================================================================
// HTTP Client Constants
// ============================================================================

/// Default timeout for a single request in seconds.
/// Can be overridden via HANDOFF_HTTP_TIMEOUT_SECS environment variable.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("handoff-agent/", env!("CARGO_PKG_VERSION"));

/// Build the client used for both the file store and the job API
pub fn build_client() -> Result<Client> {
    let timeout_secs = std::env::var("HANDOFF_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()?;

    Ok(client)
}
