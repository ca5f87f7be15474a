use crate::config::Config;
use crate::errors::{Error, Result};
use crate::metrics::UNAUTHORIZED_TOTAL;
use axum::http::HeaderMap;
use tracing::warn;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Checks the shared secret, taken from the `token` query parameter or, when
/// that is absent, the `X-Api-Key` header.
///
/// Plain string equality: not constant-time, and the secret never rotates.
pub fn authorize(config: &Config, query_token: Option<&str>, headers: &HeaderMap) -> Result<()> {
    let token = query_token.filter(|t| !t.is_empty()).or_else(|| {
        headers
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
    });

    if token == Some(config.api_key.as_str()) {
        return Ok(());
    }

    UNAUTHORIZED_TOTAL.inc();
    warn!(token = ?token, "Unauthorized access attempt");
    Err(Error::Unauthorized)
}
