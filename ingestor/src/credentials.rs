use crate::errors::{Error, Result};
use serde::Deserialize;
use tracing::debug;

/// Where bearer tokens for the storage APIs come from. Every call fetches a
/// fresh token; nothing is cached between requests.
#[derive(Debug, Clone)]
pub enum AccessTokenSource {
    Static(String),
    Metadata { url: String },
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl AccessTokenSource {
    pub fn new(static_token: Option<String>, metadata_url: String) -> Self {
        match static_token {
            Some(token) => Self::Static(token),
            None => Self::Metadata { url: metadata_url },
        }
    }

    pub async fn token(&self, http: &reqwest::Client) -> Result<String> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::Metadata { url } => {
                debug!("Fetching access token from metadata server");
                let response = http
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Credentials(format!(
                        "metadata server returned {}: {}",
                        status, body
                    )));
                }

                let token: MetadataToken = response.json().await?;
                Ok(token.access_token)
            }
        }
    }
}
