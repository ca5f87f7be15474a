use crate::credentials::AccessTokenSource;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error};

/// Blob storage addressed by bucket and key. Existing keys are overwritten.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes, content_type: &str) -> Result<()>;
}

pub struct GcsClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: AccessTokenSource,
}

impl GcsClient {
    pub fn new(http: reqwest::Client, endpoint: &str, credentials: AccessTokenSource) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn upload_url(&self, bucket: &str) -> String {
        format!("{}/upload/storage/v1/b/{}/o", self.endpoint, bucket)
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes, content_type: &str) -> Result<()> {
        let token = self.credentials.token(&self.http).await?;
        let size = bytes.len();

        debug!(bucket, key, size, "Uploading object");
        let response = self
            .http
            .post(self.upload_url(bucket))
            .query(&[("uploadType", "media"), ("name", key)])
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Upload of gs://{}/{} failed with {}: {}", bucket, key, status, body);
            return Err(Error::Upstream {
                service: "storage",
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
