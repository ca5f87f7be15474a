use crate::errors::{Error, Result};
use crate::model::TableId;
use std::env;

pub const DEFAULT_META_DATA: &str = "Ingested via Cloud Run Proxy";
pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Deploy-time settings, read once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: String,
    /// Shared secret expected in `token` or `X-Api-Key`.
    pub api_key: String,
    pub table: TableId,
    pub bucket: String,
    /// Value written to the `meta_data` column of every row.
    pub meta_data: String,
    pub bigquery_endpoint: String,
    pub gcs_endpoint: String,
    /// Static bearer token; the metadata server is used when unset.
    pub access_token: Option<String>,
    pub metadata_token_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT").unwrap_or_else(|_| "8080".to_string());
        let http_addr = env::var("HTTP_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{}", port));
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v.parse().map_err(|e| {
                Error::Config(format!("MAX_UPLOAD_BYTES {:?} is not a byte count: {}", v, e))
            })?,
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            http_addr,
            api_key: required("INGEST_API_KEY")?,
            table: required("BQ_TABLE_ID")?.parse()?,
            bucket: required("GCS_BUCKET")?,
            meta_data: env::var("META_DATA_TAG").unwrap_or_else(|_| DEFAULT_META_DATA.to_string()),
            bigquery_endpoint: env::var("BIGQUERY_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_BIGQUERY_ENDPOINT.to_string()),
            gcs_endpoint: env::var("GCS_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_GCS_ENDPOINT.to_string()),
            access_token: env::var("GCP_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
            metadata_token_url: env::var("GCP_METADATA_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_METADATA_TOKEN_URL.to_string()),
            max_upload_bytes,
        })
    }
}

fn required(name: &str) -> Result<String> {
    match env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config(format!("{} must be set", name))),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        http_addr: "127.0.0.1:0".to_string(),
        api_key: "SECRET".to_string(),
        table: TableId {
            project: "farm-hub".to_string(),
            dataset: "farm_telemetry".to_string(),
            table: "soil_readings".to_string(),
        },
        bucket: "farm-images-archive".to_string(),
        meta_data: DEFAULT_META_DATA.to_string(),
        bigquery_endpoint: DEFAULT_BIGQUERY_ENDPOINT.to_string(),
        gcs_endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
        access_token: Some("test-token".to_string()),
        metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    }
}
