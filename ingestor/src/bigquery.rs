use crate::credentials::AccessTokenSource;
use crate::errors::{Error, Result};
use crate::model::{RowError, TableId, TelemetryRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Append-only table of telemetry rows.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Streams `rows` into `table`. Per-row rejections come back as the
    /// returned list; transport and HTTP failures are errors.
    async fn insert_rows(&self, table: &TableId, rows: &[TelemetryRecord]) -> Result<Vec<RowError>>;
}

pub struct BigQueryClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: AccessTokenSource,
}

#[derive(Serialize)]
struct InsertAllRequest<'a> {
    rows: Vec<InsertRow<'a>>,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    json: &'a TelemetryRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<RowError>,
}

impl BigQueryClient {
    pub fn new(http: reqwest::Client, endpoint: &str, credentials: AccessTokenSource) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn insert_all_url(&self, table: &TableId) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/datasets/{}/tables/{}/insertAll",
            self.endpoint, table.project, table.dataset, table.table
        )
    }
}

#[async_trait]
impl TelemetryStore for BigQueryClient {
    async fn insert_rows(&self, table: &TableId, rows: &[TelemetryRecord]) -> Result<Vec<RowError>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.credentials.token(&self.http).await?;
        let request = InsertAllRequest {
            rows: rows.iter().map(|json| InsertRow { json }).collect(),
        };

        debug!("Inserting {} row(s) into {}", rows.len(), table);
        let response = self
            .http
            .post(self.insert_all_url(table))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("insertAll into {} failed with {}: {}", table, status, body);
            return Err(Error::Upstream {
                service: "bigquery",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InsertAllResponse = response.json().await?;
        Ok(parsed.insert_errors)
    }
}
