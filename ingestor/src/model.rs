use crate::errors::Error;
use axum::body::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_DEVICE: &str = "unknown";
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// One soil-moisture reading, shaped as a row of the telemetry table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    #[serde(serialize_with = "serialize_event_ts")]
    pub event_ts: DateTime<Utc>,
    pub device_id: String,
    pub moisture_raw: i64,
    pub moisture_pct: i64,
    pub battery_volts: f64,
    pub meta_data: String,
}

fn serialize_event_ts<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Submitted telemetry fields before type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryInput {
    pub device_id: Option<String>,
    pub raw: Option<String>,
    pub pct: Option<String>,
    pub bat: Option<String>,
}

impl TelemetryInput {
    pub fn new(
        device_id: Option<String>,
        raw: Option<String>,
        pct: Option<String>,
        bat: Option<String>,
    ) -> Self {
        Self {
            device_id: non_empty(device_id),
            raw: non_empty(raw),
            pct: non_empty(pct),
            bat: non_empty(bat),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.device_id.is_none() && self.raw.is_none() && self.pct.is_none() && self.bat.is_none()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// A camera frame addressed by its receipt time.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub key: String,
    pub bytes: Bytes,
    pub content_type: &'static str,
}

impl ImageAsset {
    pub fn new(received_at: DateTime<Utc>, bytes: Bytes) -> Self {
        Self {
            key: image_key(received_at),
            bytes,
            content_type: IMAGE_CONTENT_TYPE,
        }
    }
}

/// `uploads/YYYY/MM/DD/HH-MM-SS.jpg`; uploads within the same second share a key.
pub fn image_key(received_at: DateTime<Utc>) -> String {
    received_at
        .format("uploads/%Y/%m/%d/%H-%M-%S.jpg")
        .to_string()
}

/// Fully-qualified `project.dataset.table` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableId {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl FromStr for TableId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    dataset: dataset.to_string(),
                    table: table.to_string(),
                })
            }
            _ => Err(Error::Config(format!(
                "table id {:?} is not of the form project.dataset.table",
                s
            ))),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// Per-row failure reported by the table store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    #[serde(default)]
    pub index: u64,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TelemetryAccepted {
    pub status: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ImageStored {
    pub status: &'static str,
    pub gcs_path: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
