use crate::auth::authorize;
use crate::bigquery::TelemetryStore;
use crate::clock::Clock;
use crate::config::Config;
use crate::errors::{Error, Result};
use crate::gcs::ObjectStore;
use crate::metrics::{
    IMAGES_UPLOADED_TOTAL, IMAGE_BYTES_TOTAL, REJECTED_TOTAL, REQUESTS_TOTAL,
    ROWS_INSERTED_TOTAL, WRITE_FAILURES_TOTAL, WRITE_LATENCY_SECONDS,
};
use crate::model::{ErrorBody, ImageAsset, ImageStored, TelemetryAccepted, TelemetryInput};
use crate::validate::{normalize, resolve_input};
use axum::{
    body::Bytes,
    extract::{
        rejection::QueryRejection, DefaultBodyLimit, FromRequest, Multipart, Query, Request,
        State,
    },
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

const IMAGE_FIELD: &str = "image";

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub telemetry: Arc<dyn TelemetryStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Default)]
pub struct IngestQuery {
    token: Option<String>,
    device_id: Option<String>,
    raw: Option<String>,
    pct: Option<String>,
    bat: Option<String>,
}

impl IngestQuery {
    /// Keeps the first value of a repeated key.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "token" => &mut query.token,
                "device_id" => &mut query.device_id,
                "raw" => &mut query.raw,
                "pct" => &mut query.pct,
                "bat" => &mut query.bat,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }

    fn into_input(self) -> TelemetryInput {
        TelemetryInput::new(self.device_id, self.raw, self.pct, self.bat)
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", any(ingest))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Single entry point: GET and JSON POST carry telemetry, multipart POST
/// carries a camera image.
#[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4(), method = %method))]
async fn ingest(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    query: std::result::Result<Query<Vec<(String, String)>>, QueryRejection>,
    request: Request,
) -> std::result::Result<Response, AppError> {
    REQUESTS_TOTAL.inc();

    // An unreadable query string still goes through the token check first
    let (mut query, rejection) = match query {
        Ok(Query(pairs)) => (IngestQuery::from_pairs(pairs), None),
        Err(rejection) => (IngestQuery::default(), Some(rejection)),
    };
    authorize(&state.config, query.token.take().as_deref(), &headers)?;
    if let Some(rejection) = rejection {
        return Err(Error::Validation(rejection.body_text()).into());
    }

    let response = match method {
        Method::POST if is_multipart(&headers) => handle_image_upload(&state, request).await?,
        Method::GET | Method::POST => {
            let body = Bytes::from_request(request, &state)
                .await
                .map_err(|r| body_error(r.status(), r.body_text()))?;
            handle_telemetry(&state, &body, query).await?
        }
        _ => return Err(Error::MethodNotAllowed.into()),
    };
    Ok(response)
}

async fn handle_telemetry(state: &AppState, body: &[u8], query: IngestQuery) -> Result<Response> {
    let input = resolve_input(body, query.into_input())?;
    let record = normalize(input, state.clock.now(), &state.config.meta_data)?;

    info!(
        device_id = %record.device_id,
        moisture_raw = record.moisture_raw,
        moisture_pct = record.moisture_pct,
        battery_volts = record.battery_volts,
        "Telemetry received"
    );

    let table = &state.config.table;
    let timer = WRITE_LATENCY_SECONDS.start_timer();
    let row_errors = state
        .telemetry
        .insert_rows(table, std::slice::from_ref(&record))
        .await
        .inspect_err(|_| WRITE_FAILURES_TOTAL.inc())?;
    timer.observe_duration();

    if !row_errors.is_empty() {
        WRITE_FAILURES_TOTAL.inc();
        let detail = serde_json::to_string(&row_errors)?;
        error!("Insert into {} rejected: {}", table, detail);
        return Err(Error::RowErrors(detail));
    }

    ROWS_INSERTED_TOTAL.inc();
    info!("Telemetry inserted into {}", table);

    Ok(Json(TelemetryAccepted {
        status: "success",
        kind: "telemetry",
    })
    .into_response())
}

async fn handle_image_upload(state: &AppState, request: Request) -> Result<Response> {
    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|r| body_error(r.status(), r.body_text()))?;

    let bytes = loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| body_error(e.status(), e.body_text()))?;
        match field {
            Some(field) if field.name() == Some(IMAGE_FIELD) => {
                break field
                    .bytes()
                    .await
                    .map_err(|e| body_error(e.status(), e.body_text()))?;
            }
            Some(_) => continue,
            None => return Err(Error::MissingImage),
        }
    };

    // Client filename is ignored; the key comes from the receipt time
    let asset = ImageAsset::new(state.clock.now(), bytes);
    let size = asset.bytes.len();
    let bucket = &state.config.bucket;

    let timer = WRITE_LATENCY_SECONDS.start_timer();
    state
        .objects
        .upload(bucket, &asset.key, asset.bytes, asset.content_type)
        .await
        .inspect_err(|_| WRITE_FAILURES_TOTAL.inc())?;
    timer.observe_duration();

    IMAGES_UPLOADED_TOTAL.inc();
    IMAGE_BYTES_TOTAL.inc_by(size as f64);
    info!(size, "Image uploaded: gs://{}/{}", bucket, asset.key);

    Ok(Json(ImageStored {
        status: "success",
        gcs_path: asset.key,
    })
    .into_response())
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| {
            value
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
}

fn body_error(status: StatusCode, text: String) -> Error {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge
    } else {
        Error::Validation(text)
    }
}

pub struct AppError(Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            error!("API error: {}", self.0);
        } else {
            if status != StatusCode::UNAUTHORIZED {
                REJECTED_TOTAL.inc();
            }
            warn!("Request rejected ({}): {}", status, self.0);
        }

        (
            status,
            Json(ErrorBody {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
