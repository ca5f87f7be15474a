use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Missing payload")]
    MissingPayload,

    #[error("No image file provided")]
    MissingImage,

    #[error("Invalid value {value:?} for `{field}`: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Validation error: {0}")]
    Validation(String),

    /// The table store accepted the request but rejected the row.
    #[error("{0}")]
    RowErrors(String),

    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::MissingPayload
            | Error::MissingImage
            | Error::InvalidField { .. }
            | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
