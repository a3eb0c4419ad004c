use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejections raised while normalising user input into domain values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required fields")]
    MissingField { field: &'static str },
    #[error("invalid symbol '{value}'")]
    InvalidSymbol { value: String },
    #[error("invalid alert type '{value}', expected upper or lower")]
    InvalidAlertType { value: String },
    #[error("invalid frequency '{value}', expected once, daily or weekly")]
    InvalidFrequency { value: String },
    #[error("threshold must be a finite, non-negative number")]
    InvalidThreshold,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("record already exists")]
    AlreadyExists,
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(e: mongodb::error::Error) -> Self {
        let msg = e.to_string();
        if msg.contains("E11000") {
            StoreError::AlreadyExists
        } else {
            StoreError::Database(msg)
        }
    }
}

impl From<mongodb::bson::ser::Error> for StoreError {
    fn from(e: mongodb::bson::ser::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("FINNHUB_API_KEY is not configured")]
    MissingApiKey,
    #[error("finnhub request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("finnhub returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected finnhub payload: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("event request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("event api returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("email template error: {0}")]
    Template(#[from] handlebars::RenderError),
    #[error("cannot encode event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("an evaluation pass is already running")]
    PassInProgress,
    #[error("cannot list active alerts: {0}")]
    Listing(#[from] StoreError),
    #[error("listing active alerts timed out")]
    ListingTimedOut,
    #[error("evaluation pass aborted: {0}")]
    Aborted(String),
}

/// Error returned by JSON action handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref detail) = self {
            tracing::error!(error = %detail, "request failed");
        }

        let body = match &self {
            // do not leak database details to clients
            ApiError::Internal(_) => json!({ "success": false, "error": "Internal server error" }),
            other => json!({ "success": false, "error": other.to_string() }),
        };

        (self.status(), Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(v) => v.into(),
            StoreError::AlreadyExists => ApiError::Conflict(e.to_string()),
            StoreError::NotFound => ApiError::NotFound(e.to_string()),
            StoreError::Database(detail) => ApiError::Internal(detail),
        }
    }
}
