use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use pharma_ledger::Error as LedgerError;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("IoT feed error: {0}")]
    UpstreamFeed(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("No data to export")]
    NoDataToExport,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl From<rust_xlsxwriter::XlsxError> for TrackerError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        TrackerError::Export(err.to_string())
    }
}

impl From<prometheus::Error> for TrackerError {
    fn from(err: prometheus::Error) -> Self {
        TrackerError::Metrics(err.to_string())
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::UpstreamFeed(err.to_string())
    }
}

/// Store errors surface through the domain taxonomy
pub fn persistence(err: sqlx::Error) -> LedgerError {
    LedgerError::Persistence(err.to_string())
}

impl ResponseError for TrackerError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_message = self.to_string();

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": error_message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            TrackerError::Ledger(LedgerError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            TrackerError::Ledger(LedgerError::DuplicateBatch(_)) => StatusCode::BAD_REQUEST,
            TrackerError::Ledger(LedgerError::NotFound(_)) => StatusCode::NOT_FOUND,
            TrackerError::Ledger(LedgerError::Persistence(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            TrackerError::UpstreamFeed(_) => StatusCode::BAD_GATEWAY,
            TrackerError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrackerError::NoDataToExport => StatusCode::BAD_REQUEST,
            TrackerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            TrackerError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl TrackerError {
    fn error_type(&self) -> &str {
        match self {
            TrackerError::Ledger(e) => e.kind(),
            TrackerError::UpstreamFeed(_) => "upstream_feed_error",
            TrackerError::Export(_) => "export_error",
            TrackerError::NoDataToExport => "no_data",
            TrackerError::Config(_) => "config_error",
            TrackerError::Metrics(_) => "metrics_error",
        }
    }
}
