use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Backing file or directory missing or unreadable
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Table loaded but does not have the expected shape
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A leader was requested over zero rows
    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Insufficient results: {0}")]
    InsufficientResults(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Recoverable kinds are reported to the client as a descriptive payload
    /// instead of an error response.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::EmptyInput(_) | AppError::UnknownItem(_) | AppError::InsufficientResults(_)
        )
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let message = match self {
            AppError::DataUnavailable(msg)
            | AppError::SchemaMismatch(msg)
            | AppError::EmptyInput(msg)
            | AppError::UnknownItem(msg)
            | AppError::InsufficientResults(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg) => msg.clone(),
        };

        HttpResponse::build(code).json(ErrorResponse {
            error: message,
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::EmptyInput(_) | AppError::UnknownItem(_) | AppError::InsufficientResults(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::SchemaMismatch(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::DataUnavailable(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for AppError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        AppError::DataUnavailable(format!("parquet: {}", err))
    }
}

impl From<arrow_schema::ArrowError> for AppError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        AppError::DataUnavailable(format!("arrow: {}", err))
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::DataUnavailable(format!("csv: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(err.to_string())
    }
}
