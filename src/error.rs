use actix_web::http::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::models::ErrorBody;

/// Failures a request can end in. Each one maps onto a wire code and an
/// HTTP status carried inside the response envelope.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request method not supported")]
    MethodNotAllowed,
    #[error("destination not specified")]
    MissingDestination,
    #[error("file not found")]
    FileNotFound { path: PathBuf },
    #[error("file operation failed")]
    Operation {
        operation: &'static str,
        path: PathBuf,
        source: io::Error,
    },
}

impl GatewayError {
    pub fn operation(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        GatewayError::Operation {
            operation,
            path: path.into(),
            source,
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            GatewayError::MethodNotAllowed => 1,
            GatewayError::MissingDestination => 2,
            GatewayError::FileNotFound { .. } => 3,
            GatewayError::Operation { .. } => 4,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::MissingDestination | GatewayError::FileNotFound { .. } => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::Operation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        ErrorBody {
            http_status: err.http_status().as_u16(),
            code: err.code(),
            message: err.to_string(),
        }
    }
}
