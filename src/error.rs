use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use alloy_primitives::utils::UnitsError as UNITS_ERROR;
use alloy_sol_types::Error as SOL_TYPES_ERROR;
use alloy_transport::TransportError as TRANSPORT_ERROR;
use serde::Serialize;
use std::io::Error as IO_ERROR;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tracing::subscriber::SetGlobalDefaultError as TRACING_GLOBAL_DEFAULT_ERROR;

use crate::cache_keys::MetricKey;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] IO_ERROR),

    #[error("{0}")]
    TokioJoinError(#[from] JoinError),

    #[error("Timed out: {0}")]
    TokioElapsedError(#[from] Elapsed),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Upstream fetch of {key} failed: {reason}")]
    UpstreamFetch { key: MetricKey, reason: String },

    #[error("Arithmetic underflow: {0}")]
    ArithmeticUnderflow(String),

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("RPC transport error: {0}")]
    Transport(#[from] TRANSPORT_ERROR),

    #[error("ABI decode error: {0}")]
    SolTypes(#[from] SOL_TYPES_ERROR),

    #[error("Units error: {0}")]
    Units(#[from] UNITS_ERROR),

    #[error("Tracing error: {0}")]
    SetGlobalDefaultError(#[from] TRACING_GLOBAL_DEFAULT_ERROR),
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            // 502 Bad Gateway - the node could not be read
            Error::UpstreamFetch { .. } | Error::Transport(_) => {
                StatusCode::BAD_GATEWAY
            },

            // 500 Internal Server Error - everything else
            Error::ArithmeticUnderflow(_)
            | Error::ArithmeticOverflow(_)
            | Error::ConfigurationError(_)
            | Error::Io(_)
            | Error::TokioJoinError(_)
            | Error::TokioElapsedError(_)
            | Error::SolTypes(_)
            | Error::Units(_)
            | Error::SetGlobalDefaultError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// The body carries the status only; upstream and internal details stay
    /// in the logs.
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorResponse {
            error: status.canonical_reason().unwrap_or("Unknown"),
            status: status.as_u16(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub status: u16,
}
