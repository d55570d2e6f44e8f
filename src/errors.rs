use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Business-rule failures of the gadget operations.
///
/// Every variant is reported to the caller as plain text with the status
/// returned by [`GadgetError::status`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GadgetError {
    #[error("Gadget with id={0} not found")]
    NotFound(String),

    #[error("Gadget with id={0} is not available")]
    NotAvailable(String),

    #[error("Gadget with id={0} is not rented")]
    NotRented(String),

    /// Delete of an absent id. Same message as `NotFound`, different status.
    #[error("Gadget with id={0} not found")]
    DeleteMissing(String),

    #[error("Renter is required to rent gadget with id={0}")]
    MissingRenter(String),
}

impl GadgetError {
    pub fn status(&self) -> StatusCode {
        match self {
            GadgetError::NotFound(_) => StatusCode::NOT_FOUND,
            GadgetError::NotAvailable(_)
            | GadgetError::NotRented(_)
            | GadgetError::DeleteMissing(_)
            | GadgetError::MissingRenter(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GadgetError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Snapshot load/save failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config.json: {0}")]
    Parse(#[from] serde_json::Error),
}
