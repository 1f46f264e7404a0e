//! Error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type PortalResult<T> = Result<T, PortalError>;
