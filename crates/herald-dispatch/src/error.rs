use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// Batch or single-send input rejected before any provider contact
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DispatchError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DispatchError::Validation(_))
    }
}
