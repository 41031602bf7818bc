//! Errors at the collaborator boundaries.
//!
//! Selection and acceptance never fail; these cover the calls that leave the
//! process (escrow, upstream data) and host-supplied configuration.

use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error("Escrow initiation failed: {0}")]
    Escrow(String),

    #[error("Data collection failed: {0}")]
    Collection(String),

    #[error("Data handler failed: {0}")]
    Handler(String),

    #[error("Invalid request parameter {name}: {value}")]
    InvalidRequestParam { name: String, value: Value },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
