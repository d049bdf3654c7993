use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error while accessing graph store: {0}")]
    Io(#[from] io::Error),

    #[error("graph serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("storage backend not supported: {0}")]
    NotSupported(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
