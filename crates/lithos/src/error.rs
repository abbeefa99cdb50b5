//! # Explorer Error Types

use std::path::PathBuf;

use lithos_mining::{MiningError, RevealError};
use lithos_procedural::ProceduralError;
use thiserror::Error;

/// Errors surfaced by an explorer session.
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// Catalog, size validation or generation failure.
    #[error(transparent)]
    Procedural(#[from] ProceduralError),

    /// Overlay persistence failure.
    #[error(transparent)]
    Mining(#[from] MiningError),

    /// A reveal was refused. The session and overlay are unchanged.
    #[error("reveal rejected: {0}")]
    Reveal(#[from] RevealError),

    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A config value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A request field is invalid.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Mining was attempted before any chunk was generated.
    #[error("no chunk has been generated in this session")]
    NoActiveChunk,
}

impl ExplorerError {
    /// Returns true for rejections the caller can recover from by choosing
    /// a different action.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Reveal(_) | Self::InvalidRequest(_) | Self::NoActiveChunk)
    }
}

/// Result type for explorer operations.
pub type ExplorerResult<T> = Result<T, ExplorerError>;
