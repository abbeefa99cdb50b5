//! # Mining Error Types
//!
//! Two families: [`RevealError`] for rejected player actions, which are
//! expected and never mutate state, and [`MiningError`] for persistence
//! and consistency failures.

use std::path::PathBuf;

use thiserror::Error;

/// Why a reveal was refused. The overlay is unchanged in every case.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealError {
    /// The cell is outside the overlay.
    #[error("cell ({x}, {y}, {z}) is outside a {size}³ overlay")]
    OutOfBounds {
        /// Local X.
        x: usize,
        /// Local Y.
        y: usize,
        /// Local Z.
        z: usize,
        /// Overlay edge.
        size: u32,
    },

    /// The cell lies below the current frontier.
    #[error("depth {z} is below the frontier at {frontier}")]
    OutOfFrontier {
        /// Requested depth.
        z: usize,
        /// Current frontier depth.
        frontier: u32,
    },

    /// The cell was already revealed.
    #[error("cell ({x}, {y}, {z}) is already revealed")]
    AlreadyRevealed {
        /// Local X.
        x: usize,
        /// Local Y.
        y: usize,
        /// Local Z.
        z: usize,
    },

    /// The cell is within the frontier but carries no cover.
    #[error("cell ({x}, {y}, {z}) is not covered")]
    NotCovered {
        /// Local X.
        x: usize,
        /// Local Y.
        y: usize,
        /// Local Z.
        z: usize,
    },
}

/// Errors that can occur in the mining system.
#[derive(Error, Debug)]
pub enum MiningError {
    /// Overlay and chunk disagree on dimensions.
    #[error("overlay is {overlay}³ but chunk is {chunk}³")]
    DimensionMismatch {
        /// Overlay edge.
        overlay: u32,
        /// Chunk edge.
        chunk: u32,
    },

    /// A revealed cell disagrees with the chunk underneath.
    #[error("revealed cell ({x}, {y}, {z}) does not match the chunk")]
    MineralMismatch {
        /// Local X.
        x: usize,
        /// Local Y.
        y: usize,
        /// Local Z.
        z: usize,
    },

    /// Persisted data does not start with the overlay magic.
    #[error("invalid overlay magic")]
    BadMagic,

    /// Persisted data uses a format version this build cannot read.
    #[error("unsupported overlay version: {0}")]
    UnsupportedVersion(u16),

    /// Persisted data failed its integrity check.
    #[error("overlay checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// CRC32 stored in the file.
        stored: u32,
        /// CRC32 of the bytes actually read.
        computed: u32,
    },

    /// Persisted data is truncated or structurally invalid.
    #[error("corrupt overlay: {0}")]
    Corrupt(String),

    /// Persisted data belongs to a different parameter tuple.
    #[error("overlay belongs to a different parameter tuple")]
    KeyMismatch,

    /// The compressed cell payload could not be decompressed.
    #[error("failed to decompress overlay: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// Overlay dimensions are invalid.
    #[error(transparent)]
    Procedural(#[from] lithos_procedural::ProceduralError),

    /// Filesystem access failed.
    #[error("overlay I/O failed at {path}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for mining operations.
pub type MiningResult<T> = Result<T, MiningError>;
