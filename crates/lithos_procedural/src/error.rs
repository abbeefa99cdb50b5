//! # Procedural Error Types
//!
//! Everything that can fail before or around classification. The classifier
//! itself never fails; these cover catalog loading, layer configuration and
//! request validation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the procedural generation system.
#[derive(Error, Debug)]
pub enum ProceduralError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    CatalogRead {
        /// Path that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The catalog file is not valid TOML or does not match the schema.
    #[error("failed to parse catalog: {0}")]
    CatalogParse(#[from] toml::de::Error),

    /// A mineral references a layer key that no layer declares.
    #[error("mineral `{mineral}` references unknown layer `{layer}`")]
    UnknownLayer {
        /// Mineral whose weight table is broken.
        mineral: String,
        /// The undeclared layer key.
        layer: String,
    },

    /// Two layers claim the same depth.
    #[error("layer `{first}` overlaps layer `{second}`")]
    LayerOverlap {
        /// Shallower layer.
        first: String,
        /// Deeper layer.
        second: String,
    },

    /// A layer range is empty or inverted.
    #[error("layer `{key}` has an empty range [{start}, {end})")]
    EmptyLayer {
        /// Layer key.
        key: String,
        /// Range start.
        start: i64,
        /// Range end.
        end: i64,
    },

    /// A layer key was declared twice.
    #[error("layer `{0}` is declared more than once")]
    DuplicateLayer(String),

    /// A weight in the catalog is negative or not finite.
    #[error("mineral `{mineral}` has invalid weight {weight} in layer `{layer}`")]
    InvalidWeight {
        /// Mineral identifier.
        mineral: String,
        /// Layer key.
        layer: String,
        /// The offending weight.
        weight: f64,
    },

    /// The catalog declares no cover variants.
    #[error("catalog declares no cover variants")]
    NoCoverVariants,

    /// The catalog holds more identifiers than fit in a voxel cell.
    #[error("catalog has too many {kind} entries ({count})")]
    CatalogTooLarge {
        /// Which table overflowed.
        kind: &'static str,
        /// Number of entries found.
        count: usize,
    },

    /// Requested chunk size is outside the supported range.
    #[error("chunk size {size} is outside [{min}, {max}]")]
    InvalidSize {
        /// Requested size.
        size: u32,
        /// Smallest accepted size.
        min: u32,
        /// Largest accepted size.
        max: u32,
    },

    /// A voxel window reaches past the `i64` coordinate range.
    #[error("world coordinates overflow along {axis}")]
    CoordinateOverflow {
        /// Axis that overflowed.
        axis: char,
    },

    /// Generation did not finish within its time budget.
    #[error("generation exceeded its {budget_ms} ms budget")]
    Timeout {
        /// Budget that was exceeded.
        budget_ms: u64,
    },

    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// The location resolver could not map the input.
    #[error("cannot resolve location: {0}")]
    Location(String),
}

/// Result type for procedural operations.
pub type ProceduralResult<T> = Result<T, ProceduralError>;
