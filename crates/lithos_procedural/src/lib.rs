//! # LITHOS Procedural Generation
//!
//! Deterministic mineral generation for unbounded, reproducible worlds.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: Same seed and parameters always produce the same voxels
//! 2. **Stateless**: Each voxel is classified from its own coordinates alone
//! 3. **Chunked**: Worlds are sampled in cubic windows of up to 128³ voxels
//! 4. **Total**: Classification never fails; `void` is the fallback
//!
//! ## Core Components
//!
//! - `Catalog`: Minerals, depth layers and cover variants loaded from TOML
//! - `DepthLayerTable`: Ordered, non-overlapping depth bands
//! - `VoxelClassifier`: SHA-256 keyed weighted sampling
//! - `ChunkGenerator`: Parallel classification of chunks and slices
//! - `LocationResolver`: Free text to world offsets
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lithos_procedural::{Catalog, ChunkGenerator, ChunkSize, GenerationParams, WorldPos};
//!
//! let catalog = Arc::new(Catalog::load("data/catalog.toml".as_ref())?);
//! let generator = ChunkGenerator::new(catalog);
//!
//! let params = GenerationParams::new("default_seed", WorldPos::default(), ChunkSize::new(32)?);
//! let chunk = generator.generate(&params)?;
//! println!("{:?}", chunk.to_nested(generator.catalog())[0][0]);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod chunk;
pub mod classifier;
pub mod error;
pub mod layer;
pub mod location;

pub use catalog::{Catalog, CoverVariant, MineralKind, VOID};
pub use chunk::{
    Chunk, ChunkCoord, ChunkGenerator, ChunkSize, DebugInfo, GenerationParams, Slice, WorldPos,
    MAX_CHUNK_SIZE, MAX_SLICE_SIZE, MIN_CHUNK_SIZE,
};
pub use classifier::{
    classify, normalize, voxel_hash, voxel_key, AllowedSet, ProbabilityOffsets, VoxelClassifier,
};
pub use error::{ProceduralError, ProceduralResult};
pub use layer::{DepthLayer, DepthLayerTable, LayerRange};
pub use location::{HashedLocationResolver, LocationResolver, ResolvedLocation};
