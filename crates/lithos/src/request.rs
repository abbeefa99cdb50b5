//! Generation request and response shapes.

use std::collections::BTreeMap;

use lithos_mining::OverlayKey;
use lithos_procedural::{Catalog, ChunkCoord, ChunkSize, DebugInfo, GenerationParams, WorldPos};
use serde::{Deserialize, Serialize};

use crate::error::{ExplorerError, ExplorerResult};

/// Seed used when a request names none.
pub const DEFAULT_SEED: &str = "default_seed";

/// Chunk edge used when a request names none.
pub const DEFAULT_SIZE: u32 = 32;

/// A chunk request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Seed text.
    pub seed: String,
    /// Chunk edge.
    pub size: u32,
    /// World offset the chunk grid is anchored at.
    pub world_origin: WorldPos,
    /// Chunk position in the grid, in chunk units.
    pub chunk: ChunkCoord,
    /// Signed weight adjustments by mineral identifier.
    pub probability_offsets: BTreeMap<String, f64>,
    /// Candidate restriction; empty means unrestricted.
    pub allowed_minerals: Vec<String>,
    /// Attach a [`DebugInfo`] to the response.
    pub debug: bool,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED.to_owned(),
            size: DEFAULT_SIZE,
            world_origin: WorldPos::default(),
            chunk: ChunkCoord::default(),
            probability_offsets: BTreeMap::new(),
            allowed_minerals: Vec::new(),
            debug: false,
        }
    }
}

impl GenerationRequest {
    /// Request with defaults apart from seed and size.
    #[must_use]
    pub fn new(seed: impl Into<String>, size: u32) -> Self {
        Self {
            seed: seed.into(),
            size,
            ..Self::default()
        }
    }

    /// Validates the request before any classification.
    ///
    /// # Errors
    ///
    /// Rejects sizes outside `[1, max_size]`, non-finite offsets and
    /// windows that reach past the `i64` coordinate range.
    pub fn validate(&self, max_size: u32) -> ExplorerResult<ChunkSize> {
        let size = ChunkSize::new(self.size)?;
        if self.size > max_size {
            return Err(ExplorerError::InvalidRequest(format!(
                "size {} exceeds the configured maximum {max_size}",
                self.size
            )));
        }
        if let Some((name, delta)) = self.probability_offsets.iter().find(|(_, d)| !d.is_finite()) {
            return Err(ExplorerError::InvalidRequest(format!(
                "probability offset for `{name}` is not finite ({delta})"
            )));
        }
        self.origin(size)?;
        Ok(size)
    }

    /// World position of the chunk's local origin.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidRequest`] if any voxel of the chunk
    /// lies outside the `i64` coordinate range.
    pub fn origin(&self, size: ChunkSize) -> ExplorerResult<WorldPos> {
        let edge = size.get();
        self.chunk
            .origin(self.world_origin, size)
            .and_then(|origin| origin.ensure_window(edge, edge, edge).map(|()| origin))
            .map_err(|err| ExplorerError::InvalidRequest(err.to_string()))
    }

    /// Classifier inputs for this request.
    ///
    /// # Errors
    ///
    /// Fails like [`origin`](Self::origin).
    pub fn params(&self, catalog: &Catalog, size: ChunkSize) -> ExplorerResult<GenerationParams> {
        Ok(GenerationParams {
            seed: self.seed.clone(),
            origin: self.origin(size)?,
            size,
            offsets: catalog.resolve_offsets(&self.probability_offsets),
            allowed: catalog.resolve_allowed(&self.allowed_minerals),
        })
    }

    /// Identity of the overlay mined on this request's chunk.
    #[must_use]
    pub fn overlay_key(&self, catalog: &Catalog, size: ChunkSize) -> OverlayKey {
        OverlayKey::new(
            catalog,
            &self.seed,
            self.world_origin,
            self.chunk,
            size,
            &self.probability_offsets,
            &self.allowed_minerals,
        )
    }

    /// Debug projection of the request.
    ///
    /// # Errors
    ///
    /// Fails like [`origin`](Self::origin).
    pub fn debug_info(&self, size: ChunkSize) -> ExplorerResult<DebugInfo> {
        Ok(DebugInfo::new(
            &self.seed,
            self.origin(size)?,
            &self.probability_offsets,
            &self.allowed_minerals,
        ))
    }
}

/// A generated chunk, as identifiers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// `[x][y][z]` mineral identifiers (`"void"` for empty space).
    pub chunk: Vec<Vec<Vec<String>>>,
    /// Present when the request asked for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_info: Option<DebugInfo>,
}
