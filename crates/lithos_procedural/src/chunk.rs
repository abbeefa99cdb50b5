//! # Chunk System
//!
//! A chunk is an immutable `N×N×N` window of classified voxels anchored at
//! a world-space origin. Chunks are never edited: any parameter change
//! means a fresh chunk.
//!
//! ## Chunk Format
//!
//! Voxels are stored flat, indexed `[x][y][z]` with `z` fastest, so one
//! `(x, y)` column is contiguous. `N` is in `[1, 128]`.
//!
//! ## Generation
//!
//! Every voxel is an independent hash evaluation, so generation is a plain
//! parallel map over columns on a bounded rayon pool, joined before the
//! chunk is returned. There is no partial result: a chunk either completes
//! within its time budget or the request fails.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, MineralKind};
use crate::classifier::{AllowedSet, ProbabilityOffsets, VoxelClassifier};
use crate::error::{ProceduralError, ProceduralResult};

/// Smallest accepted chunk edge.
pub const MIN_CHUNK_SIZE: u32 = 1;

/// Largest accepted chunk edge.
pub const MAX_CHUNK_SIZE: u32 = 128;

/// Largest accepted slice edge.
pub const MAX_SLICE_SIZE: u32 = 1024;

/// World-space voxel coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    /// X coordinate.
    pub x: i64,
    /// Y coordinate.
    pub y: i64,
    /// Z coordinate (depth; grows downward).
    pub z: i64,
}

impl WorldPos {
    /// Creates a world position.
    #[inline]
    #[must_use]
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Checks that a window of `extent` voxels per axis starting here is
    /// addressable.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::CoordinateOverflow`] if the last voxel on
    /// some axis lies past `i64::MAX`.
    pub fn ensure_window(self, extent_x: u32, extent_y: u32, extent_z: u32) -> ProceduralResult<()> {
        for (axis, start, extent) in [('x', self.x, extent_x), ('y', self.y, extent_y), ('z', self.z, extent_z)] {
            let last = i64::from(extent.saturating_sub(1));
            if start.checked_add(last).is_none() {
                return Err(ProceduralError::CoordinateOverflow { axis });
            }
        }
        Ok(())
    }
}

/// Chunk coordinate (identifies a chunk in the world grid, in chunk units).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not voxels).
    pub x: i32,
    /// Y coordinate (in chunks, not voxels).
    pub y: i32,
    /// Z coordinate (in chunks, not voxels).
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World origin of this chunk for a given world offset and chunk size.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::CoordinateOverflow`] if the origin does
    /// not fit in `i64`.
    pub fn origin(self, offset: WorldPos, size: ChunkSize) -> ProceduralResult<WorldPos> {
        let edge = i64::from(size.get());
        let axis = |axis, offset: i64, coord: i32| {
            i64::from(coord)
                .checked_mul(edge)
                .and_then(|shift| offset.checked_add(shift))
                .ok_or(ProceduralError::CoordinateOverflow { axis })
        };
        Ok(WorldPos {
            x: axis('x', offset.x, self.x)?,
            y: axis('y', offset.y, self.y)?,
            z: axis('z', offset.z, self.z)?,
        })
    }
}

/// Validated chunk edge length.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkSize(u32);

impl ChunkSize {
    /// Validates a chunk edge.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::InvalidSize`] outside `[1, 128]`.
    pub fn new(size: u32) -> ProceduralResult<Self> {
        if size < MIN_CHUNK_SIZE || size > MAX_CHUNK_SIZE {
            return Err(ProceduralError::InvalidSize {
                size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self(size))
    }

    /// Edge length.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Edge length as an index bound.
    #[inline]
    #[must_use]
    pub const fn edge(self) -> usize {
        self.0 as usize
    }

    /// Voxels per chunk (`edge³`).
    #[inline]
    #[must_use]
    pub const fn volume(self) -> usize {
        self.edge() * self.edge() * self.edge()
    }
}

/// Everything that determines a chunk's content.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    /// Seed text, hashed verbatim.
    pub seed: String,
    /// World position of local `(0, 0, 0)`.
    pub origin: WorldPos,
    /// Chunk edge.
    pub size: ChunkSize,
    /// Weight adjustments.
    pub offsets: ProbabilityOffsets,
    /// Candidate restriction.
    pub allowed: AllowedSet,
}

impl GenerationParams {
    /// Unadjusted, unrestricted parameters.
    #[must_use]
    pub fn new(seed: impl Into<String>, origin: WorldPos, size: ChunkSize) -> Self {
        Self {
            seed: seed.into(),
            origin,
            size,
            offsets: ProbabilityOffsets::new(),
            allowed: AllowedSet::Unrestricted,
        }
    }
}

/// An immutable cube of classified voxels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    /// World position of local `(0, 0, 0)`.
    origin: WorldPos,
    /// Edge length.
    size: ChunkSize,
    /// Voxel data (indexed as [x][y][z]).
    voxels: Box<[MineralKind]>,
}

impl Chunk {
    /// Wraps pre-classified voxels.
    ///
    /// Returns `None` if `voxels.len()` is not `size³`.
    #[must_use]
    pub fn from_voxels(origin: WorldPos, size: ChunkSize, voxels: Vec<MineralKind>) -> Option<Self> {
        (voxels.len() == size.volume()).then(|| Self {
            origin,
            size,
            voxels: voxels.into_boxed_slice(),
        })
    }

    /// World position of local `(0, 0, 0)`.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> WorldPos {
        self.origin
    }

    /// Edge length.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> ChunkSize {
        self.size
    }

    /// Flat index of a local coordinate, if in bounds.
    #[inline]
    #[must_use]
    pub fn index(&self, lx: usize, ly: usize, lz: usize) -> Option<usize> {
        let edge = self.size.edge();
        (lx < edge && ly < edge && lz < edge).then(|| (lx * edge + ly) * edge + lz)
    }

    /// Gets a voxel at local coordinates.
    #[inline]
    #[must_use]
    pub fn get(&self, lx: usize, ly: usize, lz: usize) -> Option<MineralKind> {
        self.index(lx, ly, lz).map(|i| self.voxels[i])
    }

    /// All voxels, `[x][y][z]` order.
    #[inline]
    #[must_use]
    pub fn voxels(&self) -> &[MineralKind] {
        &self.voxels
    }

    /// Number of voxels of one kind.
    #[must_use]
    pub fn count(&self, kind: MineralKind) -> usize {
        self.voxels.iter().filter(|&&v| v == kind).count()
    }

    /// Nested `[x][y][z]` identifiers, the shape callers consume.
    #[must_use]
    pub fn to_nested<'c>(&self, catalog: &'c Catalog) -> Vec<Vec<Vec<&'c str>>> {
        let edge = self.size.edge();
        self.voxels
            .chunks(edge * edge)
            .map(|plane| {
                plane
                    .chunks(edge)
                    .map(|column| column.iter().map(|&kind| catalog.mineral_name(kind)).collect())
                    .collect()
            })
            .collect()
    }
}

/// A square grid of voxels at one depth.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Slice {
    origin: WorldPos,
    size: u32,
    /// Indexed as [x][y].
    cells: Box<[MineralKind]>,
}

impl Slice {
    /// World position of local `(0, 0)`; `origin.z` is the slice depth.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> WorldPos {
        self.origin
    }

    /// Edge length.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Gets a cell at local coordinates.
    #[must_use]
    pub fn get(&self, lx: usize, ly: usize) -> Option<MineralKind> {
        let edge = self.size as usize;
        (lx < edge && ly < edge).then(|| self.cells[lx * edge + ly])
    }

    /// Nested `[x][y]` identifiers.
    #[must_use]
    pub fn to_nested<'c>(&self, catalog: &'c Catalog) -> Vec<Vec<&'c str>> {
        self.cells
            .chunks(self.size as usize)
            .map(|row| row.iter().map(|&kind| catalog.mineral_name(kind)).collect())
            .collect()
    }
}

/// Projection of a request's inputs, for debugging generated output.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// Seed text.
    pub seed: String,
    /// World origin of the chunk.
    pub offsets: WorldPos,
    /// Offsets as requested (unresolved names included).
    pub probability_offsets: BTreeMap<String, f64>,
    /// Allowed minerals as requested.
    pub allowed_minerals: Vec<String>,
    /// Always false: classification has no spatial interaction.
    pub clustering_applied: bool,
}

impl DebugInfo {
    /// Builds the record from raw request inputs.
    #[must_use]
    pub fn new(
        seed: &str,
        origin: WorldPos,
        probability_offsets: &BTreeMap<String, f64>,
        allowed_minerals: &[String],
    ) -> Self {
        Self {
            seed: seed.to_owned(),
            offsets: origin,
            probability_offsets: probability_offsets.clone(),
            allowed_minerals: allowed_minerals.to_vec(),
            clustering_applied: false,
        }
    }
}

/// Chunk generator over a shared catalog.
pub struct ChunkGenerator {
    /// Catalog the classifier draws layers from.
    catalog: Arc<Catalog>,
    /// Dedicated pool; the global rayon pool when `None`.
    pool: Option<Arc<rayon::ThreadPool>>,
    /// Wall-clock cap per chunk.
    time_budget: Option<Duration>,
}

impl ChunkGenerator {
    /// Creates a generator on the global rayon pool with no time budget.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            pool: None,
            time_budget: None,
        }
    }

    /// Runs generation on a dedicated pool of `threads` workers.
    ///
    /// `0` keeps the global pool.
    ///
    /// # Errors
    ///
    /// Fails if the pool cannot be spawned.
    pub fn with_worker_threads(mut self, threads: usize) -> ProceduralResult<Self> {
        if threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("lithos-gen-{i}"))
                .build()?;
            self.pool = Some(Arc::new(pool));
        }
        Ok(self)
    }

    /// Caps generation time per chunk.
    #[must_use]
    pub const fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    /// The catalog this generator classifies against.
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared handle to the catalog.
    #[inline]
    #[must_use]
    pub fn catalog_arc(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    /// Generates a chunk.
    ///
    /// # Errors
    ///
    /// Returns [`ProceduralError::Timeout`] if the time budget runs out and
    /// [`ProceduralError::CoordinateOverflow`] if the chunk reaches past the
    /// coordinate range. The classifier itself never fails.
    pub fn generate(&self, params: &GenerationParams) -> ProceduralResult<Chunk> {
        let edge = params.size.get();
        params.origin.ensure_window(edge, edge, edge)?;
        let started = Instant::now();
        let classifier = VoxelClassifier::new(self.catalog.layers(), &params.offsets, &params.allowed);
        let size = params.size.get();
        let origin = params.origin;
        let deadline = self.time_budget.map(|budget| (started + budget, budget));

        let run = || -> ProceduralResult<Vec<Vec<MineralKind>>> {
            (0..size * size)
                .into_par_iter()
                .map(|column| {
                    if let Some((deadline, budget)) = deadline {
                        if Instant::now() >= deadline {
                            return Err(ProceduralError::Timeout {
                                budget_ms: u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
                            });
                        }
                    }
                    let x = origin.x + i64::from(column / size);
                    let y = origin.y + i64::from(column % size);
                    Ok((0..size)
                        .map(|lz| classifier.classify(&params.seed, x, y, origin.z + i64::from(lz)))
                        .collect())
                })
                .collect()
        };
        let columns = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let columns = match columns {
            Ok(columns) => columns,
            Err(err) => {
                tracing::warn!("Chunk generation for seed {:?} aborted: {}", params.seed, err);
                return Err(err);
            }
        };
        let voxels: Vec<MineralKind> = columns.into_iter().flatten().collect();

        tracing::debug!(
            "Generated {}³ chunk at ({}, {}, {}) for seed {:?} in {:?}",
            size,
            origin.x,
            origin.y,
            origin.z,
            params.seed,
            started.elapsed()
        );

        Ok(Chunk {
            origin,
            size: params.size,
            voxels: voxels.into_boxed_slice(),
        })
    }

    /// Classifies a single voxel with no adjustments.
    #[must_use]
    pub fn mineral_at(&self, seed: &str, pos: WorldPos) -> MineralKind {
        VoxelClassifier::new(
            self.catalog.layers(),
            &ProbabilityOffsets::new(),
            &AllowedSet::Unrestricted,
        )
        .classify(seed, pos.x, pos.y, pos.z)
    }

    /// Classifies a `size×size` grid at depth `origin.z`.
    ///
    /// # Errors
    ///
    /// Rejects `size` outside `[1, 1024]` and grids reaching past the
    /// coordinate range.
    pub fn generate_slice(&self, seed: &str, origin: WorldPos, size: u32) -> ProceduralResult<Slice> {
        if size < MIN_CHUNK_SIZE || size > MAX_SLICE_SIZE {
            return Err(ProceduralError::InvalidSize {
                size,
                min: MIN_CHUNK_SIZE,
                max: MAX_SLICE_SIZE,
            });
        }
        origin.ensure_window(size, size, 1)?;
        let classifier = VoxelClassifier::new(
            self.catalog.layers(),
            &ProbabilityOffsets::new(),
            &AllowedSet::Unrestricted,
        );
        let run = || -> Vec<MineralKind> {
            (0..size * size)
                .into_par_iter()
                .map(|cell| {
                    classifier.classify(
                        seed,
                        origin.x + i64::from(cell / size),
                        origin.y + i64::from(cell % size),
                        origin.z,
                    )
                })
                .collect()
        };
        let cells = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        Ok(Slice {
            origin,
            size,
            cells: cells.into_boxed_slice(),
        })
    }
}
