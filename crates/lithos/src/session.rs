//! # Explorer Session
//!
//! Ties generation, the mining overlay and overlay persistence together
//! for one explorer.
//!
//! ## Concurrency
//!
//! A session owns at most one active chunk and its overlay. Generation,
//! reveals and overlay I/O all run under the session lock, so reveals are
//! mutually exclusive and persistence never interleaves with a generation
//! for the same parameter tuple.
//!
//! ## Invalidation
//!
//! Generating with a different parameter tuple discards the active overlay
//! and restores (or freshly initializes) the one belonging to the new
//! tuple. Regenerating the same tuple keeps mining progress.

use std::sync::Arc;

use lithos_mining::{CellState, CoverSelection, MinedOverlay, OverlayKey, OverlayStore};
use lithos_procedural::{Catalog, Chunk, ChunkGenerator};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::ExplorerConfig;
use crate::error::{ExplorerError, ExplorerResult};
use crate::request::{GenerationRequest, GenerationResponse};

/// Outcome of a successful reveal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealOutcome {
    /// Mineral now exposed.
    pub mineral: String,
    /// Frontier after the reveal.
    pub frontier: u32,
    /// True once the whole chunk is mined.
    pub cleared: bool,
}

/// What an observer may see of one cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "id", rename_all = "camelCase")]
pub enum CellView {
    /// Below the frontier; contents unknown.
    Hidden,
    /// Minable, showing its cover variant.
    Covered(String),
    /// Mined, showing its mineral.
    Revealed(String),
}

/// Observable state of the active overlay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    /// Chunk edge.
    pub size: u32,
    /// Current frontier depth.
    pub frontier: u32,
    /// `[x][y][z]` cell views.
    pub cells: Vec<Vec<Vec<CellView>>>,
}

/// Chunk and overlay for the current parameter tuple.
struct ActiveChunk {
    key: OverlayKey,
    chunk: Chunk,
    overlay: MinedOverlay,
}

/// One explorer's view of the world.
pub struct ExplorerSession {
    generator: ChunkGenerator,
    store: OverlayStore,
    cover: CoverSelection,
    max_size: u32,
    active: Mutex<Option<ActiveChunk>>,
}

impl ExplorerSession {
    /// Builds a session from config: loads the catalog, sizes the worker
    /// pool and opens the overlay store.
    ///
    /// # Errors
    ///
    /// Fails if the catalog cannot be loaded, the pool cannot be built,
    /// the overlay directory cannot be created or the cover variant is
    /// unknown.
    pub fn from_config(config: &ExplorerConfig) -> ExplorerResult<Self> {
        config.validate()?;
        let catalog = Arc::new(Catalog::load(&config.catalog_path)?);
        let cover = config.cover_selection(&catalog)?;
        let generator = ChunkGenerator::new(Arc::clone(&catalog))
            .with_worker_threads(config.generation.worker_threads)?
            .with_time_budget(config.time_budget());
        let store = match &config.mining.overlay_dir {
            Some(dir) => OverlayStore::on_disk(dir, Arc::clone(&catalog))?,
            None => OverlayStore::in_memory(Arc::clone(&catalog)),
        };
        tracing::info!(
            "Explorer session ready: catalog {} ({} minerals), overlays {}",
            config.catalog_path.display(),
            catalog.mineral_count(),
            config
                .mining
                .overlay_dir
                .as_ref()
                .map_or_else(|| "in memory".to_owned(), |dir| dir.display().to_string())
        );
        Ok(Self::new(generator, store, cover, config.generation.max_size))
    }

    /// Builds a session from parts.
    #[must_use]
    pub fn new(generator: ChunkGenerator, store: OverlayStore, cover: CoverSelection, max_size: u32) -> Self {
        Self {
            generator,
            store,
            cover,
            max_size,
            active: Mutex::new(None),
        }
    }

    /// The generator, for stateless queries (single voxels, slices).
    #[inline]
    #[must_use]
    pub fn generator(&self) -> &ChunkGenerator {
        &self.generator
    }

    /// The catalog in use.
    #[inline]
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.generator.catalog()
    }

    /// Generates the requested chunk and makes it the active one.
    ///
    /// # Errors
    ///
    /// Fails on invalid requests, generation timeouts and overlay I/O
    /// errors. A failed request leaves the previous chunk active.
    pub fn generate(&self, request: &GenerationRequest) -> ExplorerResult<GenerationResponse> {
        let size = request.validate(self.max_size)?;
        let catalog = self.generator.catalog();
        let key = request.overlay_key(catalog, size);

        let mut active = self.active.lock();
        let reuse = active.as_ref().is_some_and(|current| current.key == key);
        if !reuse {
            let params = request.params(catalog, size)?;
            tracing::debug!(
                "Generating {}³ chunk for seed {:?} (origin {:?}, {} offsets, {} allowed)",
                size.get(),
                request.seed,
                params.origin,
                request.probability_offsets.len(),
                request.allowed_minerals.len()
            );
            let chunk = self.generator.generate(&params)?;
            let overlay = self
                .store
                .restore_or_initialize(&key, &chunk, || self.cover.select(catalog, &request.seed))?;
            if let Some(previous) = active.take() {
                tracing::info!("Overlay {} invalidated by new parameters", previous.key.hex());
            }
            *active = Some(ActiveChunk { key, chunk, overlay });
        }

        let Some(current) = active.as_ref() else {
            return Err(ExplorerError::NoActiveChunk);
        };
        let chunk = current
            .chunk
            .to_nested(catalog)
            .into_iter()
            .map(|plane| {
                plane
                    .into_iter()
                    .map(|column| column.into_iter().map(str::to_owned).collect())
                    .collect()
            })
            .collect();
        Ok(GenerationResponse {
            chunk,
            debug_info: request.debug.then(|| request.debug_info(size)).transpose()?,
        })
    }

    /// Mines one cell of the active chunk and persists the result.
    ///
    /// The reveal only takes effect once it is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::Reveal`] when the overlay refuses the cell,
    /// [`ExplorerError::NoActiveChunk`] before the first generation, and a
    /// mining error if persisting fails. The overlay is unchanged on error.
    pub fn reveal(&self, x: usize, y: usize, z: usize) -> ExplorerResult<RevealOutcome> {
        let mut active = self.active.lock();
        let current = active.as_mut().ok_or(ExplorerError::NoActiveChunk)?;

        let mut next = current.overlay.clone();
        let mineral = next.reveal(&current.chunk, x, y, z)?;
        let mut lease = self.store.lease(&current.key);
        lease.stage(&next);
        lease.commit()?;
        current.overlay = next;

        Ok(RevealOutcome {
            mineral: self.catalog().mineral_name(mineral).to_owned(),
            frontier: current.overlay.frontier(),
            cleared: current.overlay.is_cleared(),
        })
    }

    /// Current frontier of the active overlay.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::NoActiveChunk`] before the first generation.
    pub fn frontier(&self) -> ExplorerResult<u32> {
        self.active
            .lock()
            .as_ref()
            .map(|current| current.overlay.frontier())
            .ok_or(ExplorerError::NoActiveChunk)
    }

    /// What an observer may see of the active overlay.
    ///
    /// Cells below the frontier are hidden even though the chunk knows
    /// their contents.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::NoActiveChunk`] before the first generation.
    pub fn view(&self) -> ExplorerResult<OverlayView> {
        let active = self.active.lock();
        let current = active.as_ref().ok_or(ExplorerError::NoActiveChunk)?;
        let catalog = self.catalog();
        let overlay = &current.overlay;
        let edge = overlay.size().edge();

        let cells = overlay
            .cells()
            .chunks(edge * edge)
            .map(|plane| {
                plane
                    .chunks(edge)
                    .map(|column| {
                        column
                            .iter()
                            .map(|cell| match *cell {
                                CellState::Untouched => CellView::Hidden,
                                CellState::Covered(variant) => CellView::Covered(
                                    catalog.cover_variant_name(variant).unwrap_or_default().to_owned(),
                                ),
                                CellState::Revealed(mineral) => {
                                    CellView::Revealed(catalog.mineral_name(mineral).to_owned())
                                }
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        Ok(OverlayView {
            size: overlay.size().get(),
            frontier: overlay.frontier(),
            cells,
        })
    }

    /// Starts the active chunk's mining over with a fresh overlay.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::NoActiveChunk`] before the first generation
    /// and a mining error if the store cannot be updated.
    pub fn reset(&self) -> ExplorerResult<()> {
        let mut active = self.active.lock();
        let current = active.as_mut().ok_or(ExplorerError::NoActiveChunk)?;
        let cover = self.cover.select(self.catalog(), current.key.seed());
        let overlay = MinedOverlay::initialize(&current.chunk, cover);

        let mut lease = self.store.lease(&current.key);
        lease.discard()?;
        lease.stage(&overlay);
        lease.commit()?;

        tracing::info!("Overlay {} reset", current.key.hex());
        current.overlay = overlay;
        Ok(())
    }

    /// Drops the active chunk and overlay. Persisted progress is kept.
    pub fn invalidate(&self) {
        if let Some(previous) = self.active.lock().take() {
            tracing::info!("Overlay {} invalidated", previous.key.hex());
        }
    }
}
