//! # Mined Overlay
//!
//! Per-voxel excavation state laid over an immutable chunk.
//!
//! ## States
//!
//! ```text
//! Untouched ──(frontier reaches depth)──► Covered(variant) ──reveal──► Revealed(mineral)
//! ```
//!
//! Only the top layer (`z = 0`) starts covered. Once every cell at the
//! frontier depth is revealed, the frontier moves down one layer and that
//! layer's cells are covered with the overlay's variant. Nothing ever moves
//! backwards; the only way back to `Untouched` is a fresh overlay.
//!
//! ## Frontier
//!
//! The frontier is the shallowest depth that still holds a covered cell,
//! or the chunk edge once everything is cleared. A per-depth count of
//! covered cells keeps it O(1) to maintain after each reveal.

use lithos_procedural::{Chunk, ChunkSize, CoverVariant, MineralKind};

use crate::error::{MiningError, MiningResult, RevealError};

/// Excavation state of one cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellState {
    /// Below the frontier; not yet reachable.
    Untouched,
    /// Reachable but not yet mined.
    Covered(CoverVariant),
    /// Mined; shows the chunk's mineral.
    Revealed(MineralKind),
}

impl CellState {
    /// Returns true for [`CellState::Covered`].
    #[inline]
    #[must_use]
    pub const fn is_covered(self) -> bool {
        matches!(self, Self::Covered(_))
    }

    /// Returns true for [`CellState::Revealed`].
    #[inline]
    #[must_use]
    pub const fn is_revealed(self) -> bool {
        matches!(self, Self::Revealed(_))
    }
}

/// Excavation grid parallel to one chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MinedOverlay {
    size: ChunkSize,
    /// Variant applied to each newly covered layer.
    cover: CoverVariant,
    /// Indexed as [x][y][z], same as `Chunk`.
    cells: Box<[CellState]>,
    /// Covered cells remaining at each depth.
    covered_per_depth: Vec<u32>,
    frontier: u32,
}

impl MinedOverlay {
    /// Fresh overlay: the top layer covered, everything else untouched.
    #[must_use]
    pub fn new(size: ChunkSize, cover: CoverVariant) -> Self {
        let edge = size.edge();
        let mut overlay = Self {
            size,
            cover,
            cells: vec![CellState::Untouched; size.volume()].into_boxed_slice(),
            covered_per_depth: vec![0; edge],
            frontier: 0,
        };
        overlay.cover_depth(0);
        overlay
    }

    /// Fresh overlay matching `chunk`'s dimensions.
    #[must_use]
    pub fn initialize(chunk: &Chunk, cover: CoverVariant) -> Self {
        let overlay = Self::new(chunk.size(), cover);
        let origin = chunk.origin();
        tracing::info!(
            "Overlay initialized: {}³ at ({}, {}, {}) with cover variant {}",
            chunk.size().get(),
            origin.x,
            origin.y,
            origin.z,
            cover.index()
        );
        overlay
    }

    /// Rebuilds an overlay from raw cells, checking frontier consistency.
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::Corrupt`] if the cell count is wrong or the
    /// cells could not have been produced by reveals: a covered or
    /// untouched cell above the frontier, or a reachable cell at the
    /// frontier that was never covered.
    pub fn from_cells(size: ChunkSize, cover: CoverVariant, cells: Vec<CellState>) -> MiningResult<Self> {
        if cells.len() != size.volume() {
            return Err(MiningError::Corrupt(format!(
                "expected {} cells, found {}",
                size.volume(),
                cells.len()
            )));
        }
        let edge = size.edge();
        let mut covered_per_depth = vec![0u32; edge];
        for (index, cell) in cells.iter().enumerate() {
            if cell.is_covered() {
                covered_per_depth[index % edge] += 1;
            }
        }
        let mut overlay = Self {
            size,
            cover,
            cells: cells.into_boxed_slice(),
            covered_per_depth,
            frontier: 0,
        };
        overlay.frontier = overlay.compute_frontier();

        let frontier = overlay.frontier as usize;
        for (index, cell) in overlay.cells.iter().enumerate() {
            let z = index % edge;
            let consistent = match z.cmp(&frontier) {
                std::cmp::Ordering::Less => cell.is_revealed(),
                std::cmp::Ordering::Equal => *cell != CellState::Untouched,
                std::cmp::Ordering::Greater => *cell == CellState::Untouched,
            };
            if !consistent {
                return Err(MiningError::Corrupt(format!(
                    "cell {index} is {cell:?} with the frontier at {frontier}"
                )));
            }
        }
        Ok(overlay)
    }

    /// Overlay edge.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> ChunkSize {
        self.size
    }

    /// Variant used for newly covered layers.
    #[inline]
    #[must_use]
    pub const fn cover(&self) -> CoverVariant {
        self.cover
    }

    /// Current frontier depth; equals the edge when fully cleared.
    #[inline]
    #[must_use]
    pub const fn frontier(&self) -> u32 {
        self.frontier
    }

    /// Recomputes the frontier from scratch: the first depth with a covered
    /// cell, or the edge if there is none.
    #[must_use]
    pub fn compute_frontier(&self) -> u32 {
        self.covered_per_depth
            .iter()
            .position(|&count| count > 0)
            .map_or(self.size.get(), |depth| depth as u32)
    }

    /// Returns true once every cell is revealed.
    #[inline]
    #[must_use]
    pub const fn is_cleared(&self) -> bool {
        self.frontier == self.size.get()
    }

    /// State of one cell, if in bounds.
    #[must_use]
    pub fn cell(&self, x: usize, y: usize, z: usize) -> Option<CellState> {
        self.index(x, y, z).map(|index| self.cells[index])
    }

    /// All cells, `[x][y][z]` order.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// Number of revealed cells.
    #[must_use]
    pub fn revealed_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_revealed()).count()
    }

    /// Checks that this overlay could have been mined on `chunk`.
    ///
    /// # Errors
    ///
    /// Returns [`MiningError::DimensionMismatch`] if the edges differ and
    /// [`MiningError::MineralMismatch`] if a revealed cell shows something
    /// other than the chunk's voxel.
    pub fn ensure_matches(&self, chunk: &Chunk) -> MiningResult<()> {
        if chunk.size() != self.size {
            return Err(MiningError::DimensionMismatch {
                overlay: self.size.get(),
                chunk: chunk.size().get(),
            });
        }
        let edge = self.size.edge();
        let mismatch = self
            .cells
            .iter()
            .zip(chunk.voxels())
            .position(|(cell, &voxel)| matches!(*cell, CellState::Revealed(kind) if kind != voxel));
        match mismatch {
            Some(index) => Err(MiningError::MineralMismatch {
                x: index / (edge * edge),
                y: index / edge % edge,
                z: index % edge,
            }),
            None => Ok(()),
        }
    }

    /// Mines one cell, exposing the chunk's mineral underneath.
    ///
    /// Advances the frontier (covering the next layer) when this clears the
    /// frontier depth.
    ///
    /// # Errors
    ///
    /// Rejects out-of-bounds cells, cells below the frontier and cells that
    /// are not covered. A rejected reveal leaves the overlay untouched.
    pub fn reveal(&mut self, chunk: &Chunk, x: usize, y: usize, z: usize) -> Result<MineralKind, RevealError> {
        let out_of_bounds = RevealError::OutOfBounds {
            x,
            y,
            z,
            size: self.size.get(),
        };
        let index = self.index(x, y, z).ok_or(out_of_bounds)?;
        let mineral = chunk.get(x, y, z).ok_or(out_of_bounds)?;

        if z > self.frontier as usize {
            return Err(RevealError::OutOfFrontier {
                z,
                frontier: self.frontier,
            });
        }
        match self.cells[index] {
            CellState::Covered(_) => {}
            CellState::Revealed(_) => return Err(RevealError::AlreadyRevealed { x, y, z }),
            CellState::Untouched => return Err(RevealError::NotCovered { x, y, z }),
        }

        self.cells[index] = CellState::Revealed(mineral);
        self.covered_per_depth[z] -= 1;
        if self.covered_per_depth[z] == 0 && z == self.frontier as usize {
            self.advance_frontier();
        }
        Ok(mineral)
    }

    /// Moves the frontier past every fully revealed depth.
    fn advance_frontier(&mut self) {
        let from = self.frontier;
        let edge = self.size.get();
        let mut depth = from;
        while depth < edge && self.covered_per_depth[depth as usize] == 0 {
            depth += 1;
            if depth < edge {
                self.cover_depth(depth as usize);
            }
        }
        self.frontier = depth;

        tracing::info!("Frontier advanced: {} -> {} (edge {})", from, depth, edge);
        if depth == edge {
            tracing::info!("Overlay fully cleared ({}³)", edge);
        }
    }

    /// Covers every untouched cell at depth `z`.
    fn cover_depth(&mut self, z: usize) {
        let edge = self.size.edge();
        let mut covered = 0;
        for column in 0..edge * edge {
            let cell = &mut self.cells[column * edge + z];
            if *cell == CellState::Untouched {
                *cell = CellState::Covered(self.cover);
                covered += 1;
            }
        }
        self.covered_per_depth[z] += covered;
    }

    #[inline]
    fn index(&self, x: usize, y: usize, z: usize) -> Option<usize> {
        let edge = self.size.edge();
        (x < edge && y < edge && z < edge).then(|| (x * edge + y) * edge + z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lithos_procedural::WorldPos;

    fn kind(index: u16) -> MineralKind {
        MineralKind::from_index(index)
    }

    /// Chunk whose mineral at (x, y, z) is `x + y + z`.
    fn chunk(edge: u32) -> Chunk {
        let size = ChunkSize::new(edge).unwrap();
        let n = edge as u16;
        let mut voxels = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    voxels.push(kind(x + y + z));
                }
            }
        }
        Chunk::from_voxels(WorldPos::default(), size, voxels).unwrap()
    }

    fn overlay(chunk: &Chunk) -> MinedOverlay {
        MinedOverlay::initialize(chunk, CoverVariant::from_index(2))
    }

    fn clear_depth(overlay: &mut MinedOverlay, chunk: &Chunk, z: usize) {
        let edge = chunk.size().edge();
        for x in 0..edge {
            for y in 0..edge {
                overlay.reveal(chunk, x, y, z).unwrap();
            }
        }
    }

    #[test]
    fn test_initialize_covers_top_layer() {
        let chunk = chunk(3);
        let overlay = overlay(&chunk);
        assert_eq!(overlay.frontier(), 0);
        for x in 0..3 {
            for y in 0..3 {
                assert_eq!(overlay.cell(x, y, 0), Some(CellState::Covered(CoverVariant::from_index(2))));
                assert_eq!(overlay.cell(x, y, 1), Some(CellState::Untouched));
                assert_eq!(overlay.cell(x, y, 2), Some(CellState::Untouched));
            }
        }
        assert_eq!(overlay.revealed_count(), 0);
    }

    #[test]
    fn test_reveal_exposes_chunk_mineral() {
        let chunk = chunk(3);
        let mut overlay = overlay(&chunk);
        assert_eq!(overlay.reveal(&chunk, 2, 1, 0), Ok(kind(3)));
        assert_eq!(overlay.cell(2, 1, 0), Some(CellState::Revealed(kind(3))));
    }

    #[test]
    fn test_rejections_leave_overlay_unchanged() {
        let chunk = chunk(3);
        let mut overlay = overlay(&chunk);
        overlay.reveal(&chunk, 0, 0, 0).unwrap();
        let before = overlay.clone();

        assert_eq!(
            overlay.reveal(&chunk, 0, 0, 1),
            Err(RevealError::OutOfFrontier { z: 1, frontier: 0 })
        );
        assert_eq!(
            overlay.reveal(&chunk, 0, 0, 0),
            Err(RevealError::AlreadyRevealed { x: 0, y: 0, z: 0 })
        );
        assert_eq!(
            overlay.reveal(&chunk, 3, 0, 0),
            Err(RevealError::OutOfBounds { x: 3, y: 0, z: 0, size: 3 })
        );
        assert_eq!(overlay, before);
    }

    #[test]
    fn test_frontier_advances_and_covers_next_layer() {
        let chunk = chunk(3);
        let mut overlay = overlay(&chunk);
        clear_depth(&mut overlay, &chunk, 0);

        assert_eq!(overlay.frontier(), 1);
        assert_eq!(overlay.cell(1, 1, 1), Some(CellState::Covered(CoverVariant::from_index(2))));
        assert_eq!(overlay.cell(1, 1, 2), Some(CellState::Untouched));
        assert_eq!(overlay.reveal(&chunk, 1, 1, 1), Ok(kind(3)));
    }

    #[test]
    fn test_frontier_is_monotonic() {
        let chunk = chunk(4);
        let mut overlay = overlay(&chunk);
        let mut last = overlay.frontier();
        for z in 0..4 {
            for x in 0..4 {
                for y in 0..4 {
                    overlay.reveal(&chunk, x, y, z).unwrap();
                    assert!(overlay.frontier() >= last);
                    assert_eq!(overlay.frontier(), overlay.compute_frontier());
                    last = overlay.frontier();
                }
            }
        }
        assert!(overlay.is_cleared());
        assert_eq!(overlay.frontier(), 4);
        assert_eq!(overlay.revealed_count(), 64);
    }

    #[test]
    fn test_size_one_overlay() {
        let chunk = chunk(1);
        let mut overlay = overlay(&chunk);
        assert_eq!(overlay.reveal(&chunk, 0, 0, 0), Ok(kind(0)));
        assert!(overlay.is_cleared());
        assert_eq!(overlay.frontier(), 1);
    }

    #[test]
    fn test_from_cells_roundtrip() {
        let chunk = chunk(3);
        let mut overlay = overlay(&chunk);
        clear_depth(&mut overlay, &chunk, 0);
        overlay.reveal(&chunk, 2, 2, 1).unwrap();

        let rebuilt = MinedOverlay::from_cells(overlay.size(), overlay.cover(), overlay.cells().to_vec()).unwrap();
        assert_eq!(rebuilt, overlay);
    }

    #[test]
    fn test_from_cells_rejects_inconsistent_state() {
        let size = ChunkSize::new(2).unwrap();
        let cover = CoverVariant::from_index(0);

        // Revealed cell below a still-covered layer.
        let mut cells = MinedOverlay::new(size, cover).cells().to_vec();
        cells[1] = CellState::Revealed(kind(1));
        assert!(matches!(
            MinedOverlay::from_cells(size, cover, cells),
            Err(MiningError::Corrupt(_))
        ));

        // Wrong cell count.
        assert!(MinedOverlay::from_cells(size, cover, vec![CellState::Untouched; 7]).is_err());
    }

    #[test]
    fn test_dimension_check() {
        let small = chunk(2);
        let big = chunk(3);
        let overlay = overlay(&small);
        assert!(overlay.ensure_matches(&small).is_ok());
        assert!(matches!(
            overlay.ensure_matches(&big),
            Err(MiningError::DimensionMismatch { overlay: 2, chunk: 3 })
        ));
    }

    #[test]
    fn test_revealed_cells_must_match_chunk() {
        let original = chunk(2);
        let mut overlay = overlay(&original);
        overlay.reveal(&original, 1, 0, 0).unwrap();
        assert!(overlay.ensure_matches(&original).is_ok());

        // Same dimensions, different mineral under the revealed cell.
        let mut voxels = original.voxels().to_vec();
        let index = original.index(1, 0, 0).unwrap();
        voxels[index] = kind(9);
        let regenerated = Chunk::from_voxels(WorldPos::default(), original.size(), voxels).unwrap();
        assert!(matches!(
            overlay.ensure_matches(&regenerated),
            Err(MiningError::MineralMismatch { x: 1, y: 0, z: 0 })
        ));

        // Differences under covered cells are invisible to the overlay.
        let mut voxels = original.voxels().to_vec();
        voxels[original.index(0, 1, 0).unwrap()] = kind(9);
        let hidden = Chunk::from_voxels(WorldPos::default(), original.size(), voxels).unwrap();
        assert!(overlay.ensure_matches(&hidden).is_ok());
    }
}
