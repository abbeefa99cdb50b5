//! # Depth Layers
//!
//! Geology is banded by depth. Each band is a half-open z-range with its own
//! base mineral weights; the deepest band may be unbounded to cover
//! "everything below here".
//!
//! Layers never overlap and are consulted in ascending range order, so the
//! first match is the only match. A depth outside every range has no layer.

use crate::catalog::MineralKind;
use crate::error::{ProceduralError, ProceduralResult};

/// Half-open depth range `[start, end)`; `end = None` is unbounded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerRange {
    /// First depth inside the range.
    pub start: i64,
    /// First depth past the range, if bounded.
    pub end: Option<i64>,
}

impl LayerRange {
    /// Creates a bounded range `[start, end)`.
    #[inline]
    #[must_use]
    pub const fn bounded(start: i64, end: i64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Creates an unbounded range `[start, ∞)`.
    #[inline]
    #[must_use]
    pub const fn unbounded(start: i64) -> Self {
        Self { start, end: None }
    }

    /// Returns true if `z` falls inside the range.
    #[inline]
    #[must_use]
    pub const fn contains(self, z: i64) -> bool {
        z >= self.start
            && match self.end {
                Some(end) => z < end,
                None => true,
            }
    }

    /// Returns true if the range contains no depth at all.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        match self.end {
            Some(end) => end <= self.start,
            None => false,
        }
    }
}

/// One depth band and its base weight table.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthLayer {
    key: String,
    range: LayerRange,
    /// Sorted by `MineralKind`, i.e. by identifier.
    probs: Vec<(MineralKind, f64)>,
}

impl DepthLayer {
    /// Creates a layer. Weights are re-sorted into identifier order.
    #[must_use]
    pub fn new(key: impl Into<String>, range: LayerRange, mut probs: Vec<(MineralKind, f64)>) -> Self {
        probs.sort_by_key(|&(kind, _)| kind);
        probs.dedup_by_key(|&mut (kind, _)| kind);
        Self {
            key: key.into(),
            range,
            probs,
        }
    }

    /// Layer key as named in the catalog.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Depth range of the layer.
    #[inline]
    #[must_use]
    pub const fn range(&self) -> LayerRange {
        self.range
    }

    /// Base weights in identifier order.
    #[inline]
    #[must_use]
    pub fn probs(&self) -> &[(MineralKind, f64)] {
        &self.probs
    }

    /// Base weight of one mineral, if the layer lists it.
    #[must_use]
    pub fn weight(&self, kind: MineralKind) -> Option<f64> {
        self.probs
            .binary_search_by_key(&kind, |&(k, _)| k)
            .ok()
            .map(|index| self.probs[index].1)
    }
}

/// Ordered, non-overlapping set of depth layers.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthLayerTable {
    /// Sorted by range start.
    layers: Vec<DepthLayer>,
    void: MineralKind,
}

impl DepthLayerTable {
    /// Builds a table, sorting layers by depth.
    ///
    /// # Errors
    ///
    /// Rejects empty ranges, duplicate keys and overlapping ranges
    /// (an unbounded layer overlaps anything deeper than its start).
    pub fn new(mut layers: Vec<DepthLayer>, void: MineralKind) -> ProceduralResult<Self> {
        for layer in &layers {
            match layer.range.end {
                Some(end) if layer.range.is_empty() => {
                    return Err(ProceduralError::EmptyLayer {
                        key: layer.key.clone(),
                        start: layer.range.start,
                        end,
                    });
                }
                _ => {}
            }
        }
        for (i, layer) in layers.iter().enumerate() {
            if layers[..i].iter().any(|other| other.key == layer.key) {
                return Err(ProceduralError::DuplicateLayer(layer.key.clone()));
            }
        }

        layers.sort_by_key(|layer| layer.range.start);
        for pair in layers.windows(2) {
            let overlaps = match pair[0].range.end {
                Some(end) => end > pair[1].range.start,
                None => true,
            };
            if overlaps {
                return Err(ProceduralError::LayerOverlap {
                    first: pair[0].key.clone(),
                    second: pair[1].key.clone(),
                });
            }
        }

        Ok(Self { layers, void })
    }

    /// Finds the layer containing depth `z`.
    #[must_use]
    pub fn lookup(&self, z: i64) -> Option<&DepthLayer> {
        self.layers.iter().find(|layer| layer.range.contains(z))
    }

    /// Layers in ascending depth order.
    #[inline]
    #[must_use]
    pub fn layers(&self) -> &[DepthLayer] {
        &self.layers
    }

    /// The `void` sentinel of the owning catalog.
    #[inline]
    #[must_use]
    pub const fn void(&self) -> MineralKind {
        self.void
    }

    /// Number of layers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns true if the table has no layers.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
