//! # Voxel Classifier
//!
//! Maps `(seed, x, y, z)` to a mineral with a depth-dependent weighted draw.
//!
//! ## Algorithm
//!
//! 1. Key: `"<seed>:<x>:<y>:<z>"` (base-10 integers, colon-delimited)
//! 2. SHA-256 of the key bytes
//! 3. Last 8 digest bytes, big-endian, as `H: u64`
//! 4. `normalized = H / 2^64`
//! 5. Layer lookup on `z`; no layer means `void`
//! 6. Offsets adjust weights of minerals the layer already lists; an
//!    adjusted weight below zero (or NaN) is clamped to zero
//! 7. A non-empty allowed set filters the table
//! 8. Non-positive total means `void`
//! 9. Cumulative `weight / total` in identifier order; the first threshold
//!    above `normalized` wins, else the last mineral
//!
//! The key format, digest slice and identifier order are all load-bearing:
//! another implementation reproduces every voxel only if it matches them.
//! Step 6's clamp matters too. Summing negative weights unclamped shrinks
//! the total, so under negative offsets an unclamped implementation draws
//! from a different distribution.
//!
//! ## Determinism Guarantee
//!
//! The classifier is a pure function. It never fails; every degenerate case
//! degrades to `void`.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use crate::catalog::MineralKind;
use crate::layer::{DepthLayer, DepthLayerTable, LayerRange};

/// `2^64` as a float, the normalization divisor.
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

/// Signed adjustments to layer weights, keyed by mineral.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProbabilityOffsets(BTreeMap<MineralKind, f64>);

impl ProbabilityOffsets {
    /// No adjustments.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the adjustment for one mineral.
    pub fn insert(&mut self, kind: MineralKind, delta: f64) {
        self.0.insert(kind, delta);
    }

    /// Adjustment for one mineral, if any.
    #[must_use]
    pub fn get(&self, kind: MineralKind) -> Option<f64> {
        self.0.get(&kind).copied()
    }

    /// Number of adjusted minerals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is adjusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Adjustments in mineral order.
    pub fn iter(&self) -> impl Iterator<Item = (MineralKind, f64)> + '_ {
        self.0.iter().map(|(&kind, &delta)| (kind, delta))
    }
}

impl FromIterator<(MineralKind, f64)> for ProbabilityOffsets {
    fn from_iter<I: IntoIterator<Item = (MineralKind, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Optional restriction on candidate minerals.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AllowedSet {
    /// Every mineral in the layer is a candidate.
    #[default]
    Unrestricted,
    /// Only these minerals survive; an empty set filters everything.
    Only(BTreeSet<MineralKind>),
}

impl AllowedSet {
    /// Returns true if `kind` survives the filter.
    #[inline]
    #[must_use]
    pub fn permits(&self, kind: MineralKind) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Only(set) => set.contains(&kind),
        }
    }
}

/// Builds the canonical hash key for a voxel.
#[must_use]
pub fn voxel_key(seed: &str, x: i64, y: i64, z: i64) -> String {
    format!("{seed}:{x}:{y}:{z}")
}

/// Low 64 bits of the SHA-256 digest of the voxel key.
#[must_use]
pub fn voxel_hash(seed: &str, x: i64, y: i64, z: i64) -> u64 {
    let digest = Sha256::digest(voxel_key(seed, x, y, z).as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[24..32]);
    u64::from_be_bytes(low)
}

/// Maps a hash onto `[0, 1)` (the top few hashes round up to exactly 1.0).
#[inline]
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalize(hash: u64) -> f64 {
    hash as f64 / TWO_POW_64
}

/// Effective weight table for one layer under fixed offsets and filter.
#[derive(Clone, Debug)]
struct SamplingTable {
    /// `(mineral, cumulative threshold)` in identifier order.
    thresholds: Vec<(MineralKind, f64)>,
}

impl SamplingTable {
    /// Returns `None` when the effective total is not positive.
    fn build(layer: &DepthLayer, offsets: &ProbabilityOffsets, allowed: &AllowedSet) -> Option<Self> {
        let weights: Vec<(MineralKind, f64)> = layer
            .probs()
            .iter()
            .map(|&(kind, base)| {
                let adjusted = base + offsets.get(kind).unwrap_or(0.0);
                // NaN also collapses to zero here.
                (kind, adjusted.max(0.0))
            })
            .filter(|&(kind, _)| allowed.permits(kind))
            .collect();

        let total = weights.iter().fold(0.0_f64, |acc, &(_, w)| acc + w);
        if total.is_nan() || total <= 0.0 {
            return None;
        }

        let mut cumulative = 0.0_f64;
        let thresholds = weights
            .into_iter()
            .map(|(kind, weight)| {
                cumulative += weight / total;
                (kind, cumulative)
            })
            .collect();
        Some(Self { thresholds })
    }

    fn sample(&self, normalized: f64) -> Option<MineralKind> {
        self.thresholds
            .iter()
            .find(|&&(_, threshold)| threshold > normalized)
            .or_else(|| self.thresholds.last())
            .map(|&(kind, _)| kind)
    }
}

/// Classifier with per-layer tables resolved once for a parameter set.
///
/// Offsets and the allowed set are fixed for a whole chunk, so the weight
/// arithmetic is done once per layer instead of once per voxel.
#[derive(Clone, Debug)]
pub struct VoxelClassifier {
    /// One entry per layer, in depth order.
    layers: Vec<(LayerRange, Option<SamplingTable>)>,
    void: MineralKind,
}

impl VoxelClassifier {
    /// Resolves the effective tables for every layer.
    #[must_use]
    pub fn new(layers: &DepthLayerTable, offsets: &ProbabilityOffsets, allowed: &AllowedSet) -> Self {
        Self {
            layers: layers
                .layers()
                .iter()
                .map(|layer| (layer.range(), SamplingTable::build(layer, offsets, allowed)))
                .collect(),
            void: layers.void(),
        }
    }

    /// Classifies one voxel.
    #[must_use]
    pub fn classify(&self, seed: &str, x: i64, y: i64, z: i64) -> MineralKind {
        let Some(table) = self.table_for(z) else {
            return self.void;
        };
        table
            .sample(normalize(voxel_hash(seed, x, y, z)))
            .unwrap_or(self.void)
    }

    /// Draws from the table at depth `z` with a caller-supplied value.
    #[must_use]
    pub fn sample_at_depth(&self, z: i64, normalized: f64) -> MineralKind {
        self.table_for(z)
            .and_then(|table| table.sample(normalized))
            .unwrap_or(self.void)
    }

    /// `None` for "no layer" and for "no positive weight".
    fn table_for(&self, z: i64) -> Option<&SamplingTable> {
        self.layers
            .iter()
            .find(|(range, _)| range.contains(z))
            .and_then(|(_, table)| table.as_ref())
    }
}

/// One-shot classification of a single voxel.
///
/// Prefer [`VoxelClassifier`] when classifying many voxels under the same
/// offsets.
#[must_use]
pub fn classify(
    seed: &str,
    x: i64,
    y: i64,
    z: i64,
    layers: &DepthLayerTable,
    offsets: &ProbabilityOffsets,
    allowed: &AllowedSet,
) -> MineralKind {
    VoxelClassifier::new(layers, offsets, allowed).classify(seed, x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::default_catalog;
    use crate::catalog::Catalog;

    fn classify_named(catalog: &Catalog, seed: &str, x: i64, y: i64, z: i64) -> String {
        let kind = classify(
            seed,
            x,
            y,
            z,
            catalog.layers(),
            &ProbabilityOffsets::new(),
            &AllowedSet::Unrestricted,
        );
        catalog.mineral_name(kind).to_owned()
    }

    #[test]
    fn test_key_format() {
        assert_eq!(voxel_key("default_seed", 0, -5, 36), "default_seed:0:-5:36");
        assert_eq!(voxel_key("a b", 1, 2, 3), "a b:1:2:3");
    }

    #[test]
    fn test_hash_is_low_digest_bytes() {
        // sha256("default_seed:0:0:0") ends in ...49a3525d7fb58970
        assert_eq!(voxel_hash("default_seed", 0, 0, 0), 0x49a3_525d_7fb5_8970);
        assert_eq!(voxel_hash("default_seed", 0, 0, 0), 5_306_175_347_500_616_048);
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize(0), 0.0);
        assert_eq!(normalize(1 << 63), 0.5);
        assert!(normalize(u64::MAX) <= 1.0);
    }

    #[test]
    fn test_reference_fixture() {
        let catalog = default_catalog();
        let fixture: &[(&str, i64, i64, i64, &str)] = &[
            ("default_seed", 0, 0, 0, "mica"),
            ("default_seed", 1, 2, 3, "feldspar"),
            ("default_seed", 5, 5, 11, "void"),
            ("lithos", 7, -3, 12, "quartz"),
            ("lithos", 100, 200, 35, "quartz"),
            ("lithos", -42, 17, 36, "void"),
            ("granite", 3, 1, 99, "feldspar"),
            ("granite", 0, 0, 1000, "void"),
            ("paris", 1_073_741_823, 5, 40, "void"),
            ("default_seed", 0, 0, -1, "void"),
        ];
        for &(seed, x, y, z, expected) in fixture {
            assert_eq!(
                classify_named(&catalog, seed, x, y, z),
                expected,
                "({seed}, {x}, {y}, {z})"
            );
        }
    }

    #[test]
    fn test_offsets_fixture() {
        let catalog = default_catalog();
        let offsets: ProbabilityOffsets =
            [(catalog.mineral("quartz").unwrap(), 0.5)].into_iter().collect();
        let classifier =
            VoxelClassifier::new(catalog.layers(), &offsets, &AllowedSet::Unrestricted);
        let got: Vec<&str> = (0..6)
            .map(|x| catalog.mineral_name(classifier.classify("lithos", x, 0, 5)))
            .collect();
        assert_eq!(got, ["feldspar", "quartz", "feldspar", "void", "mica", "quartz"]);
    }

    #[test]
    fn test_allowed_fixture() {
        let catalog = default_catalog();
        let allowed = catalog.resolve_allowed(&["gold", "quartz"]);
        let classifier =
            VoxelClassifier::new(catalog.layers(), &ProbabilityOffsets::new(), &allowed);
        let got: Vec<&str> = (0..6)
            .map(|x| catalog.mineral_name(classifier.classify("lithos", x, 0, 5)))
            .collect();
        assert_eq!(got, ["gold", "quartz", "gold", "quartz", "quartz", "quartz"]);
    }

    #[test]
    fn test_negative_offset_clamps_to_zero() {
        let catalog = default_catalog();
        let void = catalog.void();
        let offsets: ProbabilityOffsets = [(void, -1.0)].into_iter().collect();
        let classifier =
            VoxelClassifier::new(catalog.layers(), &offsets, &AllowedSet::Unrestricted);
        let got: Vec<&str> = (0..6)
            .map(|x| catalog.mineral_name(classifier.classify("lithos", x, 0, 5)))
            .collect();
        assert_eq!(got, ["feldspar", "gold", "feldspar", "quartz", "feldspar", "mica"]);

        // Void was driven below zero, so it can never be drawn in the surface layer.
        for x in 0..200 {
            assert_ne!(classifier.classify("lithos", x, 3, 2), void);
        }
    }

    #[test]
    fn test_all_weights_negative_yields_void() {
        let catalog = default_catalog();
        let offsets: ProbabilityOffsets = catalog.minerals().map(|(kind, _)| (kind, -10.0)).collect();
        let classifier =
            VoxelClassifier::new(catalog.layers(), &offsets, &AllowedSet::Unrestricted);
        for x in 0..50 {
            assert_eq!(classifier.classify("neg", x, 0, 0), catalog.void());
            assert_eq!(classifier.classify("neg", x, 0, 40), catalog.void());
        }
    }

    #[test]
    fn test_offset_never_introduces_mineral() {
        let catalog = default_catalog();
        let diamond = catalog.mineral("diamond").unwrap();
        // Diamond only exists in the deep layer; a huge surface offset is ignored.
        let offsets: ProbabilityOffsets = [(diamond, 1_000.0)].into_iter().collect();
        let classifier =
            VoxelClassifier::new(catalog.layers(), &offsets, &AllowedSet::Unrestricted);
        for x in 0..200 {
            assert_ne!(classifier.classify("intro", x, 0, 3), diamond);
        }
    }

    #[test]
    fn test_allowed_set_filters_void_entry() {
        let catalog = default_catalog();
        let allowed = catalog.resolve_allowed(&["quartz"]);
        let classifier =
            VoxelClassifier::new(catalog.layers(), &ProbabilityOffsets::new(), &allowed);
        let quartz = catalog.mineral("quartz").unwrap();
        for x in 0..100 {
            assert_eq!(classifier.classify("only", x, 1, 4), quartz);
        }
        // Above the first layer there is no table at all.
        assert_eq!(classifier.classify("only", 0, 0, -3), catalog.void());
    }

    #[test]
    fn test_empty_allowed_set_yields_void() {
        let catalog = default_catalog();
        let allowed = catalog.resolve_allowed(&["unobtainium"]);
        let classifier =
            VoxelClassifier::new(catalog.layers(), &ProbabilityOffsets::new(), &allowed);
        for x in 0..20 {
            assert_eq!(classifier.classify("none", x, 0, 0), catalog.void());
        }
    }

    #[test]
    fn test_single_candidate_layer() {
        let catalog = Catalog::from_toml_str(
            r#"
            cover_variants = ["dust"]
            [[layers]]
            key = "band"
            start = 0
            end = 64
            [minerals.alpha]
            prob_layers = { band = 2.0 }
            [minerals.beta]
            prob_layers = { band = 0.0 }
            "#,
        )
        .unwrap();
        let alpha = catalog.mineral("alpha").unwrap();
        let void = catalog.void();
        let classifier =
            VoxelClassifier::new(catalog.layers(), &ProbabilityOffsets::new(), &AllowedSet::Unrestricted);
        for x in -20..20 {
            for z in -4..70 {
                let kind = classifier.classify("single", x, x * 3, z);
                assert!(kind == alpha || kind == void, "unexpected {kind:?} at ({x}, {z})");
            }
        }
    }

    #[test]
    fn test_rounding_fallback_is_last_mineral() {
        let catalog = default_catalog();
        let classifier = VoxelClassifier::new(
            catalog.layers(),
            &ProbabilityOffsets::new(),
            &AllowedSet::Unrestricted,
        );
        // 1.0 is never strictly below a cumulative threshold.
        assert_eq!(classifier.sample_at_depth(0, 1.0), catalog.void());
        assert_eq!(
            classifier.sample_at_depth(0, 0.0),
            catalog.mineral("feldspar").unwrap()
        );
    }

    #[test]
    fn test_deterministic_across_calls() {
        let catalog = default_catalog();
        let a = classify_named(&catalog, "repeat", 9, 8, 7);
        for _ in 0..10 {
            assert_eq!(classify_named(&catalog, "repeat", 9, 8, 7), a);
        }
    }
}
