//! # Mineral Catalog
//!
//! The catalog is the single source of mineral identifiers, depth layers and
//! cover variants. It is loaded from TOML once at startup:
//!
//! ```toml
//! cover_variants = ["topsoil", "gravel"]
//!
//! [[layers]]
//! key = "surface"
//! start = 0
//! end = 12
//!
//! [minerals.quartz]
//! color = [128, 128, 128]          # ignored by generation
//! prob_layers = { surface = 0.3 }
//! ```
//!
//! ## Identifier Order
//!
//! Mineral identifiers are interned in ascending lexicographic order, so
//! `MineralKind`'s `Ord` is the identifier order the classifier's weighted
//! sampling depends on. `void` is always registered, whether or not the
//! file gives it weights.
//!
//! ## Fingerprint
//!
//! Every catalog carries a SHA-256 over the parts generation and mining
//! depend on: identifiers, cover variants, layer ranges and weights. Two
//! catalogs with equal fingerprints classify every voxel identically.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::classifier::{AllowedSet, ProbabilityOffsets};
use crate::error::{ProceduralError, ProceduralResult};
use crate::layer::{DepthLayer, DepthLayerTable, LayerRange};

/// Identifier of the empty-space sentinel.
pub const VOID: &str = "void";

/// Interned mineral identifier.
///
/// Only meaningful together with the [`Catalog`] that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MineralKind(u16);

impl MineralKind {
    /// Returns the interned index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Rebuilds a kind from an interned index (used by persisted state).
    #[inline]
    #[must_use]
    pub const fn from_index(index: u16) -> Self {
        Self(index)
    }
}

/// Interned cover-variant identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoverVariant(u16);

impl CoverVariant {
    /// Returns the interned index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Rebuilds a variant from an interned index (used by persisted state).
    #[inline]
    #[must_use]
    pub const fn from_index(index: u16) -> Self {
        Self(index)
    }
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    cover_variants: Vec<String>,
    #[serde(default)]
    layers: Vec<LayerSpec>,
    #[serde(default)]
    minerals: BTreeMap<String, MineralSpec>,
}

#[derive(Deserialize)]
struct LayerSpec {
    key: String,
    start: i64,
    end: Option<i64>,
}

#[derive(Deserialize)]
struct MineralSpec {
    #[serde(default)]
    prob_layers: BTreeMap<String, f64>,
}

/// Loaded mineral catalog.
#[derive(Clone, Debug)]
pub struct Catalog {
    /// Mineral identifiers, sorted; index = `MineralKind`.
    minerals: Vec<String>,
    /// Cover variant identifiers in declaration order; index = `CoverVariant`.
    cover_variants: Vec<String>,
    /// Depth layers with per-layer base weights.
    layers: DepthLayerTable,
    /// Interned `void`.
    void: MineralKind,
    /// SHA-256 over everything above.
    fingerprint: [u8; 32],
}

impl Catalog {
    /// Loads a catalog from a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or does not describe a valid
    /// catalog. There is no fallback table.
    pub fn load(path: &Path) -> ProceduralResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ProceduralError::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&text)?;
        tracing::debug!(
            "Loaded catalog {}: {} minerals, {} layers, {} cover variants",
            path.display(),
            catalog.minerals.len(),
            catalog.layers.len(),
            catalog.cover_variants.len()
        );
        Ok(catalog)
    }

    /// Parses a catalog from TOML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown layer keys, invalid weights,
    /// overlapping layers or an empty cover-variant list.
    pub fn from_toml_str(text: &str) -> ProceduralResult<Self> {
        let file: CatalogFile = toml::from_str(text)?;
        Self::build(file)
    }

    fn build(file: CatalogFile) -> ProceduralResult<Self> {
        if file.cover_variants.is_empty() {
            return Err(ProceduralError::NoCoverVariants);
        }
        if file.cover_variants.len() > usize::from(u16::MAX) {
            return Err(ProceduralError::CatalogTooLarge {
                kind: "cover variant",
                count: file.cover_variants.len(),
            });
        }

        let mut names: BTreeSet<&str> = file.minerals.keys().map(String::as_str).collect();
        names.insert(VOID);
        if names.len() > usize::from(u16::MAX) {
            return Err(ProceduralError::CatalogTooLarge {
                kind: "mineral",
                count: names.len(),
            });
        }
        let minerals: Vec<String> = names.into_iter().map(str::to_owned).collect();
        let kind_of = |name: &str| {
            minerals
                .binary_search_by(|probe| probe.as_str().cmp(name))
                .ok()
                .and_then(|index| u16::try_from(index).ok())
                .map(MineralKind)
        };

        let layer_keys: BTreeSet<&str> = file.layers.iter().map(|l| l.key.as_str()).collect();
        let mut probs: BTreeMap<&str, Vec<(MineralKind, f64)>> = BTreeMap::new();
        for (mineral, spec) in &file.minerals {
            for (layer, &weight) in &spec.prob_layers {
                if !layer_keys.contains(layer.as_str()) {
                    return Err(ProceduralError::UnknownLayer {
                        mineral: mineral.clone(),
                        layer: layer.clone(),
                    });
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(ProceduralError::InvalidWeight {
                        mineral: mineral.clone(),
                        layer: layer.clone(),
                        weight,
                    });
                }
                if let Some(kind) = kind_of(mineral) {
                    probs.entry(layer.as_str()).or_default().push((kind, weight));
                }
            }
        }

        let void = kind_of(VOID).unwrap_or(MineralKind(0));
        let layers = file
            .layers
            .iter()
            .map(|spec| {
                let range = match spec.end {
                    Some(end) => LayerRange::bounded(spec.start, end),
                    None => LayerRange::unbounded(spec.start),
                };
                let weights = probs.remove(spec.key.as_str()).unwrap_or_default();
                DepthLayer::new(spec.key.clone(), range, weights)
            })
            .collect();
        let layers = DepthLayerTable::new(layers, void)?;
        let fingerprint = fingerprint(&minerals, &file.cover_variants, &layers);

        Ok(Self {
            minerals,
            cover_variants: file.cover_variants,
            layers,
            void,
            fingerprint,
        })
    }

    /// SHA-256 identifying this catalog's generation-relevant content.
    #[inline]
    #[must_use]
    pub const fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// Returns the interned `void` sentinel.
    #[inline]
    #[must_use]
    pub const fn void(&self) -> MineralKind {
        self.void
    }

    /// Returns the depth layer table.
    #[inline]
    #[must_use]
    pub const fn layers(&self) -> &DepthLayerTable {
        &self.layers
    }

    /// Looks up a mineral by identifier.
    #[must_use]
    pub fn mineral(&self, name: &str) -> Option<MineralKind> {
        self.minerals
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .ok()
            .and_then(|index| u16::try_from(index).ok())
            .map(MineralKind)
    }

    /// Returns the identifier of a mineral.
    ///
    /// Kinds from another catalog that fall outside this one read as `void`.
    #[must_use]
    pub fn mineral_name(&self, kind: MineralKind) -> &str {
        self.minerals
            .get(usize::from(kind.0))
            .map_or(VOID, String::as_str)
    }

    /// Iterates minerals in identifier order.
    pub fn minerals(&self) -> impl Iterator<Item = (MineralKind, &str)> {
        self.minerals
            .iter()
            .zip(0u16..)
            .map(|(name, index)| (MineralKind(index), name.as_str()))
    }

    /// Number of registered minerals, `void` included.
    #[inline]
    #[must_use]
    pub fn mineral_count(&self) -> usize {
        self.minerals.len()
    }

    /// Looks up a cover variant by identifier.
    #[must_use]
    pub fn cover_variant(&self, name: &str) -> Option<CoverVariant> {
        self.cover_variants
            .iter()
            .position(|v| v == name)
            .and_then(|index| u16::try_from(index).ok())
            .map(CoverVariant)
    }

    /// Returns the cover variant at a position in the declared list.
    #[must_use]
    pub fn cover_variant_at(&self, index: usize) -> Option<CoverVariant> {
        if index < self.cover_variants.len() {
            u16::try_from(index).ok().map(CoverVariant)
        } else {
            None
        }
    }

    /// Returns the identifier of a cover variant.
    #[must_use]
    pub fn cover_variant_name(&self, variant: CoverVariant) -> Option<&str> {
        self.cover_variants
            .get(usize::from(variant.0))
            .map(String::as_str)
    }

    /// Number of declared cover variants (never zero).
    #[inline]
    #[must_use]
    pub fn cover_variant_count(&self) -> usize {
        self.cover_variants.len()
    }

    /// Resolves named probability offsets.
    ///
    /// Names the catalog does not know are dropped; they could never match
    /// a layer entry anyway.
    #[must_use]
    pub fn resolve_offsets(&self, offsets: &BTreeMap<String, f64>) -> ProbabilityOffsets {
        offsets
            .iter()
            .filter_map(|(name, &delta)| self.mineral(name).map(|kind| (kind, delta)))
            .collect()
    }

    /// Resolves a named allowed-mineral list.
    ///
    /// An empty list is unrestricted. A non-empty list stays restrictive
    /// even when none of its names are known, in which case every voxel
    /// classifies as `void`.
    #[must_use]
    pub fn resolve_allowed<S: AsRef<str>>(&self, names: &[S]) -> AllowedSet {
        if names.is_empty() {
            return AllowedSet::Unrestricted;
        }
        AllowedSet::Only(
            names
                .iter()
                .filter_map(|name| self.mineral(name.as_ref()))
                .collect(),
        )
    }
}

/// Length-prefixed encoding of identifiers, cover variants and layers.
fn fingerprint(minerals: &[String], cover_variants: &[String], layers: &DepthLayerTable) -> [u8; 32] {
    fn text(hasher: &mut Sha256, value: &str) {
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }

    let mut hasher = Sha256::new();
    hasher.update((minerals.len() as u64).to_le_bytes());
    for name in minerals {
        text(&mut hasher, name);
    }
    hasher.update((cover_variants.len() as u64).to_le_bytes());
    for name in cover_variants {
        text(&mut hasher, name);
    }
    hasher.update((layers.len() as u64).to_le_bytes());
    for layer in layers.layers() {
        text(&mut hasher, layer.key());
        let range = layer.range();
        hasher.update(range.start.to_le_bytes());
        match range.end {
            Some(end) => {
                hasher.update([1u8]);
                hasher.update(end.to_le_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update((layer.probs().len() as u64).to_le_bytes());
        for &(kind, weight) in layer.probs() {
            hasher.update(kind.index().to_le_bytes());
            hasher.update(weight.to_bits().to_le_bytes());
        }
    }

    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
