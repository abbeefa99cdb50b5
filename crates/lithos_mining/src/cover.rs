//! Cover-variant selection for fresh overlays.

use lithos_procedural::{Catalog, CoverVariant};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// How a fresh overlay picks its cover variant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CoverSelection {
    /// Always this variant.
    Explicit(CoverVariant),
    /// Derived from the generation seed; the same seed always gets the
    /// same cover.
    #[default]
    Seeded,
    /// Uniformly random per overlay.
    Random,
}

impl CoverSelection {
    /// Picks a variant from `catalog` for an overlay generated from `seed`.
    #[must_use]
    pub fn select(self, catalog: &Catalog, seed: &str) -> CoverVariant {
        let count = catalog.cover_variant_count();
        let index = match self {
            Self::Explicit(variant) => return variant,
            Self::Seeded => seeded_rng(seed).gen_range(0..count),
            Self::Random => rand::thread_rng().gen_range(0..count),
        };
        catalog
            .cover_variant_at(index)
            .unwrap_or_else(|| CoverVariant::from_index(0))
    }
}

/// ChaCha stream keyed by `SHA-256("<seed>:cover")`.
fn seeded_rng(seed: &str) -> ChaCha8Rng {
    let digest = Sha256::digest(format!("{seed}:cover").as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    ChaCha8Rng::from_seed(key)
}
