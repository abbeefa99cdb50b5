//! Overlay identity: the catalog and full parameter tuple an overlay belongs to.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use lithos_procedural::{Catalog, ChunkCoord, ChunkSize, WorldPos};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Every input that shapes a chunk, in canonical form.
///
/// Two keys are equal exactly when their chunks are identical, so a
/// persisted overlay is only ever restored onto the chunk it was mined on.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayKey {
    /// Fingerprint of the catalog the chunk was classified with.
    catalog: [u8; 32],
    seed: String,
    world_offset: WorldPos,
    chunk: ChunkCoord,
    size: u32,
    probability_offsets: BTreeMap<String, f64>,
    /// `None` when unrestricted.
    allowed_minerals: Option<BTreeSet<String>>,
}

impl OverlayKey {
    /// Builds a key. An empty allowed list means unrestricted.
    #[must_use]
    pub fn new(
        catalog: &Catalog,
        seed: &str,
        world_offset: WorldPos,
        chunk: ChunkCoord,
        size: ChunkSize,
        probability_offsets: &BTreeMap<String, f64>,
        allowed_minerals: &[String],
    ) -> Self {
        Self {
            catalog: *catalog.fingerprint(),
            seed: seed.to_owned(),
            world_offset,
            chunk,
            size: size.get(),
            probability_offsets: probability_offsets.clone(),
            allowed_minerals: (!allowed_minerals.is_empty())
                .then(|| allowed_minerals.iter().cloned().collect()),
        }
    }

    /// Seed text.
    #[must_use]
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// SHA-256 over a length-prefixed encoding of every field.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        fn text(hasher: &mut Sha256, value: &str) {
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }

        let mut hasher = Sha256::new();
        hasher.update(self.catalog);
        text(&mut hasher, &self.seed);
        for coord in [self.world_offset.x, self.world_offset.y, self.world_offset.z] {
            hasher.update(coord.to_le_bytes());
        }
        for coord in [self.chunk.x, self.chunk.y, self.chunk.z] {
            hasher.update(coord.to_le_bytes());
        }
        hasher.update(self.size.to_le_bytes());

        hasher.update((self.probability_offsets.len() as u64).to_le_bytes());
        for (name, delta) in &self.probability_offsets {
            text(&mut hasher, name);
            hasher.update(delta.to_bits().to_le_bytes());
        }

        match &self.allowed_minerals {
            None => hasher.update([0u8]),
            Some(names) => {
                hasher.update([1u8]);
                hasher.update((names.len() as u64).to_le_bytes());
                for name in names {
                    text(&mut hasher, name);
                }
            }
        }

        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    /// Lowercase hex of the fingerprint.
    #[must_use]
    pub fn hex(&self) -> String {
        self.fingerprint()
            .iter()
            .fold(String::with_capacity(64), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }
}
