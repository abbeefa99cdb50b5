//! # Location Resolution
//!
//! Maps free text ("Paris", "Mount Everest") to a region of the world.
//! The core treats the result as opaque input: it only ever sees the
//! offsets and weight adjustments the resolver hands back.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::chunk::WorldPos;
use crate::error::{ProceduralError, ProceduralResult};

/// Offsets are reduced into `[0, 2^30)` so they stay far from overflow.
const OFFSET_MODULUS: u32 = 1 << 30;

/// A resolved region.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLocation {
    /// World X offset.
    pub x_offset: i64,
    /// World Y offset.
    pub y_offset: i64,
    /// World Z offset.
    pub z_offset: i64,
    /// Geological setting, when the resolver knows one.
    pub crust_type: Option<String>,
    /// Weight adjustments suggested for this region.
    pub probability_offsets: BTreeMap<String, f64>,
}

impl ResolvedLocation {
    /// The offsets as a world position.
    #[inline]
    #[must_use]
    pub const fn world_offset(&self) -> WorldPos {
        WorldPos::new(self.x_offset, self.y_offset, self.z_offset)
    }
}

/// Turns location text into a [`ResolvedLocation`].
pub trait LocationResolver: Send + Sync {
    /// Resolves `location`.
    ///
    /// # Errors
    ///
    /// Implementations reject input they cannot map.
    fn resolve(&self, location: &str) -> ProceduralResult<ResolvedLocation>;
}

/// Deterministic resolver: the location text is hashed into offsets.
///
/// Knows nothing about geology, so `crust_type` is `None` and no weight
/// adjustments are suggested.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashedLocationResolver;

impl LocationResolver for HashedLocationResolver {
    fn resolve(&self, location: &str) -> ProceduralResult<ResolvedLocation> {
        if location.is_empty() {
            return Err(ProceduralError::Location("location is empty".to_owned()));
        }
        let digest = Sha256::digest(location.as_bytes());
        let word = |at: usize| {
            let bytes = [digest[at], digest[at + 1], digest[at + 2], digest[at + 3]];
            i64::from(u32::from_be_bytes(bytes) % OFFSET_MODULUS)
        };
        Ok(ResolvedLocation {
            x_offset: word(0),
            y_offset: word(4),
            z_offset: word(8),
            crust_type: None,
            probability_offsets: BTreeMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_locations() {
        let resolver = HashedLocationResolver;
        let paris = resolver.resolve("Paris").unwrap();
        assert_eq!(
            paris.world_offset(),
            WorldPos::new(500_331_188, 857_126_774, 666_428_368)
        );
        let everest = resolver.resolve("Mount Everest").unwrap();
        assert_eq!(
            everest.world_offset(),
            WorldPos::new(723_107_068, 603_127_661, 66_974_542)
        );
        assert!(everest.crust_type.is_none());
        assert!(everest.probability_offsets.is_empty());
    }

    #[test]
    fn test_offsets_in_range() {
        let resolver = HashedLocationResolver;
        for name in ["a", "Tokyo", "Lake Baikal", "   "] {
            let loc = resolver.resolve(name).unwrap();
            for offset in [loc.x_offset, loc.y_offset, loc.z_offset] {
                assert!((0..i64::from(OFFSET_MODULUS)).contains(&offset));
            }
        }
    }

    #[test]
    fn test_empty_location_rejected() {
        let err = HashedLocationResolver.resolve("").unwrap_err();
        assert!(matches!(err, ProceduralError::Location(_)));
    }

    #[test]
    fn test_case_sensitive() {
        let resolver = HashedLocationResolver;
        assert_ne!(resolver.resolve("paris").unwrap(), resolver.resolve("Paris").unwrap());
    }

    #[test]
    fn test_serialized_shape() {
        let loc = HashedLocationResolver.resolve("Paris").unwrap();
        let json = serde_json::to_value(&loc).unwrap();
        assert_eq!(json["xOffset"], 500_331_188);
        assert!(json["crustType"].is_null());
        assert!(json["probabilityOffsets"].as_object().unwrap().is_empty());
    }
}
