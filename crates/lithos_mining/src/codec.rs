//! # Overlay Codec
//!
//! Compact, checksummed byte format for persisted overlays.
//!
//! ## Format
//!
//! ```text
//! [4 bytes: magic "LOVL"]
//! [2 bytes: version]
//! [32 bytes: parameter-tuple fingerprint]
//! [4 bytes: edge]
//! [2 bytes: cover variant]
//! [4 bytes: uncompressed cell bytes, must equal 3 × size³]
//! [N bytes: LZ4 block of size³ cells]
//! [4 bytes: CRC32 of everything above]
//!
//! Cell format (3 bytes, [x][y][z] order):
//! [1 byte: tag (0 = untouched, 1 = covered, 2 = revealed)]
//! [2 bytes: cover variant or mineral index]
//! ```
//!
//! All integers are little-endian.

use lithos_procedural::{Catalog, ChunkSize, CoverVariant, MineralKind};

use crate::error::{MiningError, MiningResult};
use crate::overlay::{CellState, MinedOverlay};

/// Magic bytes identifying an overlay file.
const OVERLAY_MAGIC: &[u8; 4] = b"LOVL";

/// Current overlay format version.
const OVERLAY_VERSION: u16 = 1;

/// Bytes before the compressed payload.
const HEADER_LEN: usize = 4 + 2 + 32 + 4 + 2;

/// Trailing checksum.
const CRC_LEN: usize = 4;

/// Bytes per encoded cell.
const CELL_LEN: usize = 3;

const TAG_UNTOUCHED: u8 = 0;
const TAG_COVERED: u8 = 1;
const TAG_REVEALED: u8 = 2;

/// Encodes an overlay under a parameter-tuple fingerprint.
#[must_use]
pub fn encode(overlay: &MinedOverlay, fingerprint: &[u8; 32]) -> Vec<u8> {
    let mut cells = Vec::with_capacity(overlay.cells().len() * CELL_LEN);
    for cell in overlay.cells() {
        let (tag, value) = match *cell {
            CellState::Untouched => (TAG_UNTOUCHED, 0),
            CellState::Covered(variant) => (TAG_COVERED, variant.index()),
            CellState::Revealed(mineral) => (TAG_REVEALED, mineral.index()),
        };
        cells.push(tag);
        cells.extend_from_slice(&value.to_le_bytes());
    }
    let payload = lz4_flex::compress_prepend_size(&cells);

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + CRC_LEN);
    buf.extend_from_slice(OVERLAY_MAGIC);
    buf.extend_from_slice(&OVERLAY_VERSION.to_le_bytes());
    buf.extend_from_slice(fingerprint);
    buf.extend_from_slice(&overlay.size().get().to_le_bytes());
    buf.extend_from_slice(&overlay.cover().index().to_le_bytes());
    buf.extend_from_slice(&payload);

    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

/// Decodes an overlay, returning it with the fingerprint it was stored under.
///
/// Every index is checked against `catalog` so a restored overlay can never
/// name a mineral or cover variant the running catalog does not have.
///
/// # Errors
///
/// Fails on a wrong magic or version, a checksum mismatch, a truncated or
/// undecompressable payload, unknown indices, or cells that violate the
/// frontier rules.
pub fn decode(bytes: &[u8], catalog: &Catalog) -> MiningResult<([u8; 32], MinedOverlay)> {
    if bytes.len() < HEADER_LEN + CRC_LEN {
        return Err(MiningError::Corrupt(format!("{} bytes is shorter than the header", bytes.len())));
    }
    if &bytes[0..4] != OVERLAY_MAGIC {
        return Err(MiningError::BadMagic);
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != OVERLAY_VERSION {
        return Err(MiningError::UnsupportedVersion(version));
    }

    let (body, crc_bytes) = bytes.split_at(bytes.len() - CRC_LEN);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed = crc32fast::hash(body);
    if stored != computed {
        return Err(MiningError::ChecksumMismatch { stored, computed });
    }

    let mut fingerprint = [0u8; 32];
    fingerprint.copy_from_slice(&body[6..38]);
    let size = ChunkSize::new(u32::from_le_bytes([body[38], body[39], body[40], body[41]]))?;
    let cover = CoverVariant::from_index(u16::from_le_bytes([body[42], body[43]]));
    if catalog.cover_variant_name(cover).is_none() {
        return Err(MiningError::Corrupt(format!("unknown cover variant {}", cover.index())));
    }

    // The size prefix is checked before anything is allocated from it.
    let payload = &body[HEADER_LEN..];
    let expected = size.volume() * CELL_LEN;
    if payload.len() < 4 {
        return Err(MiningError::Corrupt("missing cell payload".to_owned()));
    }
    let (prefix, block) = payload.split_at(4);
    let declared = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    let declared = usize::try_from(declared).unwrap_or(usize::MAX);
    if declared != expected {
        return Err(MiningError::Corrupt(format!(
            "expected {expected} cell bytes, payload declares {declared}"
        )));
    }
    let mut raw = vec![0u8; expected];
    let written = lz4_flex::block::decompress_into(block, &mut raw)?;
    if written != expected {
        return Err(MiningError::Corrupt(format!(
            "expected {expected} cell bytes, found {written}"
        )));
    }

    let mineral_count = catalog.mineral_count();
    let cells = raw
        .chunks_exact(CELL_LEN)
        .map(|cell| {
            let value = u16::from_le_bytes([cell[1], cell[2]]);
            match cell[0] {
                TAG_UNTOUCHED => Ok(CellState::Untouched),
                TAG_COVERED => {
                    let variant = CoverVariant::from_index(value);
                    catalog
                        .cover_variant_name(variant)
                        .map(|_| CellState::Covered(variant))
                        .ok_or_else(|| MiningError::Corrupt(format!("unknown cover variant {value}")))
                }
                TAG_REVEALED if usize::from(value) < mineral_count => {
                    Ok(CellState::Revealed(MineralKind::from_index(value)))
                }
                TAG_REVEALED => Err(MiningError::Corrupt(format!("unknown mineral {value}"))),
                tag => Err(MiningError::Corrupt(format!("invalid cell tag {tag}"))),
            }
        })
        .collect::<MiningResult<Vec<_>>>()?;

    Ok((fingerprint, MinedOverlay::from_cells(size, cover, cells)?))
}
