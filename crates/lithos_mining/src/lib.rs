//! # LITHOS Mining System
//!
//! Excavation progression laid over generated chunks.
//!
//! ## Design Principles
//!
//! 1. **Top-down** - A depth is minable only once every shallower depth is cleared
//! 2. **One-way** - Cells move `Covered -> Revealed`; reset is wholesale
//! 3. **Non-fatal rejection** - Refused reveals report why and change nothing
//! 4. **Keyed persistence** - An overlay is restored only onto the exact chunk it was mined on,
//!    under the same catalog
//!
//! ## Thread Safety
//!
//! An overlay has a single owner; callers serialize reveals. The store
//! serializes its own I/O through leases.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lithos_mining::{CoverSelection, OverlayKey, OverlayStore};
//!
//! let store = OverlayStore::in_memory(catalog.clone());
//! let key = OverlayKey::new(&catalog, seed, offset, coord, size, &offsets, &allowed);
//! let mut overlay = store.restore_or_initialize(&key, &chunk, || {
//!     CoverSelection::Seeded.select(&catalog, seed)
//! })?;
//!
//! let mineral = overlay.reveal(&chunk, 3, 4, 0)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod codec;
pub mod cover;
pub mod error;
pub mod key;
pub mod overlay;
pub mod store;

pub use cover::CoverSelection;
pub use error::{MiningError, MiningResult, RevealError};
pub use key::OverlayKey;
pub use overlay::{CellState, MinedOverlay};
pub use store::{FileBackend, MemoryBackend, OverlayBackend, OverlayLease, OverlayStore};
