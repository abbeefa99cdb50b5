//! # LITHOS
//!
//! Explorable deterministic geology: the crate that puts generation and
//! mining behind one session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ExplorerSession                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌────────────────────┐          ┌────────────────────────┐  │
//! │  │ lithos_procedural  │  Chunk   │ lithos_mining          │  │
//! │  │                    │─────────>│                        │  │
//! │  │  • Catalog         │          │  • MinedOverlay        │  │
//! │  │  • Depth layers    │          │  • Frontier gating     │  │
//! │  │  • Classifier      │          │  • OverlayStore        │  │
//! │  │  • ChunkGenerator  │          │  • Overlay codec       │  │
//! │  └────────────────────┘          └────────────────────────┘  │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML explorer configuration
//! - `request`: Generation request/response shapes
//! - `session`: Generation, reveal and persistence under one lock

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod request;
pub mod session;

pub use lithos_mining as mining;
pub use lithos_procedural as procedural;

pub use config::{CoverMode, ExplorerConfig, GenerationConfig, MiningConfig};
pub use error::{ExplorerError, ExplorerResult};
pub use request::{GenerationRequest, GenerationResponse, DEFAULT_SEED, DEFAULT_SIZE};
pub use session::{CellView, ExplorerSession, OverlayView, RevealOutcome};
