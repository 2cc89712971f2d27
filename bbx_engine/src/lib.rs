//! # BBX Engine
//!
//! The engine facade (C6): ties the processing graph (C5), the hardware
//! driver adapter (C3), file-backed nodes (C4.3/C4.4), and — when
//! configured — the OSC/SysEx device control bridge (`bbx_net`/`bbx_midi`)
//! together behind one JSON-configured binary.
//!
//! - [`config`] loads and validates the JSON configuration file (C11).
//! - [`node`] is the polymorphic audio node contract and its five variants (C4).
//! - [`graph`] is the processing graph: topological order and tick dispatch (C5).
//! - [`status`] is the lock-free status-event pipeline (C12).
//! - [`facade`] is [`facade::Engine`] itself (C6): boot, run, stop.

pub mod config;
pub mod error;
pub mod facade;
pub mod graph;
pub mod node;
pub mod status;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use facade::Engine;
