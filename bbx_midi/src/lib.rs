//! # BBX MIDI
//!
//! SysEx framing and physical MIDI I/O for the device control bridge's
//! register protocol (C9 in the engine design).
//!
//! This crate provides:
//! - [`sysex`] - register <-> SysEx wire encoding (parity, base-128, framing)
//! - [`transport`] - real-time SysEx I/O over `midir`, wired to reader/writer threads
//!
//! The crate does not know anything about OSC addresses or device shadow
//! state; it only moves `(register, value)` pairs and decoded level frames
//! across the wire. That translation lives in `bbx_net`.

pub mod error;
pub mod sysex;

#[cfg(feature = "streaming")]
pub mod transport;

pub use error::{MidiError, Result};
pub use sysex::{DecodedSysEx, LevelReading, SubCommand};

#[cfg(feature = "streaming")]
pub use transport::SysExTransport;
