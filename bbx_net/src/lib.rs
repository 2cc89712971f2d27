//! # BBX Net
//!
//! The Device Control Bridge: an OSC-over-UDP control plane that translates
//! to the RME-family register protocol carried in MIDI SysEx.
//!
//! - [`address`] resolves OSC addresses to device registers (C8).
//! - [`register`] is the register layout and value-scaling arithmetic the
//!   address tree and the control server both build on.
//! - [`shadow`] is the device shadow state (C7): the server's belief about
//!   what the hardware holds, converged by SysEx echoes rather than by
//!   optimistically applying writes.
//! - [`server`] is the control server (C10) that ties the UDP socket, the
//!   SysEx transport, and the shadow together.

pub mod address;
pub mod error;
pub mod register;
pub mod server;
pub mod shadow;

pub use address::{Param, ParamKind};
pub use error::{NetError, Result};
pub use server::{ControlServer, ControlServerConfig};
pub use shadow::{DeviceShadow, LevelFrame, LevelTarget};
