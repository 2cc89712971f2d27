//! # BBX Driver
//!
//! Hardware audio I/O adapter (C3 in the engine design): device enumeration,
//! block-size/sample-rate negotiation, and the real-time buffer-switch
//! callback that drives the processing graph. [`cpal_driver::CpalDriver`] is
//! the only backend today; the [`device::HardwareDriver`] trait is the seam
//! a future ASIO or JACK backend would implement against.

pub mod cpal_driver;
pub mod device;
pub mod error;

pub use cpal_driver::CpalDriver;
pub use device::{BufferSwitch, BufferSwitchCallback, DeviceInfo, HardwareDriver, StreamCapabilities};
pub use error::{DriverError, Result};
