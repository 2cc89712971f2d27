//! Hardware driver adapter contract (C3).
//!
//! Wraps a real-time audio driver: device enumeration, negotiation of block
//! size / sample rate, channel buffer reservation, and the buffer-switch
//! callback itself. Implementations must never allocate or take a lock that
//! could contend with non-real-time work from inside [`start`](HardwareDriver::start)'s callback.

use crate::error::Result;

/// A discoverable audio device, returned by [`HardwareDriver::enumerate`].
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub name: String,
    pub max_input_channels: usize,
    pub max_output_channels: usize,
    pub input_channel_names: Vec<String>,
    pub output_channel_names: Vec<String>,
    pub default_sample_rate: u32,
}

/// Negotiated stream capabilities, returned by [`HardwareDriver::init`].
#[derive(Debug, Clone)]
pub struct StreamCapabilities {
    pub min_block_frames: u32,
    pub max_block_frames: u32,
    pub preferred_block_frames: u32,
    pub supported_sample_rates: Vec<u32>,
    pub current_sample_rate: u32,
    pub current_block_frames: u32,
    pub input_channel_names: Vec<String>,
    pub output_channel_names: Vec<String>,
}

/// One buffer-switch event delivered to the engine's tick callback.
///
/// `inputs`/`outputs` are planar, one slice per selected channel (in the
/// order passed to [`HardwareDriver::create_buffers`]), each exactly
/// `current_block_frames` samples. `double_index` alternates `0`/`1` across
/// successive callbacks, mirroring the hardware double-buffer model even
/// where the concrete backend (e.g. `cpal`) does not expose it directly.
pub struct BufferSwitch<'a> {
    pub double_index: usize,
    pub direct: bool,
    pub inputs: &'a [&'a [f32]],
    pub outputs: &'a mut [&'a mut [f32]],
}

/// Callback invoked on the driver's real-time thread for every block.
///
/// Must return within one block period: no allocation, no blocking locks.
pub type BufferSwitchCallback = Box<dyn FnMut(BufferSwitch<'_>) + Send>;

/// Contract for a real-time hardware audio driver adapter.
pub trait HardwareDriver {
    /// Enumerate available devices without opening any of them.
    fn enumerate(&self) -> Result<Vec<DeviceInfo>>;

    /// Open a device by name, or the host's default device if `name` is `None`.
    fn open(&mut self, name: Option<&str>) -> Result<()>;

    /// Close the currently open device, stopping the stream first if needed.
    fn close(&mut self) -> Result<()>;

    /// Negotiate block size and sample rate; query channel inventory.
    fn init(&mut self) -> Result<StreamCapabilities>;

    /// Reserve driver buffers for the given input/output channel subsets.
    /// Must be called after [`init`](Self::init) and before [`start`](Self::start).
    fn create_buffers(&mut self, input_channels: &[usize], output_channels: &[usize]) -> Result<()>;

    /// Install the buffer-switch callback and begin streaming.
    fn start(&mut self, callback: BufferSwitchCallback) -> Result<()>;

    /// Stop streaming and drain.
    fn stop(&mut self) -> Result<()>;
}
