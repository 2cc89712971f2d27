//! Per-tick evaluation context threaded through block `process` calls.

use crate::channel::ChannelLayout;

/// Default sample rate used when a caller doesn't specify one explicitly.
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

/// Default buffer size (in frames) used when a caller doesn't specify one explicitly.
pub const DEFAULT_BUFFER_SIZE: usize = 512;

/// Carries the timing and layout information a block needs to compute
/// coefficients, advance phase accumulators, or make channel-routing
/// decisions, without requiring every block to store its own copy.
#[derive(Debug, Clone)]
pub struct DspContext {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Number of frames processed per `process` call.
    pub buffer_size: usize,
    /// Number of audio channels the graph is configured for.
    pub num_channels: usize,
    /// Running sample counter since the graph was prepared, used by blocks
    /// that need absolute phase (oscillators, LFOs).
    pub current_sample: u64,
    /// Channel layout the graph is configured for.
    pub channel_layout: ChannelLayout,
}

impl Default for DspContext {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            num_channels: 2,
            current_sample: 0,
            channel_layout: ChannelLayout::default(),
        }
    }
}
