//! Convenience re-exports for common bbx_dsp usage.
//!
//! # Example
//!
//! ```ignore
//! use bbx_dsp::prelude::*;
//!
//! let mut gain = GainBlock::<f32>::new(-6.0, 20.0, 2);
//! let mut block: BlockType<f32> = gain.into();
//! ```

pub use crate::blocks::{
    ChannelMergerBlock, ChannelMode, ChannelRouterBlock, ChannelSplitterBlock, DcBlockerBlock, FileInputBlock,
    FileOutputBlock, GainBlock, LowPassFilterBlock, MatrixMixerBlock,
};
pub use crate::{
    block::{Block, BlockId, BlockType},
    buffer::SampleBuffer,
    context::{DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, DspContext},
    parameter::{ModulationOutput, Parameter},
    sample::Sample,
    smoothing::SmoothedValue,
};
