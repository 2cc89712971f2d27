//! DSP block implementations.
//!
//! Blocks are organized into categories:
//! - [`effectors`]: Transform audio (gain, filtering, channel routing)
//! - [`io`]: Handle file I/O

pub mod effectors;
pub mod io;

pub use effectors::{
    channel_merger::ChannelMergerBlock,
    channel_router::{ChannelMode, ChannelRouterBlock},
    channel_splitter::ChannelSplitterBlock,
    dc_blocker::DcBlockerBlock,
    gain::GainBlock,
    low_pass_filter::LowPassFilterBlock,
    matrix_mixer::MatrixMixerBlock,
};
#[cfg(feature = "std")]
pub use io::{file_input::FileInputBlock, file_output::FileOutputBlock};
