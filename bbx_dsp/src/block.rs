//! DSP block system.
//!
//! This module defines the [`Block`] trait for DSP processing units and
//! [`BlockType`] for type-erased block storage in the graph.

use crate::{
    blocks::{
        effectors::{
            channel_merger::ChannelMergerBlock, channel_router::ChannelRouterBlock,
            channel_splitter::ChannelSplitterBlock, dc_blocker::DcBlockerBlock, gain::GainBlock,
            low_pass_filter::LowPassFilterBlock, matrix_mixer::MatrixMixerBlock,
        },
        io::{file_input::FileInputBlock, file_output::FileOutputBlock},
    },
    channel::ChannelConfig,
    context::DspContext,
    parameter::{ModulationOutput, Parameter},
    sample::Sample,
};

/// Default input count for `Effector`s.
pub(crate) const DEFAULT_EFFECTOR_INPUT_COUNT: usize = 1;
/// Default output count for `Effector`s.
pub(crate) const DEFAULT_EFFECTOR_OUTPUT_COUNT: usize = 1;

/// Largest number of input ports any single block may declare. Bounds the
/// fixed-size arrays used by blocks (like the matrix mixer) that need one
/// slot per port without allocating.
pub const MAX_BLOCK_INPUTS: usize = 16;
/// Largest number of output ports any single block may declare.
pub const MAX_BLOCK_OUTPUTS: usize = 16;

/// A unique identifier for a block within a DSP graph.
///
/// Used to reference blocks when creating connections or setting up modulation.
/// The inner `usize` is the block's index in the graph's block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub usize);

/// Category of a DSP block for visualization and organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCategory {
    /// Audio signal processors (filters, gain, channel routing, etc.).
    Effector,
    /// Input/output blocks (file input/output).
    IO,
}

/// The core trait for DSP processing units.
///
/// A block represents a single DSP operation (oscillator, filter, gain, etc.)
/// that processes audio buffers. Blocks are connected together in a [`Graph`](crate::graph::Graph)
/// to form a complete signal processing chain.
pub trait Block<S: Sample> {
    /// Process audio through this block.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Slice of input buffer references, one per input port
    /// * `outputs` - Slice of mutable output buffer references, one per output port
    /// * `modulation_values` - Values from connected modulator blocks, indexed by [`BlockId`]
    /// * `context` - The DSP context with sample rate and timing info
    fn process(&mut self, inputs: &[&[S]], outputs: &mut [&mut [S]], modulation_values: &[S], context: &DspContext);

    /// Returns the number of input ports this block accepts.
    fn input_count(&self) -> usize;

    /// Returns the number of output ports this block produces.
    fn output_count(&self) -> usize;

    /// Returns the modulation outputs this block provides.
    ///
    /// Only modulator blocks (LFOs, envelopes) return non-empty slices.
    /// Generator and effector blocks return an empty slice.
    fn modulation_outputs(&self) -> &[ModulationOutput];

    /// Returns how this block handles multi-channel audio.
    ///
    /// Default is [`ChannelConfig::Parallel`] (process each channel independently).
    /// Override to [`ChannelConfig::Explicit`] for blocks that handle channel
    /// routing internally (panners, mixers, splitters/mergers).
    fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::Parallel
    }

    /// Configure smoothing time for parameter changes.
    ///
    /// # Arguments
    /// * `sample_rate` - Audio sample rate in Hz
    /// * `ramp_time_ms` - Smoothing ramp time in milliseconds
    ///
    /// Default implementation is a no-op for blocks without smoothing.
    fn set_smoothing(&mut self, _sample_rate: f64, _ramp_time_ms: f64) {}

    /// Prepare this block for playback at the given context's sample rate and
    /// buffer size.
    ///
    /// Called once before a graph starts processing, and again whenever the
    /// context changes (sample rate change, device reconfiguration). Default
    /// implementation is a no-op; blocks with sample-rate-dependent state
    /// (filters, envelopes) override it to recompute coefficients.
    fn prepare(&mut self, _context: &DspContext) {}

    /// Reset this block's internal state (filter memory, envelope phase, DC
    /// blocker history) without reallocating anything.
    ///
    /// Default implementation is a no-op.
    fn reset(&mut self) {}
}

/// Type-erased container for all block implementations.
///
/// Wraps concrete block types so they can be stored uniformly in a graph.
/// Each variant corresponds to a specific DSP block type.
pub enum BlockType<S: Sample> {
    // I/O
    /// Reads audio from a file via a [`Reader`](crate::reader::Reader).
    FileInput(FileInputBlock<S>),
    /// Writes audio to a file via a [`Writer`](crate::writer::Writer).
    FileOutput(FileOutputBlock<S>),

    // EFFECTORS
    /// Merges individual mono inputs into multi-channel output.
    ChannelMerger(ChannelMergerBlock<S>),
    /// Routes channels (mono to stereo, stereo to mono, etc.).
    ChannelRouter(ChannelRouterBlock<S>),
    /// Splits multi-channel input into individual mono outputs.
    ChannelSplitter(ChannelSplitterBlock<S>),
    /// Removes DC offset from the signal.
    DcBlocker(DcBlockerBlock<S>),
    /// Adjusts signal level in decibels.
    Gain(GainBlock<S>),
    /// SVF-based low-pass filter.
    LowPassFilter(LowPassFilterBlock<S>),
    /// NxM mixing matrix for flexible channel routing.
    MatrixMixer(MatrixMixerBlock<S>),
}

impl<S: Sample> BlockType<S> {
    /// Perform the calculation of the underlying `Block`.
    #[inline]
    pub fn process(
        &mut self,
        inputs: &[&[S]],
        outputs: &mut [&mut [S]],
        modulation_values: &[S],
        context: &DspContext,
    ) {
        match self {
            // I/O
            BlockType::FileInput(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::FileOutput(block) => block.process(inputs, outputs, modulation_values, context),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::ChannelRouter(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::ChannelSplitter(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::DcBlocker(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::Gain(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::LowPassFilter(block) => block.process(inputs, outputs, modulation_values, context),
            BlockType::MatrixMixer(block) => block.process(inputs, outputs, modulation_values, context),
        }
    }

    /// Get the input count of the underlying `Block`.
    #[inline]
    pub fn input_count(&self) -> usize {
        match self {
            // I/O
            BlockType::FileInput(block) => block.input_count(),
            BlockType::FileOutput(block) => block.input_count(),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.input_count(),
            BlockType::ChannelRouter(block) => block.input_count(),
            BlockType::ChannelSplitter(block) => block.input_count(),
            BlockType::DcBlocker(block) => block.input_count(),
            BlockType::Gain(block) => block.input_count(),
            BlockType::LowPassFilter(block) => block.input_count(),
            BlockType::MatrixMixer(block) => block.input_count(),
        }
    }

    /// Get the output count of the underlying `Block`.
    #[inline]
    pub fn output_count(&self) -> usize {
        match self {
            // I/O
            BlockType::FileInput(block) => block.output_count(),
            BlockType::FileOutput(block) => block.output_count(),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.output_count(),
            BlockType::ChannelRouter(block) => block.output_count(),
            BlockType::ChannelSplitter(block) => block.output_count(),
            BlockType::DcBlocker(block) => block.output_count(),
            BlockType::Gain(block) => block.output_count(),
            BlockType::LowPassFilter(block) => block.output_count(),
            BlockType::MatrixMixer(block) => block.output_count(),
        }
    }

    /// Get the modulation outputs (if any) of the underlying `Block`.
    #[inline]
    pub fn modulation_outputs(&self) -> &[ModulationOutput] {
        match self {
            // I/O
            BlockType::FileInput(block) => block.modulation_outputs(),
            BlockType::FileOutput(block) => block.modulation_outputs(),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.modulation_outputs(),
            BlockType::ChannelRouter(block) => block.modulation_outputs(),
            BlockType::ChannelSplitter(block) => block.modulation_outputs(),
            BlockType::DcBlocker(block) => block.modulation_outputs(),
            BlockType::Gain(block) => block.modulation_outputs(),
            BlockType::LowPassFilter(block) => block.modulation_outputs(),
            BlockType::MatrixMixer(block) => block.modulation_outputs(),
        }
    }

    /// Get the channel config of the underlying `Block`.
    #[inline]
    pub fn channel_config(&self) -> ChannelConfig {
        match self {
            // I/O
            BlockType::FileInput(block) => block.channel_config(),
            BlockType::FileOutput(block) => block.channel_config(),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.channel_config(),
            BlockType::ChannelRouter(block) => block.channel_config(),
            BlockType::ChannelSplitter(block) => block.channel_config(),
            BlockType::DcBlocker(block) => block.channel_config(),
            BlockType::Gain(block) => block.channel_config(),
            BlockType::LowPassFilter(block) => block.channel_config(),
            BlockType::MatrixMixer(block) => block.channel_config(),
        }
    }

    /// Prepare the underlying `Block` for playback at the given context.
    #[inline]
    pub fn prepare(&mut self, context: &DspContext) {
        match self {
            // I/O
            BlockType::FileInput(block) => block.prepare(context),
            BlockType::FileOutput(block) => block.prepare(context),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.prepare(context),
            BlockType::ChannelRouter(block) => block.prepare(context),
            BlockType::ChannelSplitter(block) => block.prepare(context),
            BlockType::DcBlocker(block) => block.prepare(context),
            BlockType::Gain(block) => block.prepare(context),
            BlockType::LowPassFilter(block) => block.prepare(context),
            BlockType::MatrixMixer(block) => block.prepare(context),
        }
    }

    /// Reset the underlying `Block`'s internal state.
    #[inline]
    pub fn reset(&mut self) {
        match self {
            // I/O
            BlockType::FileInput(block) => block.reset(),
            BlockType::FileOutput(block) => block.reset(),

            // EFFECTORS
            BlockType::ChannelMerger(block) => block.reset(),
            BlockType::ChannelRouter(block) => block.reset(),
            BlockType::ChannelSplitter(block) => block.reset(),
            BlockType::DcBlocker(block) => block.reset(),
            BlockType::Gain(block) => block.reset(),
            BlockType::LowPassFilter(block) => block.reset(),
            BlockType::MatrixMixer(block) => block.reset(),
        }
    }

    /// Configure smoothing time for parameter changes.
    ///
    /// Only affects blocks that have internal parameter smoothing.
    /// Blocks without smoothing will ignore this call.
    pub fn set_smoothing(&mut self, sample_rate: f64, ramp_time_ms: f64) {
        match self {
            BlockType::Gain(block) => block.set_smoothing(sample_rate, ramp_time_ms),
            _ => {} // Blocks without smoothing use default no-op
        }
    }

    /// Set a given `Parameter` of the underlying `Block`.
    pub fn set_parameter(&mut self, parameter_name: &str, parameter: Parameter<S>) -> Result<(), String> {
        match self {
            // I/O
            BlockType::FileInput(_) => Err("File input blocks have no modulated parameters".to_string()),
            BlockType::FileOutput(_) => Err("File output blocks have no modulated parameters".to_string()),

            // EFFECTORS
            BlockType::ChannelMerger(_) => Err("Channel merger has no modulated parameters".to_string()),
            BlockType::ChannelRouter(_) => Err("Channel router uses direct field access, not Parameter<S>".to_string()),
            BlockType::ChannelSplitter(_) => Err("Channel splitter has no modulated parameters".to_string()),
            BlockType::DcBlocker(_) => Err("DC blocker uses direct field access, not Parameter<S>".to_string()),
            BlockType::Gain(block) => match parameter_name.to_lowercase().as_str() {
                "level" | "level_db" => {
                    block.level_db = parameter;
                    Ok(())
                }
                _ => Err(format!("Unknown gain parameter: {parameter_name}")),
            },
            BlockType::LowPassFilter(block) => match parameter_name.to_lowercase().as_str() {
                "cutoff" | "frequency" => {
                    block.cutoff = parameter;
                    Ok(())
                }
                "resonance" | "q" => {
                    block.resonance = parameter;
                    Ok(())
                }
                _ => Err(format!("Unknown low-pass filter parameter: {parameter_name}")),
            },
            BlockType::MatrixMixer(_) => Err("Matrix mixer uses set_gain method, not Parameter<S>".to_string()),
        }
    }

    /// Returns `true` if this block is an output-type block (writes outside the graph).
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self, BlockType::FileOutput(_))
    }

    /// Returns the category of this block.
    #[inline]
    pub fn category(&self) -> BlockCategory {
        match self {
            BlockType::FileInput(_) | BlockType::FileOutput(_) => BlockCategory::IO,
            BlockType::ChannelMerger(_)
            | BlockType::ChannelRouter(_)
            | BlockType::ChannelSplitter(_)
            | BlockType::DcBlocker(_)
            | BlockType::Gain(_)
            | BlockType::LowPassFilter(_)
            | BlockType::MatrixMixer(_) => BlockCategory::Effector,
        }
    }

    /// Returns the display name of this block type.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            BlockType::FileInput(_) => "File Input",
            BlockType::FileOutput(_) => "File Output",
            BlockType::ChannelMerger(_) => "Channel Merger",
            BlockType::ChannelRouter(_) => "Channel Router",
            BlockType::ChannelSplitter(_) => "Channel Splitter",
            BlockType::DcBlocker(_) => "DC Blocker",
            BlockType::Gain(_) => "Gain",
            BlockType::LowPassFilter(_) => "Low Pass Filter",
            BlockType::MatrixMixer(_) => "Matrix Mixer",
        }
    }

    /// Returns all modulated parameters and their source block IDs.
    ///
    /// Returns a list of (parameter_name, source_block_id) for each parameter
    /// that is modulated by another block.
    ///
    /// # Note
    ///
    /// This method allocates and is NOT realtime-safe. Only call during
    /// graph setup or from non-audio threads.
    pub fn get_modulated_parameters(&self) -> Vec<(&'static str, BlockId)> {
        let mut result = Vec::new();

        match self {
            BlockType::FileInput(_) | BlockType::FileOutput(_) => {}

            BlockType::ChannelMerger(_)
            | BlockType::ChannelRouter(_)
            | BlockType::ChannelSplitter(_)
            | BlockType::DcBlocker(_)
            | BlockType::MatrixMixer(_) => {}

            BlockType::Gain(block) => {
                if let Parameter::Modulated(id) = &block.level_db {
                    result.push(("level", *id));
                }
            }

            BlockType::LowPassFilter(block) => {
                if let Parameter::Modulated(id) = &block.cutoff {
                    result.push(("cutoff", *id));
                }
                if let Parameter::Modulated(id) = &block.resonance {
                    result.push(("resonance", *id));
                }
            }
        }

        result
    }
}

// From implementations for ergonomic block addition.

// I/O
impl<S: Sample> From<FileInputBlock<S>> for BlockType<S> {
    fn from(block: FileInputBlock<S>) -> Self {
        BlockType::FileInput(block)
    }
}

impl<S: Sample> From<FileOutputBlock<S>> for BlockType<S> {
    fn from(block: FileOutputBlock<S>) -> Self {
        BlockType::FileOutput(block)
    }
}

// Effectors
impl<S: Sample> From<ChannelMergerBlock<S>> for BlockType<S> {
    fn from(block: ChannelMergerBlock<S>) -> Self {
        BlockType::ChannelMerger(block)
    }
}

impl<S: Sample> From<ChannelRouterBlock<S>> for BlockType<S> {
    fn from(block: ChannelRouterBlock<S>) -> Self {
        BlockType::ChannelRouter(block)
    }
}

impl<S: Sample> From<ChannelSplitterBlock<S>> for BlockType<S> {
    fn from(block: ChannelSplitterBlock<S>) -> Self {
        BlockType::ChannelSplitter(block)
    }
}

impl<S: Sample> From<DcBlockerBlock<S>> for BlockType<S> {
    fn from(block: DcBlockerBlock<S>) -> Self {
        BlockType::DcBlocker(block)
    }
}

impl<S: Sample> From<GainBlock<S>> for BlockType<S> {
    fn from(block: GainBlock<S>) -> Self {
        BlockType::Gain(block)
    }
}

impl<S: Sample> From<LowPassFilterBlock<S>> for BlockType<S> {
    fn from(block: LowPassFilterBlock<S>) -> Self {
        BlockType::LowPassFilter(block)
    }
}

impl<S: Sample> From<MatrixMixerBlock<S>> for BlockType<S> {
    fn from(block: MatrixMixerBlock<S>) -> Self {
        BlockType::MatrixMixer(block)
    }
}
