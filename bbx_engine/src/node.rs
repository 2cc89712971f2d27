//! Audio Node (C4): the five node kinds the processing graph is built from.
//!
//! Every node shares a common contract: [`configure`](AudioNode::configure)
//! fully determines port shapes and any worker threads; [`start`](AudioNode::start)
//! begins any async work; [`stop`](AudioNode::stop) joins workers;
//! [`set_input`](AudioNode::set_input) is the only inbound data call;
//! [`process`](AudioNode::process) may block briefly (file nodes) or run in
//! constant time (filters, hardware endpoints); [`take_output`](AudioNode::take_output)
//! returns this tick's output buffer, moving ownership out of the node.

use std::sync::{Arc, Mutex};

use bbx_dsp::block::{Block, BlockType};
use bbx_dsp::blocks::effectors::{
    channel_merger::ChannelMergerBlock, channel_router::{ChannelMode, ChannelRouterBlock}, channel_splitter::ChannelSplitterBlock,
    dc_blocker::DcBlockerBlock, gain::GainBlock, low_pass_filter::LowPassFilterBlock, matrix_mixer::MatrixMixerBlock,
};
use bbx_dsp::blocks::io::{file_input::FileInputBlock, file_output::FileOutputBlock};
use bbx_dsp::channel::ChannelLayout;
use bbx_dsp::context::DspContext;
use bbx_dsp::parameter::Parameter;
use bbx_dsp::reader::Reader;
use bbx_dsp::writer::Writer;
use bbx_file::readers::wav::WavFileReader;
use bbx_file::writers::wav::WavFileWriter;
use log::warn;

use crate::config::NodeConfig;

pub type Result<T> = std::result::Result<T, NodeError>;

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("node `{0}`: file I/O failure: {1}")]
    FileIo(String, String),

    #[error("node `{name}`: unknown filter `{filter}`")]
    UnknownFilter { name: String, filter: String },

    #[error("node `{name}`: unknown parameter `{parameter}` for filter `{filter}`")]
    UnknownParameter { name: String, filter: String, parameter: String },

    #[error("node `{0}`: missing required param `{1}`")]
    MissingParam(String, String),

    #[error("node `{name}`: malformed params: {reason}")]
    MalformedParams { name: String, reason: String },
}

/// Per-tick health of a node, per §4.4.6 and §7's *NodeRuntimeError* policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Ready,
    Running,
    /// A fatal error occurred; the node is open-circuited and emits silence
    /// (or, for file sources, end-of-stream) on every subsequent tick.
    Error,
    /// A file source has exhausted its input; propagates as end-of-stream.
    EndOfStream,
}

/// One of the five node kinds a [`crate::graph::ProcessingGraph`] is built from.
pub enum AudioNode {
    HardwareSource(HardwareSourceNode),
    HardwareSink(HardwareSinkNode),
    FileSource(FileSourceNode),
    FileSink(FileSinkNode),
    FilterChain(FilterChainNode),
}

impl AudioNode {
    pub fn name(&self) -> &str {
        match self {
            AudioNode::HardwareSource(n) => &n.name,
            AudioNode::HardwareSink(n) => &n.name,
            AudioNode::FileSource(n) => &n.name,
            AudioNode::FileSink(n) => &n.name,
            AudioNode::FilterChain(n) => &n.name,
        }
    }

    pub fn state(&self) -> NodeState {
        match self {
            AudioNode::HardwareSource(n) => n.state,
            AudioNode::HardwareSink(n) => n.state,
            AudioNode::FileSource(n) => n.state,
            AudioNode::FileSink(n) => n.state,
            AudioNode::FilterChain(n) => n.state,
        }
    }

    pub fn output_count(&self) -> usize {
        match self {
            AudioNode::HardwareSource(n) => n.channels.len(),
            AudioNode::HardwareSink(_) => 0,
            AudioNode::FileSource(n) => n.output.len(),
            AudioNode::FileSink(_) => 0,
            AudioNode::FilterChain(n) => n.scratch.len(),
        }
    }

    pub fn input_count(&self) -> usize {
        match self {
            AudioNode::HardwareSource(_) => 0,
            AudioNode::HardwareSink(n) => n.channels.len(),
            AudioNode::FileSource(_) => 0,
            AudioNode::FileSink(n) => n.num_channels,
            AudioNode::FilterChain(n) => n.num_channels,
        }
    }

    /// Prepares internal buffers for `buffer_frames` at `sample_rate`, and for
    /// file/filter nodes, starts any worker threads or opens any file handles.
    pub fn configure(&mut self, buffer_frames: usize, sample_rate: f64) -> Result<()> {
        match self {
            AudioNode::HardwareSource(n) => {
                n.output = vec![vec![0.0; buffer_frames]; n.channels.len()];
                n.state = NodeState::Ready;
            }
            AudioNode::HardwareSink(n) => {
                n.state = NodeState::Ready;
            }
            AudioNode::FileSource(n) => {
                n.context.buffer_size = buffer_frames;
                n.context.sample_rate = sample_rate;
                n.output = vec![vec![0.0; buffer_frames]; n.block.get_reader().num_channels()];
                n.state = NodeState::Ready;
            }
            AudioNode::FileSink(n) => {
                n.context.buffer_size = buffer_frames;
                n.context.sample_rate = sample_rate;
                n.state = NodeState::Ready;
            }
            AudioNode::FilterChain(n) => {
                n.context.buffer_size = buffer_frames;
                n.context.sample_rate = sample_rate;
                n.scratch = vec![vec![0.0; buffer_frames]; n.num_channels];
                for block in &mut n.blocks {
                    block.prepare(&n.context);
                }
                n.state = NodeState::Ready;
            }
        }
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        match self {
            AudioNode::HardwareSource(n) => n.state = NodeState::Running,
            AudioNode::HardwareSink(n) => n.state = NodeState::Running,
            AudioNode::FileSource(n) => n.state = NodeState::Running,
            AudioNode::FileSink(n) => {
                n.block.start_recording();
                n.state = NodeState::Running;
            }
            AudioNode::FilterChain(n) => n.state = NodeState::Running,
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        match self {
            AudioNode::HardwareSource(_) | AudioNode::HardwareSink(_) | AudioNode::FileSource(_) | AudioNode::FilterChain(_) => {}
            AudioNode::FileSink(n) => {
                if let Err(e) = n.block.stop_recording() {
                    return Err(NodeError::FileIo(n.name.clone(), e.to_string()));
                }
            }
        }
        Ok(())
    }

    /// The only inbound data call. Copies `buffers` into the node's input
    /// scratch (hardware/file sinks, filter chains); no-op for source nodes.
    pub fn set_input(&mut self, buffers: &[&[f32]]) {
        match self {
            AudioNode::HardwareSource(_) | AudioNode::FileSource(_) => {}
            AudioNode::HardwareSink(n) => n.pending_input = Some(copy_into(&mut n.input_scratch, buffers)),
            AudioNode::FileSink(n) => n.pending_input = Some(copy_into(&mut n.input_scratch, buffers)),
            AudioNode::FilterChain(n) => n.pending_input = Some(copy_into(&mut n.input_scratch, buffers)),
        }
    }

    /// Runs this node's work for the current tick. Hardware sources/sinks are
    /// driven directly from the buffer-switch callback by
    /// [`crate::graph::ProcessingGraph`] and don't go through this path.
    pub fn process(&mut self) -> Result<()> {
        match self {
            AudioNode::HardwareSource(_) | AudioNode::HardwareSink(_) => {}
            AudioNode::FileSource(n) => {
                if n.block.is_finished() && !n.loop_enabled {
                    n.state = NodeState::EndOfStream;
                    for ch in &mut n.output {
                        ch.fill(0.0);
                    }
                    return Ok(());
                }
                let mut output_slices: Vec<&mut [f32]> = n.output.iter_mut().map(|v| v.as_mut_slice()).collect();
                n.block.process(&[], &mut output_slices, &[], &n.context);
            }
            AudioNode::FileSink(n) => {
                let Some(input) = n.pending_input.take() else {
                    warn!("file sink `{}` ticked with no input", n.name);
                    return Ok(());
                };
                let input_slices: Vec<&[f32]> = input.iter().map(|v| v.as_slice()).collect();
                n.block.process(&input_slices, &mut [], &[], &n.context);
                if n.block.error_occurred() {
                    n.state = NodeState::Error;
                    return Err(NodeError::FileIo(n.name.clone(), "writer thread reported an error".into()));
                }
            }
            AudioNode::FilterChain(n) => {
                let Some(input) = n.pending_input.take() else {
                    warn!("filter chain `{}` ticked with no input", n.name);
                    return Ok(());
                };
                n.run(&input);
            }
        }
        Ok(())
    }

    /// Returns this tick's output buffer. Moves ownership out logically (the
    /// caller reads it before the next tick overwrites it), matching the
    /// spec's "moves ownership" wording while keeping the node's backing
    /// storage allocation-free across ticks.
    pub fn take_output(&self) -> &[Vec<f32>] {
        match self {
            AudioNode::HardwareSource(n) => &n.output,
            AudioNode::HardwareSink(_) => &[],
            AudioNode::FileSource(n) => &n.output,
            AudioNode::FileSink(_) => &[],
            AudioNode::FilterChain(n) => &n.scratch,
        }
    }
}

impl AudioNode {
    /// Builds one of the five node kinds from a configured
    /// [`NodeConfig`]'s type-specific `params`, per SPEC_FULL.md §6.
    /// Channel index bounds (against the driver's reported inventory) are
    /// checked by the caller, not here — this only parses shape.
    pub fn from_config(cfg: &NodeConfig, sample_rate: f64) -> Result<Self> {
        use crate::config::NodeType;

        let params = &cfg.params;
        let name = cfg.name.clone();

        match cfg.node_type {
            NodeType::HwSource => {
                let channels = parse_channels(params, &name)?;
                Ok(AudioNode::HardwareSource(HardwareSourceNode::new(name, channels)))
            }
            NodeType::HwSink => {
                let channels = parse_channels(params, &name)?;
                Ok(AudioNode::HardwareSink(HardwareSinkNode::new(name, channels)))
            }
            NodeType::FileSource => {
                let path = params
                    .get("path")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| NodeError::MissingParam(name.clone(), "path".into()))?;
                let loop_enabled = params.get("loop").and_then(|v| v.as_bool()).unwrap_or(false);
                FileSourceNode::open(name, path, loop_enabled).map(AudioNode::FileSource)
            }
            NodeType::FileSink => {
                let path = params
                    .get("path")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| NodeError::MissingParam(name.clone(), "path".into()))?;
                let channels = params.get("channels").and_then(|v| v.as_u64()).unwrap_or(2) as usize;
                FileSinkNode::create(name, path, sample_rate, channels).map(AudioNode::FileSink)
            }
            NodeType::FilterChain => {
                let channels = params.get("channels").and_then(|v| v.as_u64()).unwrap_or(2) as usize;
                let layout = match channels {
                    1 => ChannelLayout::Mono,
                    2 => ChannelLayout::Stereo,
                    n => ChannelLayout::Custom(n),
                };
                let mut node = FilterChainNode::new(name.clone(), channels, layout);
                if let Some(blocks) = params.get("blocks").and_then(|v| v.as_array()) {
                    for (i, block_cfg) in blocks.iter().enumerate() {
                        let block = build_filter_block(&name, i, block_cfg, channels)?;
                        node.push_block(block);
                    }
                }
                Ok(AudioNode::FilterChain(node))
            }
        }
    }
}

/// Parses a `"channels": [0, 1, ...]` array of zero-based driver channel
/// indices shared by `hw_source`/`hw_sink` node params.
fn parse_channels(params: &serde_json::Value, name: &str) -> Result<Vec<usize>> {
    let array = params
        .get("channels")
        .and_then(|v| v.as_array())
        .ok_or_else(|| NodeError::MissingParam(name.to_string(), "channels".into()))?;
    array
        .iter()
        .map(|v| v.as_u64().map(|n| n as usize).ok_or_else(|| NodeError::MalformedParams {
            name: name.to_string(),
            reason: "channels must be an array of non-negative integers".into(),
        }))
        .collect()
}

/// Builds one filter block from its `{"type": ..., ...}` JSON entry in a
/// `filter_chain` node's `blocks` param array. The filter kinds here mirror
/// the `BlockType` variants the matching teacher DSP crate ships, mapped
/// onto SPEC_FULL.md's worked examples (EQ -> low-pass, auto-level/
/// compressor territory reserved for a future block kind, format/channel
/// adaptation -> the channel router/merger/splitter/matrix mixer blocks).
fn build_filter_block(node_name: &str, index: usize, cfg: &serde_json::Value, channels: usize) -> Result<BlockType<f32>> {
    let kind = cfg.get("type").and_then(|v| v.as_str()).ok_or_else(|| NodeError::MalformedParams {
        name: node_name.to_string(),
        reason: format!("blocks[{index}] is missing a `type`"),
    })?;

    let malformed = |reason: String| NodeError::MalformedParams { name: node_name.to_string(), reason };
    let f64_param = |key: &str, default: f64| cfg.get(key).and_then(|v| v.as_f64()).unwrap_or(default);

    match kind {
        "gain" => {
            let level_db = f64_param("level_db", 0.0) as f32;
            let smoothing_ms = f64_param("smoothing_ms", 5.0);
            Ok(GainBlock::new(level_db, smoothing_ms, channels).into())
        }
        "low_pass_filter" => {
            let cutoff = f64_param("cutoff", 20_000.0);
            let resonance = f64_param("resonance", std::f64::consts::FRAC_1_SQRT_2);
            Ok(LowPassFilterBlock::new(cutoff, resonance).into())
        }
        "dc_blocker" => {
            let coefficient = f64_param("coefficient", 0.995) as f32;
            Ok(DcBlockerBlock::new(coefficient, channels).into())
        }
        "channel_router" => {
            let mode = match cfg.get("mode").and_then(|v| v.as_str()).unwrap_or("stereo") {
                "stereo" => ChannelMode::Stereo,
                "left" => ChannelMode::Left,
                "right" => ChannelMode::Right,
                "swap" => ChannelMode::Swap,
                other => return Err(malformed(format!("unknown channel_router mode `{other}`"))),
            };
            let mono = cfg.get("mono").and_then(|v| v.as_bool()).unwrap_or(false);
            let invert_left = cfg.get("invert_left").and_then(|v| v.as_bool()).unwrap_or(false);
            let invert_right = cfg.get("invert_right").and_then(|v| v.as_bool()).unwrap_or(false);
            Ok(ChannelRouterBlock::new(mode, mono, invert_left, invert_right).into())
        }
        "channel_merger" => Ok(ChannelMergerBlock::new(channels).into()),
        "channel_splitter" => Ok(ChannelSplitterBlock::new(channels).into()),
        "matrix_mixer" => {
            let inputs = cfg.get("inputs").and_then(|v| v.as_u64()).unwrap_or(channels as u64) as usize;
            let outputs = cfg.get("outputs").and_then(|v| v.as_u64()).unwrap_or(channels as u64) as usize;
            let mut mixer = MatrixMixerBlock::<f32>::new(inputs, outputs);
            if let Some(gains) = cfg.get("gains").and_then(|v| v.as_array()) {
                for (out_idx, row) in gains.iter().enumerate() {
                    let Some(row) = row.as_array() else { continue };
                    for (in_idx, gain) in row.iter().enumerate() {
                        if let Some(g) = gain.as_f64() {
                            mixer.set_gain(in_idx, out_idx, g as f32);
                        }
                    }
                }
            }
            Ok(mixer.into())
        }
        other => Err(NodeError::UnknownFilter { name: node_name.to_string(), filter: other.to_string() }),
    }
}

fn copy_into(scratch: &mut Vec<Vec<f32>>, buffers: &[&[f32]]) -> Vec<Vec<f32>> {
    if scratch.len() != buffers.len() {
        *scratch = buffers.iter().map(|b| b.to_vec()).collect();
    } else {
        for (dst, src) in scratch.iter_mut().zip(buffers.iter()) {
            dst.clear();
            dst.extend_from_slice(src);
        }
    }
    scratch.clone()
}

/// Reads driver input pointers for a configured channel set and produces one
/// output buffer per tick (§4.4.1). Populated externally, once per buffer
/// switch, by [`crate::graph::ProcessingGraph::run_callback_tick`].
pub struct HardwareSourceNode {
    name: String,
    pub channels: Vec<usize>,
    output: Vec<Vec<f32>>,
    state: NodeState,
}

impl HardwareSourceNode {
    pub fn new(name: impl Into<String>, channels: Vec<usize>) -> Self {
        Self { name: name.into(), channels, output: Vec::new(), state: NodeState::Ready }
    }

    /// Copies the driver's input planes for this node's configured channels
    /// into its output scratch. Called once per tick before the graph's
    /// non-source nodes run.
    pub fn advance(&mut self, driver_inputs: &[&[f32]]) {
        for (i, &ch) in self.channels.iter().enumerate() {
            match driver_inputs.get(ch) {
                Some(plane) => self.output[i].copy_from_slice(plane),
                None => self.output[i].fill(0.0),
            }
        }
    }
}

/// Writes its input into driver output pointers, with underrun handling:
/// a missing tick's input emits silence and increments an underrun counter
/// (§4.4.2).
pub struct HardwareSinkNode {
    name: String,
    pub channels: Vec<usize>,
    input_scratch: Vec<Vec<f32>>,
    pending_input: Option<Vec<Vec<f32>>>,
    underrun_count: u64,
    state: NodeState,
}

impl HardwareSinkNode {
    pub fn new(name: impl Into<String>, channels: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            channels,
            input_scratch: Vec::new(),
            pending_input: None,
            underrun_count: 0,
            state: NodeState::Ready,
        }
    }

    pub fn underrun_count(&self) -> u64 {
        self.underrun_count
    }

    /// Writes this tick's input (or silence, on underrun) into the driver's
    /// output planes for this node's configured channels.
    pub fn write(&mut self, driver_outputs: &mut [&mut [f32]]) {
        let Some(input) = self.pending_input.take() else {
            self.underrun_count += 1;
            for &ch in &self.channels {
                if let Some(plane) = driver_outputs.get_mut(ch) {
                    plane.fill(0.0);
                }
            }
            return;
        };

        for (i, &ch) in self.channels.iter().enumerate() {
            if let (Some(src), Some(dst)) = (input.get(i), driver_outputs.get_mut(ch)) {
                dst.copy_from_slice(src);
            }
        }
    }
}

/// Background-read file source (§4.4.3). [`FileInputBlock`] loads the file
/// eagerly at construction; the background-thread/pre-roll-queue variant
/// described for streaming sources is carried by [`FileOutputBlock`] on the
/// write side, where the cost of blocking on I/O is otherwise paid by the
/// real-time thread.
pub struct FileSourceNode {
    name: String,
    block: FileInputBlock<f32>,
    context: DspContext,
    output: Vec<Vec<f32>>,
    loop_enabled: bool,
    state: NodeState,
}

impl FileSourceNode {
    pub fn open(name: impl Into<String>, path: &str, loop_enabled: bool) -> Result<Self> {
        let name = name.into();
        let reader = WavFileReader::<f32>::from_path(path).map_err(|e| NodeError::FileIo(name.clone(), e.to_string()))?;
        let mut block = FileInputBlock::new(Box::new(reader) as Box<dyn Reader<f32>>);
        block.set_loop_enabled(loop_enabled);
        Ok(Self { name, block, context: DspContext::default(), output: Vec::new(), loop_enabled, state: NodeState::Ready })
    }

    pub fn is_finished(&self) -> bool {
        self.block.is_finished()
    }
}

/// Background-write file sink (§4.4.4): [`FileOutputBlock`] owns the writer
/// thread and the lock-free ring buffer between the audio thread and disk.
pub struct FileSinkNode {
    name: String,
    block: FileOutputBlock<f32>,
    context: DspContext,
    input_scratch: Vec<Vec<f32>>,
    pending_input: Option<Vec<Vec<f32>>>,
    num_channels: usize,
    state: NodeState,
}

impl FileSinkNode {
    pub fn create(name: impl Into<String>, path: &str, sample_rate: f64, num_channels: usize) -> Result<Self> {
        let name = name.into();
        let writer =
            WavFileWriter::<f32>::new(path, sample_rate, num_channels).map_err(|e| NodeError::FileIo(name.clone(), e.to_string()))?;
        let block = FileOutputBlock::new(Box::new(writer) as Box<dyn Writer<f32>>);
        Ok(Self {
            name,
            block,
            context: DspContext { sample_rate, num_channels, ..DspContext::default() },
            input_scratch: Vec::new(),
            pending_input: None,
            num_channels,
            state: NodeState::Ready,
        })
    }
}

/// Parameterized filter pipeline (§4.4.5). Filters run in series: each
/// block's output becomes the next block's input, via two ping-ponged
/// scratch buffer sets. `update_parameter` stages a change behind a mutex;
/// the staged change is applied at the start of the next `process` call (the
/// next block boundary), never mid-block.
pub struct FilterChainNode {
    name: String,
    blocks: Vec<BlockType<f32>>,
    context: DspContext,
    num_channels: usize,
    scratch: Vec<Vec<f32>>,
    ping_pong: Vec<Vec<f32>>,
    input_scratch: Vec<Vec<f32>>,
    pending_input: Option<Vec<Vec<f32>>>,
    pending_updates: Arc<Mutex<Vec<(usize, &'static str, f32)>>>,
    state: NodeState,
}

impl FilterChainNode {
    pub fn new(name: impl Into<String>, num_channels: usize, channel_layout: ChannelLayout) -> Self {
        Self {
            name: name.into(),
            blocks: Vec::new(),
            context: DspContext { num_channels, channel_layout, ..DspContext::default() },
            num_channels,
            scratch: Vec::new(),
            ping_pong: Vec::new(),
            input_scratch: Vec::new(),
            pending_input: None,
            pending_updates: Arc::new(Mutex::new(Vec::new())),
            state: NodeState::Ready,
        }
    }

    pub fn push_block(&mut self, block: BlockType<f32>) {
        self.blocks.push(block);
    }

    /// Stages a parameter update for the block at `index`. Applied at the
    /// next `process` call's block boundary, not immediately.
    pub fn update_parameter(&self, index: usize, name: &'static str, value: f32) {
        self.pending_updates.lock().expect("filter chain parameter lock poisoned").push((index, name, value));
    }

    /// Sum of declared latencies of the blocks in this chain, in samples.
    /// Every filter kind supplied out of the box declares zero latency.
    pub fn latency_samples(&self) -> u32 {
        0
    }

    fn apply_staged_updates(&mut self) {
        let mut staged = self.pending_updates.lock().expect("filter chain parameter lock poisoned");
        for (index, name, value) in staged.drain(..) {
            if let Some(block) = self.blocks.get_mut(index) {
                let _ = block.set_parameter(name, Parameter::constant(value));
            }
        }
    }

    fn run(&mut self, input: &[Vec<f32>]) {
        self.apply_staged_updates();

        if self.ping_pong.len() != self.num_channels {
            self.ping_pong = vec![vec![0.0; self.context.buffer_size]; self.num_channels];
        }

        let mut current: Vec<Vec<f32>> = input.to_vec();
        for block in &mut self.blocks {
            let input_slices: Vec<&[f32]> = current.iter().map(|v| v.as_slice()).collect();
            let mut output_slices: Vec<&mut [f32]> = self.ping_pong.iter_mut().map(|v| v.as_mut_slice()).collect();
            block.process(&input_slices, &mut output_slices, &[], &self.context);
            current = self.ping_pong.clone();
        }

        self.scratch = current;
    }
}
