//! Engine Facade (C6): boot sequence, lifecycle, status-callback
//! subscribers, and the bridge between the processing graph (C5) and the
//! device control bridge (C7-C10). Confines the one piece of genuinely
//! global mutable state — the shadow and the pool live here, not as
//! process-wide singletons — per §9's design note on global state.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bbx_driver::{BufferSwitch, CpalDriver, DeviceInfo, HardwareDriver};
use log::info;

use crate::config::{ConnectionConfig, DeviceKind, EngineConfig};
use crate::error::{EngineError, Result};
use crate::graph::{Edge, NodeIndex, PacedLoop, ProcessingGraph};
use crate::node::AudioNode;
use crate::status::{StatusCategory, StatusReporter, StatusSubscriber};

/// Which driver mode the engine is running under, decided once at
/// `initialize` from `config.device.kind` (§4.5's two tick drivers).
enum RunMode {
    /// Hardware callback mode: the driver owns the real-time thread and
    /// invokes `ProcessingGraph::run_callback_tick` once per buffer switch.
    Hardware { driver: Box<dyn HardwareDriver> },
    /// Paced (no-hardware) mode: a dedicated thread advances ticks at
    /// wall-clock intervals (§4.5).
    Paced,
}

/// Owns everything a running engine needs: the configured graph, the
/// driver or paced loop that drives it, the status-event pipeline (C12),
/// and — if configured — the control server (C7-C10) on its own thread.
pub struct Engine {
    config: EngineConfig,
    mode: RunMode,
    graph: Option<Arc<Mutex<ProcessingGraph>>>,
    status: StatusReporter,
    control_thread: Option<JoinHandle<()>>,
    paced_loop: Option<PacedLoop>,
    running: bool,
}

impl Engine {
    /// Loads and structurally validates the configuration, builds the
    /// node arena and connections, opens (and, for hardware mode,
    /// negotiates) the driver, and — if `config.control` is set —
    /// launches the device control bridge (C7-C10) on its own thread.
    /// Does not start ticking; call [`Engine::run`] for that.
    pub fn initialize(config: EngineConfig, subscribers: Vec<StatusSubscriber>) -> Result<Self> {
        let status = StatusReporter::start(256, subscribers);
        let status_handle = status.handle();

        let mode = match config.device.kind {
            DeviceKind::Hardware => {
                let mut driver = CpalDriver::new();
                driver.open(config.device.name.as_deref())?;
                let capabilities = driver.init()?;
                config
                    .validate_channels(capabilities.input_channel_names.len(), capabilities.output_channel_names.len())
                    .map_err(EngineError::Config)?;
                driver.create_buffers(&config.device.input_channels, &config.device.output_channels)?;
                RunMode::Hardware { driver: Box::new(driver) }
            }
            DeviceKind::None => RunMode::Paced,
        };

        let names: Vec<String> = config.nodes.iter().map(|n| n.name.clone()).collect();
        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node_cfg in &config.nodes {
            let mut node = AudioNode::from_config(node_cfg, config.sample_rate as f64)?;
            node.configure(config.buffer_frames as usize, config.sample_rate as f64)?;
            nodes.push(node);
        }

        let edges = resolve_edges(&names, &config.connections)?;
        let graph = ProcessingGraph::new(names, nodes, edges, config.buffer_frames as usize, Some(status_handle.clone()))
            .map_err(|e| EngineError::Graph(e.to_string()))?;
        let graph = Arc::new(Mutex::new(graph));

        let control_thread = match &config.control {
            Some(control) => Some(spawn_control_server(control.osc_listen_port, control.device_id.clone(), status_handle.clone())?),
            None => None,
        };

        status_handle.post(StatusCategory::Info, "engine initialized");

        Ok(Self { config, mode, graph: Some(graph), status, control_thread, paced_loop: None, running: false })
    }

    /// Enumerates hardware devices without opening one, for the CLI's
    /// `--list-devices` (C13).
    pub fn list_devices() -> Result<Vec<DeviceInfo>> {
        let driver = CpalDriver::new();
        Ok(driver.enumerate()?)
    }

    /// Starts the nodes' worker threads and, depending on run mode,
    /// either installs the driver's buffer-switch callback or spawns the
    /// paced-loop thread (§4.5).
    pub fn run(&mut self) -> Result<()> {
        let graph = self.graph.take().expect("Engine::run called twice");
        graph.lock().expect("graph lock poisoned").starts_running()?;

        match &mut self.mode {
            RunMode::Hardware { driver } => {
                let callback_graph = Arc::clone(&graph);
                self.graph = Some(graph);
                driver.start(Box::new(move |switch: BufferSwitch<'_>| {
                    // The RT thread briefly locks the graph mutex here;
                    // the only other lock holder is `stop()`'s final tick
                    // wait, which never blocks for more than one tick's
                    // worth of work, so contention is bounded rather than
                    // unbounded as a generic shared-state lock would be.
                    if let Ok(mut graph) = callback_graph.try_lock() {
                        graph.run_callback_tick(switch.inputs, switch.outputs);
                    }
                }))?;
            }
            RunMode::Paced => {
                // Nothing else holds a strong ref to `graph` yet in paced
                // mode (only the hardware-callback path above clones it),
                // so this always succeeds.
                let inner_mutex = Arc::try_unwrap(graph).unwrap_or_else(|_| panic!("graph Arc unexpectedly shared before run()"));
                let inner_graph = inner_mutex.into_inner().expect("graph lock poisoned");
                let (paced_loop, shared) = PacedLoop::spawn(inner_graph, self.config.buffer_frames, self.config.sample_rate);
                self.graph = Some(shared);
                self.paced_loop = Some(paced_loop);
            }
        }

        self.running = true;
        self.status.handle().post(StatusCategory::Info, "engine running");
        Ok(())
    }

    /// `stop()` per §4.5: sets the stop flag, waits out the current tick,
    /// then joins file worker threads and the driver/paced loop, within a
    /// bounded deadline (two block periods plus a fixed join timeout).
    pub fn stop(&mut self) -> Result<()> {
        if !self.running {
            return Ok(());
        }

        if let Some(graph) = &self.graph {
            graph.lock().expect("graph lock poisoned").request_stop();
        }

        let two_ticks = Duration::from_secs_f64(2.0 * self.config.buffer_frames as f64 / self.config.sample_rate.max(1) as f64);
        thread::sleep(two_ticks);

        match &mut self.mode {
            RunMode::Hardware { driver } => driver.stop()?,
            RunMode::Paced => {
                if let Some(mut paced) = self.paced_loop.take() {
                    paced.join();
                }
            }
        }

        if let Some(graph) = &self.graph {
            graph.lock().expect("graph lock poisoned").join_workers()?;
        }

        self.running = false;
        self.status.handle().post(StatusCategory::Info, "engine stopped");
        self.status.stop();
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.running {
            let _ = self.stop();
        }
    }
}

fn resolve_edges(names: &[String], connections: &[ConnectionConfig]) -> Result<Vec<Edge>> {
    let index_of = |name: &str| names.iter().position(|n| n == name);
    let mut edges = Vec::with_capacity(connections.len());
    for conn in connections {
        let src = index_of(&conn.src).ok_or_else(|| EngineError::Graph(format!("unknown source node `{}`", conn.src)))?;
        let dst = index_of(&conn.dst).ok_or_else(|| EngineError::Graph(format!("unknown destination node `{}`", conn.dst)))?;
        edges.push(Edge { src: NodeIndex(src), src_port: conn.src_port, dst: NodeIndex(dst), dst_port: conn.dst_port });
    }
    Ok(edges)
}

fn spawn_control_server(
    listen_port: u16,
    midi_port_name: String,
    status: crate::status::StatusHandle,
) -> Result<JoinHandle<()>> {
    let bind_addr: SocketAddr = ([0, 0, 0, 0], listen_port).into();
    let server_config = bbx_net::ControlServerConfig { bind_addr, midi_port_name, ..Default::default() };
    let (server, event_rx) = bbx_net::ControlServer::new(server_config).map_err(EngineError::Control)?;

    let handle = thread::Builder::new()
        .name("bbx-control-server".into())
        .spawn(move || {
            info!("control server listening on {bind_addr}");
            if let Err(e) = server.run(event_rx) {
                status.post(StatusCategory::Control, format!("control server exited: {e}"));
            }
        })
        .expect("failed to spawn control-server thread");

    Ok(handle)
}
