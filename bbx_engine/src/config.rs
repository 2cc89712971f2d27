//! Configuration Loader (C11): reads the engine's JSON configuration file,
//! parses it with `serde_json`, and runs the structural validation that
//! doesn't depend on hardware capability (that part happens during
//! [`crate::facade::Engine::initialize`], after the driver has been opened).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file `{path}`: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("failed to parse configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("connection `{src}` -> `{dst}` references unknown node `{node}`")]
    UnknownNode { src: String, dst: String, node: String },

    #[error("duplicate node name `{0}`")]
    DuplicateNodeName(String),

    #[error("channel index {index} for node `{node}` is out of range (device exposes {available} channels)")]
    ChannelOutOfRange { node: String, index: usize, available: usize },

    #[error("the processing graph contains a cycle involving node `{0}`")]
    GraphCycle(String),
}

/// Kind of a configured [`NodeConfig`], matching the five [`crate::node::AudioNode`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    HwSource,
    HwSink,
    FileSource,
    FileSink,
    FilterChain,
}

/// Device selection and channel routing for the hardware driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub kind: DeviceKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input_channels: Vec<usize>,
    #[serde(default)]
    pub output_channels: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Hardware,
    None,
}

/// One node in the configured graph: a name, a type, and type-specific parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A directed edge between two node ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub src: String,
    #[serde(default)]
    pub src_port: usize,
    pub dst: String,
    #[serde(default)]
    pub dst_port: usize,
}

/// Device control bridge (C7-C10) listen/target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    pub osc_listen_port: u16,
    pub osc_target_host: String,
    pub osc_target_port: u16,
    #[serde(default = "default_device_id")]
    pub device_id: String,
}

fn default_device_id() -> String {
    "RME".to_string()
}

/// The top-level engine configuration, as loaded from JSON (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub buffer_frames: u32,
    pub device: DeviceConfig,
    pub nodes: Vec<NodeConfig>,
    pub connections: Vec<ConnectionConfig>,
    #[serde(default)]
    pub control: Option<ControlConfig>,
}

impl EngineConfig {
    /// Load and structurally validate a configuration from a JSON file.
    ///
    /// Validates everything that doesn't require hardware capability: node
    /// name uniqueness, connection endpoints resolving to declared nodes,
    /// and graph acyclicity. Channel-index bounds checking happens later,
    /// in [`crate::facade::Engine::initialize`], once the driver reports
    /// its channel inventory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                return Err(ConfigError::DuplicateNodeName(node.name.clone()));
            }
        }

        for conn in &self.connections {
            if !names.contains(conn.src.as_str()) {
                return Err(ConfigError::UnknownNode { src: conn.src.clone(), dst: conn.dst.clone(), node: conn.src.clone() });
            }
            if !names.contains(conn.dst.as_str()) {
                return Err(ConfigError::UnknownNode { src: conn.src.clone(), dst: conn.dst.clone(), node: conn.dst.clone() });
            }
        }

        self.check_acyclic()
    }

    fn check_acyclic(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let mut marks: Vec<Mark> = self.nodes.iter().map(|_| Mark::Unvisited).collect();
        let index_of = |name: &str| self.nodes.iter().position(|n| n.name == name);

        fn visit(
            i: usize,
            nodes: &[NodeConfig],
            connections: &[ConnectionConfig],
            marks: &mut [Mark],
            index_of: &impl Fn(&str) -> Option<usize>,
        ) -> Result<()> {
            match marks[i] {
                Mark::Done => return Ok(()),
                Mark::Visiting => return Err(ConfigError::GraphCycle(nodes[i].name.clone())),
                Mark::Unvisited => {}
            }
            marks[i] = Mark::Visiting;
            for conn in connections.iter().filter(|c| c.src == nodes[i].name) {
                if let Some(j) = index_of(&conn.dst) {
                    visit(j, nodes, connections, marks, index_of)?;
                }
            }
            marks[i] = Mark::Done;
            Ok(())
        }

        for i in 0..self.nodes.len() {
            visit(i, &self.nodes, &self.connections, &mut marks, &index_of)?;
        }
        Ok(())
    }

    /// Checks that every channel index named in `device` falls within the
    /// driver-reported channel count. Called from `initialize`, after
    /// `HardwareDriver::enumerate`/`open`.
    pub fn validate_channels(&self, available_inputs: usize, available_outputs: usize) -> Result<()> {
        for &index in &self.device.input_channels {
            if index >= available_inputs {
                return Err(ConfigError::ChannelOutOfRange { node: "device.input_channels".into(), index, available: available_inputs });
            }
        }
        for &index in &self.device.output_channels {
            if index >= available_outputs {
                return Err(ConfigError::ChannelOutOfRange { node: "device.output_channels".into(), index, available: available_outputs });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_minimal_valid_config() {
        let file = write_config(
            r#"{
                "sample_rate": 44100,
                "buffer_frames": 512,
                "device": { "kind": "hardware", "input_channels": [0, 1], "output_channels": [0, 1] },
                "nodes": [
                    { "name": "in", "type": "hw_source", "params": {} },
                    { "name": "out", "type": "hw_sink", "params": {} }
                ],
                "connections": [
                    { "src": "in", "src_port": 0, "dst": "out", "dst_port": 0 }
                ]
            }"#,
        );
        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.nodes.len(), 2);
    }

    #[test]
    fn rejects_duplicate_node_names() {
        let file = write_config(
            r#"{
                "sample_rate": 44100,
                "buffer_frames": 512,
                "device": { "kind": "none" },
                "nodes": [
                    { "name": "a", "type": "hw_source", "params": {} },
                    { "name": "a", "type": "hw_sink", "params": {} }
                ],
                "connections": []
            }"#,
        );
        assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::DuplicateNodeName(_))));
    }

    #[test]
    fn rejects_unknown_connection_endpoint() {
        let file = write_config(
            r#"{
                "sample_rate": 44100,
                "buffer_frames": 512,
                "device": { "kind": "none" },
                "nodes": [{ "name": "a", "type": "hw_source", "params": {} }],
                "connections": [{ "src": "a", "src_port": 0, "dst": "missing", "dst_port": 0 }]
            }"#,
        );
        assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::UnknownNode { .. })));
    }

    #[test]
    fn rejects_cyclic_graph() {
        let file = write_config(
            r#"{
                "sample_rate": 44100,
                "buffer_frames": 512,
                "device": { "kind": "none" },
                "nodes": [
                    { "name": "a", "type": "filter_chain", "params": {} },
                    { "name": "b", "type": "filter_chain", "params": {} }
                ],
                "connections": [
                    { "src": "a", "src_port": 0, "dst": "b", "dst_port": 0 },
                    { "src": "b", "src_port": 0, "dst": "a", "dst_port": 0 }
                ]
            }"#,
        );
        assert!(matches!(EngineConfig::load(file.path()), Err(ConfigError::GraphCycle(_))));
    }

    #[test]
    fn rejects_unknown_fields() {
        let file = write_config(
            r#"{
                "sample_rate": 44100,
                "buffer_frames": 512,
                "device": { "kind": "none" },
                "nodes": [],
                "connections": [],
                "bogus_field": true
            }"#,
        );
        assert!(EngineConfig::load(file.path()).is_err());
    }

    #[test]
    fn validate_channels_catches_out_of_range() {
        let config = EngineConfig {
            sample_rate: 44100,
            buffer_frames: 512,
            device: DeviceConfig { kind: DeviceKind::Hardware, name: None, input_channels: vec![0, 5], output_channels: vec![0] },
            nodes: vec![],
            connections: vec![],
            control: None,
        };
        assert!(matches!(
            config.validate_channels(2, 2),
            Err(ConfigError::ChannelOutOfRange { index: 5, available: 2, .. })
        ));
    }
}
