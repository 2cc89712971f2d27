//! Top-level engine error, wrapping each crate's own error type so `main`
//! has one `Result` to match on for the process exit code.

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("device error: {0}")]
    Device(#[from] bbx_driver::DriverError),

    #[error("node runtime error: {0}")]
    Node(#[from] crate::node::NodeError),

    #[error("control plane error: {0}")]
    Control(#[from] bbx_net::NetError),

    #[error("file I/O error: {0}")]
    File(#[from] bbx_file::BbxAudioFileError),

    #[error("graph error: {0}")]
    Graph(String),
}
