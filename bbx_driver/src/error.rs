//! Error types for the hardware driver adapter.

pub type Result<T> = std::result::Result<T, DriverError>;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("no audio device named `{0}`")]
    DeviceNotFound(String),

    #[error("failed to open device: {0}")]
    OpenFailed(String),

    #[error("failed to negotiate stream configuration: {0}")]
    ConfigNegotiationFailed(String),

    #[error("channel index {index} out of range (device exposes {available} channels)")]
    ChannelOutOfRange { index: usize, available: usize },

    #[error("driver buffers were not created before starting the stream")]
    BuffersNotCreated,

    #[error("failed to start stream: {0}")]
    StartFailed(String),

    #[error("failed to stop stream: {0}")]
    StopFailed(String),
}
