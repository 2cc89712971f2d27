//! Error types for the OSC control plane and device control bridge.

pub type Result<T> = std::result::Result<T, NetError>;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("no address tree node matches `{0}`")]
    UnknownAddress(String),

    #[error("value {value} out of range [{min}, {max}] for `{address}`")]
    OutOfRange { address: String, value: f64, min: f64, max: f64 },

    #[error("`{value}` is not a recognized value for enum `{address}`")]
    InvalidEnum { address: String, value: String },

    #[error("OSC message for `{0}` carried no usable argument")]
    MissingArgument(String),

    #[error("failed to decode inbound OSC packet: {0}")]
    DecodeFailed(String),

    #[error("failed to bind UDP socket: {0}")]
    BindFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SysEx transport error: {0}")]
    Transport(#[from] bbx_midi::MidiError),
}
