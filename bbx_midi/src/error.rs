//! Error types for bbx_midi SysEx transport and MIDI I/O.

pub type Result<T> = std::result::Result<T, MidiError>;

#[derive(Debug, thiserror::Error)]
pub enum MidiError {
    #[error("missing MIDI input port")]
    MissingMidiInputPort,

    #[error("missing MIDI output port")]
    MissingMidiOutputPort,

    #[error("malformed SysEx frame")]
    MalformedSysEx,

    #[error("SysEx frame from unrecognized manufacturer")]
    UnknownManufacturer,

    #[error("SysEx frame for unrecognized device")]
    UnknownDevice,

    #[error("unrecognized SysEx subcommand `{0:#x}`")]
    UnknownSubcommand(u8),

    #[error("MIDI port error: {0}")]
    Port(String),

    #[error("MIDI output write failed: {0}")]
    WriteFailed(String),
}
