//! Real-time SysEx I/O over `midir`.
//!
//! One reader thread owns the `midir` input connection and decodes every
//! inbound SysEx frame, forwarding [`DecodedSysEx`] values to the caller's
//! channel. Outbound register writes are serialized through an `mpsc` queue
//! drained by a single writer thread, matching the "MIDI I/O threads" split
//! in the engine's concurrency model: a reader thread driving notifiers, and
//! a serialized queue for writes.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort};

use crate::error::{MidiError, Result};
use crate::sysex::{decode_sysex, encode_register_write, DecodedSysEx};

/// A bidirectional SysEx transport: owns a reader thread (device -> engine)
/// and a writer thread (engine -> device), each bound to one `midir` port.
///
/// `write_tx` is mutex-wrapped rather than bare so `SysExTransport` is `Sync`
/// and can be shared (e.g. behind an `Arc`) between the control server's OSC
/// reader, timer, and SysEx-event threads — `mpsc::Sender` alone is `Send`
/// but not `Sync`.
pub struct SysExTransport {
    write_tx: Mutex<Sender<Vec<u8>>>,
    _reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl SysExTransport {
    /// Open the transport, matching input/output port names by substring
    /// (case-insensitive). Decoded inbound packets are sent on `event_tx`.
    pub fn open(port_name_contains: &str, event_tx: Sender<DecodedSysEx>) -> Result<Self> {
        let midi_in = MidiInput::new("bbx_engine-sysex-in").map_err(|e| MidiError::Port(e.to_string()))?;
        let in_port = find_port(midi_in.ports().into_iter(), |p| midi_in.port_name(p).ok(), port_name_contains)
            .ok_or(MidiError::MissingMidiInputPort)?;

        let midi_out = MidiOutput::new("bbx_engine-sysex-out").map_err(|e| MidiError::Port(e.to_string()))?;
        let out_port = find_port(midi_out.ports().into_iter(), |p| midi_out.port_name(p).ok(), port_name_contains)
            .ok_or(MidiError::MissingMidiOutputPort)?;

        let connection = midi_out
            .connect(&out_port, "bbx_engine-sysex-write")
            .map_err(|e| MidiError::Port(e.to_string()))?;

        let (write_tx, write_rx) = mpsc::channel::<Vec<u8>>();
        let writer = spawn_writer(connection, write_rx);
        let reader = spawn_reader(midi_in, in_port, event_tx)?;

        Ok(Self {
            write_tx: Mutex::new(write_tx),
            _reader: reader,
            _writer: writer,
        })
    }

    /// Enqueue a register write; serialized onto the writer thread's queue.
    /// Fire-and-forget: the device's echo (decoded by the reader thread) is
    /// what actually converges the shadow state.
    pub fn write_register(&self, register: u16, value: i16) -> Result<()> {
        self.write_raw(encode_register_write(register, value))
    }

    /// Enqueue a raw, already-framed SysEx packet (used for the zero-length
    /// levels request and other sentinel writes).
    pub fn write_raw(&self, frame: Vec<u8>) -> Result<()> {
        let write_tx = self.write_tx.lock().expect("write queue lock poisoned");
        write_tx.send(frame).map_err(|_| MidiError::WriteFailed("writer thread gone".into()))
    }
}

fn find_port<T: Clone>(
    ports: impl Iterator<Item = T>,
    name_of: impl Fn(&T) -> Option<String>,
    contains: &str,
) -> Option<T> {
    let needle = contains.to_ascii_lowercase();
    ports.into_iter().find(|p| {
        name_of(p)
            .map(|n| n.to_ascii_lowercase().contains(&needle))
            .unwrap_or(false)
    })
}

fn spawn_writer(mut connection: MidiOutputConnection, rx: Receiver<Vec<u8>>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("bbx-sysex-writer".into())
        .spawn(move || {
            while let Ok(frame) = rx.recv() {
                if let Err(e) = connection.send(&frame) {
                    warn!("SysEx write failed, will retry on next heartbeat: {e}");
                }
            }
        })
        .expect("failed to spawn SysEx writer thread")
}

fn spawn_reader(midi_in: MidiInput, port: MidiInputPort, event_tx: Sender<DecodedSysEx>) -> Result<JoinHandle<()>> {
    // midir's `connect` keeps the callback alive via the returned connection,
    // which must outlive the reader thread; park it there for the transport's
    // lifetime rather than leaking it into the caller's scope.
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

    let handle = thread::Builder::new()
        .name("bbx-sysex-reader".into())
        .spawn(move || {
            let connection = midi_in.connect(
                &port,
                "bbx_engine-sysex-read",
                move |_stamp, bytes, _| match decode_sysex(bytes) {
                    Ok(decoded) => {
                        if event_tx.send(decoded).is_err() {
                            debug!("SysEx event receiver dropped, ignoring further packets");
                        }
                    }
                    Err(e) => debug!("ignoring malformed/unrecognized SysEx packet: {e}"),
                },
                (),
            );

            match connection {
                Ok(conn) => {
                    let _ = ready_tx.send(Ok(()));
                    // Parked for the lifetime of this thread; dropped (and the
                    // port closed) only when the process exits or the thread
                    // is torn down alongside the transport.
                    loop {
                        thread::park();
                    }
                    #[allow(unreachable_code)]
                    {
                        drop(conn);
                    }
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(MidiError::Port(e.to_string())));
                }
            }
        })
        .expect("failed to spawn SysEx reader thread");

    ready_rx
        .recv()
        .map_err(|_| MidiError::Port("reader thread exited before connecting".into()))??;

    Ok(handle)
}
