//! Control Server (C10): a UDP OSC server bound to a configurable port, a
//! SysEx transport to the device, and the glue between them — the address
//! tree resolves inbound OSC to register writes, decoded SysEx echoes update
//! the device shadow and flow back out as OSC notifications, and a
//! wall-clock timer drives periodic meter polling and the liveness
//! heartbeat.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bbx_midi::sysex::encode_levels_request;
use bbx_midi::{DecodedSysEx, LevelReading, SubCommand, SysExTransport};
use log::{debug, info, warn};
use rosc::{OscBundle, OscMessage, OscPacket, OscType};

use crate::address::{known_addresses, stereo_partner_channel, Param};
use crate::error::{NetError, Result};
use crate::register::{self, HEARTBEAT_REGISTER};
use crate::shadow::{DeviceShadow, LevelFrame, LevelTarget};

pub struct ControlServerConfig {
    pub bind_addr: SocketAddr,
    pub midi_port_name: String,
    pub poll_hz: u32,
    pub heartbeat_every_n_ticks: u32,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:9000".parse().expect("valid default bind address"),
            midi_port_name: "RME".to_string(),
            poll_hz: 30,
            heartbeat_every_n_ticks: 30,
        }
    }
}

/// Owns the UDP socket, the SysEx transport, and the device shadow. `run`
/// spawns the OSC reader, SysEx echo processor, and periodic timer threads
/// and blocks until one of them exits (normally only on I/O error).
pub struct ControlServer {
    config: ControlServerConfig,
    socket: Arc<UdpSocket>,
    shadow: Arc<DeviceShadow>,
    transport: Arc<SysExTransport>,
    reverse_index: Arc<Vec<(u16, String, Param)>>,
    peer: Arc<Mutex<Option<SocketAddr>>>,
}

impl ControlServer {
    pub fn new(config: ControlServerConfig) -> Result<(Self, mpsc::Receiver<DecodedSysEx>)> {
        let socket = UdpSocket::bind(config.bind_addr).map_err(|e| NetError::BindFailed(e.to_string()))?;
        let (event_tx, event_rx) = mpsc::channel();
        let transport = SysExTransport::open(&config.midi_port_name, event_tx)?;

        let reverse_index = known_addresses().into_iter().map(|(addr, param)| (param.register(), addr, param)).collect();

        Ok((
            Self {
                config,
                socket: Arc::new(socket),
                shadow: Arc::new(DeviceShadow::new()),
                transport: Arc::new(transport),
                reverse_index: Arc::new(reverse_index),
                peer: Arc::new(Mutex::new(None)),
            },
            event_rx,
        ))
    }

    pub fn shadow(&self) -> Arc<DeviceShadow> {
        Arc::clone(&self.shadow)
    }

    /// Runs forever: spawns the OSC reader and heartbeat/meter-poll timer on
    /// background threads, then drains decoded SysEx events on the calling
    /// thread, turning each inbound packet into at most one outbound OSC
    /// bundle.
    pub fn run(self, event_rx: mpsc::Receiver<DecodedSysEx>) -> Result<()> {
        self.spawn_osc_reader();
        self.spawn_timer();
        self.process_sysex_events(event_rx)
    }

    fn spawn_osc_reader(&self) {
        let socket = Arc::clone(&self.socket);
        let transport = Arc::clone(&self.transport);
        let shadow = Arc::clone(&self.shadow);
        let peer = Arc::clone(&self.peer);

        thread::Builder::new()
            .name("bbx-osc-reader".into())
            .spawn(move || {
                let mut buf = vec![0u8; 4096];
                loop {
                    let (len, src) = match socket.recv_from(&mut buf) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!("OSC socket recv failed: {e}");
                            continue;
                        }
                    };
                    *peer.lock().expect("peer lock poisoned") = Some(src);

                    let packet = match rosc::decoder::decode_udp(&buf[..len]) {
                        Ok((_, packet)) => packet,
                        Err(e) => {
                            debug!("dropping malformed OSC packet from {src}: {e:?}");
                            continue;
                        }
                    };

                    for message in flatten_packet(packet) {
                        if let Err(e) = handle_inbound(&message, &transport, &shadow) {
                            warn!("failed to apply OSC message `{}`: {e}", message.addr);
                        }
                    }
                }
            })
            .expect("failed to spawn OSC reader thread");
    }

    fn spawn_timer(&self) {
        let transport = Arc::clone(&self.transport);
        let shadow = Arc::clone(&self.shadow);
        let period = Duration::from_secs_f64(1.0 / self.config.poll_hz.max(1) as f64);
        let heartbeat_every = self.config.heartbeat_every_n_ticks.max(1);
        let counter = AtomicU8::new(0);

        thread::Builder::new()
            .name("bbx-control-timer".into())
            .spawn(move || {
                let mut tick: u32 = 0;
                loop {
                    thread::sleep(period);
                    tick = tick.wrapping_add(1);

                    if !shadow.refresh_in_progress() {
                        if let Err(e) = transport.write_raw(encode_levels_request()) {
                            warn!("failed to request meter levels: {e}");
                        }
                    }

                    if tick % heartbeat_every == 0 {
                        let value = counter.fetch_add(1, Ordering::Relaxed) & 0x0F;
                        if let Err(e) = transport.write_register(HEARTBEAT_REGISTER, value as i16) {
                            warn!("failed to write heartbeat register: {e}");
                        }
                    }
                }
            })
            .expect("failed to spawn control-server timer thread");
    }

    fn process_sysex_events(&self, event_rx: mpsc::Receiver<DecodedSysEx>) -> Result<()> {
        loop {
            match event_rx.recv_timeout(Duration::from_secs(5)) {
                Ok(decoded) => self.handle_decoded(decoded),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(NetError::Transport(bbx_midi::MidiError::Port("SysEx reader thread exited".into())));
                }
            }
        }
    }

    fn handle_decoded(&self, decoded: DecodedSysEx) {
        let mut bundle_messages = Vec::new();
        // A stereo pair's two registers both echo back and both changed, so
        // each register's notify pass would independently derive the other's
        // broadcast too. Dedup by address within this one packet's bundle so
        // the pair still resolves to exactly one message per address (§8).
        let mut seen_addresses = std::collections::HashSet::new();

        match decoded {
            DecodedSysEx::Registers(pairs) => {
                for (register, value) in pairs {
                    if register == register::REFRESH_ECHO_REGISTER {
                        self.shadow.set_refresh_in_progress(false);
                        continue;
                    }
                    if self.shadow.apply_register(register, value) {
                        self.notify_register(register, value, &mut bundle_messages, &mut seen_addresses);
                    }
                }
            }
            DecodedSysEx::Levels { subcommand, channels } => {
                self.handle_levels(subcommand, channels);
            }
        }

        if !bundle_messages.is_empty() {
            self.flush_bundle(bundle_messages);
        }
    }

    /// Builds the outbound notification(s) for one changed register. A plain
    /// parameter yields exactly one message; a stereo-pair register (§4.7's
    /// "derived broadcasts") additionally composes the paired channel's
    /// notification itself, rather than waiting for the device to separately
    /// echo the partner register — the two sides of a stereo link share one
    /// value by construction, so there is nothing to look up.
    fn notify_register(
        &self,
        register: u16,
        value: i16,
        out: &mut Vec<OscMessage>,
        seen_addresses: &mut std::collections::HashSet<String>,
    ) {
        resolve_notifications(&self.reverse_index, register, value, out, seen_addresses);
    }

    fn handle_levels(&self, subcommand: SubCommand, channels: Vec<LevelReading>) {
        let target = match subcommand {
            SubCommand::InputLevels | SubCommand::InputLevelsFx => LevelTarget::Input,
            SubCommand::PlaybackLevels => LevelTarget::Playback,
            SubCommand::OutputLevels | SubCommand::OutputLevelsFx => LevelTarget::Output,
            SubCommand::RegisterStream => return,
        };
        let frames: Vec<LevelFrame> =
            channels.into_iter().map(|l| LevelFrame { peak_db: l.peak_db, rms_db: l.rms_db, overload: l.overload }).collect();
        self.shadow.apply_levels(target, frames, subcommand.is_fx_mirrored());
    }

    fn flush_bundle(&self, messages: Vec<OscMessage>) {
        let Some(peer) = *self.peer.lock().expect("peer lock poisoned") else {
            return;
        };

        let packet = if messages.len() == 1 {
            OscPacket::Message(messages.into_iter().next().expect("checked len == 1"))
        } else {
            OscPacket::Bundle(OscBundle {
                timetag: rosc::OscTime { seconds: 0, fractional: 0 },
                content: messages.into_iter().map(OscPacket::Message).collect(),
            })
        };

        match rosc::encoder::encode(&packet) {
            Ok(bytes) => {
                if let Err(e) = self.socket.send_to(&bytes, peer) {
                    warn!("failed to send OSC notification to {peer}: {e}");
                }
            }
            Err(e) => warn!("failed to encode outbound OSC bundle: {e}"),
        }
    }
}

fn flatten_packet(packet: OscPacket) -> Vec<OscMessage> {
    match packet {
        OscPacket::Message(m) => vec![m],
        OscPacket::Bundle(b) => b.content.into_iter().flat_map(flatten_packet).collect(),
    }
}

fn handle_inbound(message: &OscMessage, transport: &SysExTransport, shadow: &DeviceShadow) -> Result<()> {
    let param = Param::parse(&message.addr)?;

    if matches!(param, Param::Refresh) {
        shadow.set_refresh_in_progress(true);
        transport.write_register(register::REFRESH_REGISTER, register::REFRESH_MAGIC)?;
        return Ok(());
    }

    match param {
        Param::MixVolume { output, input } => {
            let db = first_float(message).ok_or_else(|| NetError::MissingArgument(message.addr.clone()))?;
            let pan = second_float(message).unwrap_or(0.0) as i32;
            write_mix_cell(transport, output, input, db, pan)
        }
        Param::InputGain(_) | Param::OutputGain(_) => {
            let db = first_float(message).ok_or_else(|| NetError::MissingArgument(message.addr.clone()))?;
            validate_range(&message.addr, db, -65.0, 6.0)?;
            transport.write_register(param.register(), register::db_to_register(db))?;
            Ok(())
        }
        Param::InputPan(_) | Param::OutputPan(_) | Param::MixPan { .. } => {
            let pan = first_float(message).ok_or_else(|| NetError::MissingArgument(message.addr.clone()))? as i32;
            transport.write_register(param.register(), register::pan_to_register(pan))?;
            Ok(())
        }
        Param::InputMute(_) | Param::OutputMute(_) | Param::InputStereo(_) | Param::PlaybackStereo(_) => {
            let on = first_float(message).ok_or_else(|| NetError::MissingArgument(message.addr.clone()))? != 0.0;
            transport.write_register(param.register(), register::bool_to_register(on))?;
            // Stereo-link toggles also write the paired channel's register so the
            // flag stays symmetric on the wire even before any echo comes back.
            match param {
                Param::InputStereo(ch) => {
                    let partner = Param::InputStereo(stereo_partner_channel(ch));
                    transport.write_register(partner.register(), register::bool_to_register(on))?;
                }
                Param::PlaybackStereo(ch) => {
                    let partner = Param::PlaybackStereo(stereo_partner_channel(ch));
                    transport.write_register(partner.register(), register::bool_to_register(on))?;
                }
                _ => {}
            }
            Ok(())
        }
        Param::DurecPlay | Param::DurecStop | Param::DurecRecord | Param::DurecDelete => {
            transport.write_register(param.register(), 1)?;
            Ok(())
        }
        _ => Err(NetError::UnknownAddress(message.addr.clone())),
    }
}

fn write_mix_cell(transport: &SysExTransport, output: u32, input: u32, db: f64, pan: i32) -> Result<()> {
    validate_range(&format!("/mix/{output}/input/{input}"), db, -65.0, 6.0)?;
    let cell = register::matrix_register(output, input);
    let value = register::db_to_register(db);
    // MATRIX_STEREO_DELTAS are relative to this cell's own base register, so
    // for cell (1,1) these resolve to the literal 0x2000/0x2001/0x2040/0x2041
    // level registers the stereo x stereo case writes.
    for delta in register::MATRIX_STEREO_DELTAS {
        transport.write_register(cell.wrapping_add(delta), value)?;
    }
    transport.write_register(cell, value)?;
    transport.write_register(cell + 1, register::pan_to_register(pan))?;
    Ok(())
}

fn validate_range(address: &str, value: f64, min: f64, max: f64) -> Result<()> {
    if value < min || value > max {
        return Err(NetError::OutOfRange { address: address.to_string(), value, min, max });
    }
    Ok(())
}

fn first_float(message: &OscMessage) -> Option<f64> {
    message.args.first().and_then(osc_arg_to_f64)
}

fn second_float(message: &OscMessage) -> Option<f64> {
    message.args.get(1).and_then(osc_arg_to_f64)
}

fn osc_arg_to_f64(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Float(f) => Some(*f as f64),
        OscType::Double(d) => Some(*d),
        OscType::Int(i) => Some(*i as f64),
        OscType::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Builds the outbound notification(s) for one changed register against a
/// register -> address reverse index. A plain parameter yields exactly one
/// message; a stereo-pair register (§4.7's "derived broadcasts") additionally
/// composes the paired channel's notification itself, rather than waiting for
/// the device to separately echo the partner register — the two sides of a
/// stereo link share one value by construction, so there is nothing to look
/// up. `seen_addresses` is shared across every register in one decoded
/// packet so that the pair's *other* register (which also changed and also
/// derives this same broadcast) does not emit it a second time.
fn resolve_notifications(
    reverse_index: &[(u16, String, Param)],
    register: u16,
    value: i16,
    out: &mut Vec<OscMessage>,
    seen_addresses: &mut std::collections::HashSet<String>,
) {
    for (reg, addr, param) in reverse_index.iter() {
        if *reg != register {
            continue;
        }
        if seen_addresses.insert(addr.clone()) {
            out.push(build_notification(addr, *param, value));
        }

        if let Some((partner_addr, partner_param)) = stereo_partner(*param) {
            if seen_addresses.insert(partner_addr.clone()) {
                out.push(build_notification(&partner_addr, partner_param, value));
            }
        }
    }
}

/// The paired channel's own `(address, Param)`, for the stereo-link params
/// whose symmetric attribute means one register changing implies its
/// partner changed too (§8: "exactly one derived message per paired
/// channel").
fn stereo_partner(param: Param) -> Option<(String, Param)> {
    match param {
        Param::InputStereo(ch) => {
            let partner_ch = stereo_partner_channel(ch);
            Some((format!("/input/{partner_ch}/stereo"), Param::InputStereo(partner_ch)))
        }
        Param::PlaybackStereo(ch) => {
            let partner_ch = stereo_partner_channel(ch);
            Some((format!("/playback/{partner_ch}/stereo"), Param::PlaybackStereo(partner_ch)))
        }
        _ => None,
    }
}

fn build_notification(address: &str, param: Param, value: i16) -> OscMessage {
    use crate::address::ParamKind;

    let args = match param.kind() {
        ParamKind::Fixed { .. } => vec![OscType::Float(register::register_to_db(value) as f32)],
        ParamKind::Int { .. } => vec![OscType::Int(register::register_to_pan(value))],
        ParamKind::Bool => vec![OscType::Bool(register::register_to_bool(value))],
        ParamKind::Enum(names) => {
            let idx = value.max(0) as usize;
            let label = names.get(idx).copied().unwrap_or("unknown");
            vec![OscType::Int(value as i32), OscType::String(label.to_string())]
        }
        ParamKind::ReadOnly | ParamKind::Trigger => vec![OscType::Int(value as i32)],
    };

    OscMessage { addr: address.to_string(), args }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_notification_formats_fixed_as_float() {
        let msg = build_notification("/input/3/gain", Param::InputGain(3), 450);
        assert_eq!(msg.addr, "/input/3/gain");
        match msg.args[0] {
            OscType::Float(v) => assert!((v - 45.0).abs() < 0.001),
            _ => panic!("expected float arg"),
        }
    }

    #[test]
    fn build_notification_formats_bool() {
        let msg = build_notification("/input/5/stereo", Param::InputStereo(5), 1);
        assert_eq!(msg.args, vec![OscType::Bool(true)]);
    }

    fn stereo_reverse_index() -> Vec<(u16, String, Param)> {
        vec![
            (Param::InputStereo(5).register(), "/input/5/stereo".to_string(), Param::InputStereo(5)),
            (Param::InputStereo(6).register(), "/input/6/stereo".to_string(), Param::InputStereo(6)),
        ]
    }

    #[test]
    fn single_register_echo_derives_the_paired_broadcast() {
        let index = stereo_reverse_index();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        resolve_notifications(&index, Param::InputStereo(5).register(), 1, &mut out, &mut seen);

        let addrs: Vec<&str> = out.iter().map(|m| m.addr.as_str()).collect();
        assert_eq!(addrs, vec!["/input/5/stereo", "/input/6/stereo"]);
    }

    #[test]
    fn both_pair_registers_echoing_still_emits_each_address_once() {
        let index = stereo_reverse_index();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        resolve_notifications(&index, Param::InputStereo(5).register(), 1, &mut out, &mut seen);
        resolve_notifications(&index, Param::InputStereo(6).register(), 1, &mut out, &mut seen);

        assert_eq!(out.len(), 2);
        let addrs: Vec<&str> = out.iter().map(|m| m.addr.as_str()).collect();
        assert_eq!(addrs, vec!["/input/5/stereo", "/input/6/stereo"]);
    }
}
