//! SysEx framing and register wire protocol (C9 SysEx Transport).
//!
//! Register writes are assembled into a 32-bit word (`reg:15 | val:16 | parity:1`),
//! base-128 encoded into a 7-bit-clean SysEx data region, and wrapped with the
//! vendor manufacturer/device/subcommand bytes. Inbound SysEx is decoded the
//! same way, plus a levels payload used for peak/RMS meter reporting.

use crate::error::{MidiError, Result};

/// Three-byte MIDI manufacturer ID.
pub const MANUFACTURER_ID: [u8; 3] = [0x00, 0x20, 0x0D];

/// Device ID byte for the addressed unit.
pub const DEVICE_ID: u8 = 0x10;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// Floor reported for a peak/RMS level that decodes to zero (`-inf` dB).
pub const LEVEL_FLOOR_DB: f64 = -130.0;

/// Subcommand byte identifying the payload shape of a SysEx packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubCommand {
    /// Register read/write stream.
    RegisterStream,
    /// Input peak/RMS levels.
    InputLevels,
    /// Playback peak/RMS levels.
    PlaybackLevels,
    /// Output peak/RMS levels.
    OutputLevels,
    /// Input peak/RMS levels, also mirrored into the FX shadow.
    InputLevelsFx,
    /// Output peak/RMS levels, also mirrored into the FX shadow.
    OutputLevelsFx,
}

impl SubCommand {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(SubCommand::RegisterStream),
            1 => Some(SubCommand::InputLevels),
            2 => Some(SubCommand::PlaybackLevels),
            3 => Some(SubCommand::OutputLevels),
            4 => Some(SubCommand::InputLevelsFx),
            5 => Some(SubCommand::OutputLevelsFx),
            _ => None,
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            SubCommand::RegisterStream => 0,
            SubCommand::InputLevels => 1,
            SubCommand::PlaybackLevels => 2,
            SubCommand::OutputLevels => 3,
            SubCommand::InputLevelsFx => 4,
            SubCommand::OutputLevelsFx => 5,
        }
    }

    /// Whether this subcommand's levels should also be mirrored into the FX shadow.
    pub fn is_fx_mirrored(self) -> bool {
        matches!(self, SubCommand::InputLevelsFx | SubCommand::OutputLevelsFx)
    }
}

/// One decoded channel's peak/RMS level reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelReading {
    pub peak_db: f64,
    pub rms_db: f64,
    pub overload: bool,
}

/// Assemble the 32-bit register word: `(reg&0x7FFF)<<16 | (val&0xFFFF)`, with
/// bit 31 set so the total popcount across all 32 bits is odd.
pub fn assemble_register_word(register: u16, value: i16) -> u32 {
    let base = ((register & 0x7FFF) as u32) << 16 | (value as u16 as u32);
    let mut folded = base;
    folded ^= folded >> 16;
    folded ^= folded >> 8;
    folded ^= folded >> 4;
    folded ^= folded >> 2;
    folded ^= folded >> 1;
    if folded & 1 == 0 {
        base | 0x8000_0000
    } else {
        base
    }
}

/// Split a 32-bit word into 5 base-128 (7-bit-clean) bytes, LSB-first septets.
pub fn encode_base128(word: u32) -> [u8; 5] {
    let mut out = [0u8; 5];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = ((word >> (7 * i)) & 0x7F) as u8;
    }
    out
}

/// Reassemble a 32-bit word from 5 base-128 septets.
pub fn decode_base128(bytes: &[u8]) -> u32 {
    let mut word: u32 = 0;
    for (i, &b) in bytes.iter().enumerate().take(5) {
        word |= ((b & 0x7F) as u32) << (7 * i);
    }
    word
}

/// Encode one register write as a complete SysEx frame (`F0 .. F7` inclusive).
pub fn encode_register_write(register: u16, value: i16) -> Vec<u8> {
    let word = assemble_register_word(register, value);
    let payload = encode_base128(word);

    let mut frame = Vec::with_capacity(6 + payload.len() + 2);
    frame.push(SYSEX_START);
    frame.extend_from_slice(&MANUFACTURER_ID);
    frame.push(DEVICE_ID);
    frame.push(SubCommand::RegisterStream.to_byte());
    frame.extend_from_slice(&payload);
    frame.push(SYSEX_END);
    frame
}

/// Decode one base-128 register group into `(register, sign_extended_value)`.
pub fn decode_register_group(group: &[u8]) -> (u16, i16) {
    let word = decode_base128(group);
    let register = ((word >> 16) & 0x7FFF) as u16;
    let value = (word & 0xFFFF) as u16 as i16;
    (register, value)
}

fn peak_to_db(peak: u32) -> f64 {
    let mantissa = (peak >> 4) as f64;
    if mantissa <= 0.0 {
        LEVEL_FLOOR_DB
    } else {
        20.0 * (mantissa / (1u64 << 23) as f64).log10()
    }
}

fn rms_to_db(rms: u64) -> f64 {
    if rms == 0 {
        LEVEL_FLOOR_DB
    } else {
        10.0 * (rms as f64 / (1u64 << 54) as f64).log10()
    }
}

/// Decode one channel's level group: three base-128-encoded 32-bit words
/// (`rms_lo`, `rms_hi`, `peak`), i.e. 15 raw SysEx bytes.
pub fn decode_level_channel(bytes: &[u8]) -> Option<LevelReading> {
    if bytes.len() < 15 {
        return None;
    }
    let rms_lo = decode_base128(&bytes[0..5]) as u64;
    let rms_hi = decode_base128(&bytes[5..10]) as u64;
    let peak = decode_base128(&bytes[10..15]);
    let rms = (rms_hi << 32) | rms_lo;

    Some(LevelReading {
        peak_db: peak_to_db(peak),
        rms_db: rms_to_db(rms),
        overload: peak & 1 != 0,
    })
}

/// A fully parsed inbound SysEx packet.
#[derive(Debug, Clone)]
pub enum DecodedSysEx {
    /// One or more register updates from a register stream packet.
    Registers(Vec<(u16, i16)>),
    /// Per-channel level readings from a levels packet.
    Levels {
        subcommand: SubCommand,
        channels: Vec<LevelReading>,
    },
}

/// Parse a complete inbound SysEx frame, including the `F0`/`F7` bytes.
///
/// Validates the manufacturer and device IDs and the subcommand byte, then
/// dispatches to the register-stream or levels decoder.
pub fn decode_sysex(frame: &[u8]) -> Result<DecodedSysEx> {
    if frame.len() < 8 || frame[0] != SYSEX_START || *frame.last().unwrap() != SYSEX_END {
        return Err(MidiError::MalformedSysEx);
    }
    if frame[1..4] != MANUFACTURER_ID {
        return Err(MidiError::UnknownManufacturer);
    }
    if frame[4] != DEVICE_ID {
        return Err(MidiError::UnknownDevice);
    }
    let Some(sub) = SubCommand::from_byte(frame[5]) else {
        return Err(MidiError::UnknownSubcommand(frame[5]));
    };

    let payload = &frame[6..frame.len() - 1];

    match sub {
        SubCommand::RegisterStream => {
            if payload.len() % 5 != 0 {
                return Err(MidiError::MalformedSysEx);
            }
            let registers = payload.chunks_exact(5).map(decode_register_group).collect();
            Ok(DecodedSysEx::Registers(registers))
        }
        _ => {
            if payload.len() % 15 != 0 {
                return Err(MidiError::MalformedSysEx);
            }
            let channels = payload.chunks_exact(15).filter_map(decode_level_channel).collect();
            Ok(DecodedSysEx::Levels {
                subcommand: sub,
                channels,
            })
        }
    }
}

/// Build a zero-length levels request packet (sub-ID 2, empty payload), used
/// by the periodic control-server tick to ask the device for fresh meters.
pub fn encode_levels_request() -> Vec<u8> {
    vec![SYSEX_START, MANUFACTURER_ID[0], MANUFACTURER_ID[1], MANUFACTURER_ID[2], DEVICE_ID, SubCommand::PlaybackLevels.to_byte(), SYSEX_END]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_has_odd_parity() {
        for (reg, val) in [(0x0208u16, 450i16), (0x3E04, -1), (0, 0), (0x7FFF, -32768)] {
            let word = assemble_register_word(reg, val);
            assert_eq!(word.count_ones() % 2, 1, "reg={reg:#x} val={val}");
        }
    }

    #[test]
    fn base128_roundtrip() {
        for word in [0u32, 1, 0x8000_0000, 0x1234_5678, u32::MAX] {
            let enc = encode_base128(word);
            assert_eq!(decode_base128(&enc), word);
        }
    }

    #[test]
    fn register_write_roundtrip() {
        let frame = encode_register_write(0x0208, 450);
        let decoded = decode_sysex(&frame).unwrap();
        match decoded {
            DecodedSysEx::Registers(regs) => assert_eq!(regs, vec![(0x0208, 450)]),
            _ => panic!("expected register packet"),
        }
    }

    #[test]
    fn negative_value_sign_extends() {
        let frame = encode_register_write(0x7D00, -650);
        let decoded = decode_sysex(&frame).unwrap();
        assert_eq!(decoded_pair(decoded), (0x7D00, -650));
    }

    fn decoded_pair(d: DecodedSysEx) -> (u16, i16) {
        match d {
            DecodedSysEx::Registers(regs) => regs[0],
            _ => panic!("expected registers"),
        }
    }

    #[test]
    fn gain_register_matches_spec_example() {
        // /input/3/gain 45.0 -> register 0x0208, value 450
        let frame = encode_register_write(0x0208, 450);
        assert_eq!(frame[0], 0xF0);
        assert_eq!(&frame[1..4], &MANUFACTURER_ID);
        assert_eq!(frame[4], DEVICE_ID);
        assert_eq!(frame[5], 0x00);
        assert_eq!(*frame.last().unwrap(), 0xF7);
    }

    #[test]
    fn peak_level_zero_is_floor() {
        assert_eq!(peak_to_db(0), LEVEL_FLOOR_DB);
    }

    #[test]
    fn peak_level_full_scale_is_zero_db() {
        let db = peak_to_db(0x0800_0000);
        assert!(db.abs() < 1e-6, "expected ~0dB, got {db}");
    }

    #[test]
    fn malformed_frame_rejected() {
        assert!(decode_sysex(&[0xF0, 0x00, 0x20, 0x0D, 0x10, 0x00, 0xF7]).is_ok());
        assert!(decode_sysex(&[0x00, 0x20, 0x0D]).is_err());
        assert!(decode_sysex(&[0xF0, 0x00, 0x20, 0x0E, 0x10, 0x00, 0xF7]).is_err());
    }
}
