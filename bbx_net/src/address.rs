//! OSC <-> register address tree (C8).
//!
//! The tree's *shape* is static — the same handful of subtrees under
//! `/input/<n>`, `/output/<n>`, `/mix/<n>/input/<m>`, `/durec`, `/hardware`,
//! `/clock`, and `/refresh` — but channel segments carry a decimal index
//! rather than being literal children, so resolution is expressed as a
//! straight-line segment match rather than a generic walk over boxed
//! `(name, child)` nodes: each match arm *is* one tree node, its register
//! offset computed from [`crate::register`]. A node with no matching arm at
//! any segment is the "stopped at the first absent child" failure the
//! design calls for, surfaced as [`NetError::UnknownAddress`].

use crate::error::{NetError, Result};
use crate::register;

/// A resolved OSC address: which device parameter it names, plus enough
/// metadata for the caller to validate and scale an incoming value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    InputGain(u32),
    InputMute(u32),
    InputPan(u32),
    InputStereo(u32),
    OutputGain(u32),
    OutputMute(u32),
    OutputPan(u32),
    PlaybackStereo(u32),
    MixVolume { output: u32, input: u32 },
    MixPan { output: u32, input: u32 },
    DurecStatus,
    DurecTime,
    DurecFile,
    DurecPlay,
    DurecStop,
    DurecRecord,
    DurecDelete,
    DurecNumFiles,
    DurecName,
    HardwareDspLoad,
    HardwareDspVersion,
    HardwareOpticalOut,
    HardwareSpdifOut,
    ClockSource,
    ClockSampleRate,
    Refresh,
}

/// Validation/scale metadata for a resolved [`Param`], mirroring the address
/// tree node's `(min, max, scale)` or `(enum name list)` metadata field.
pub enum ParamKind {
    /// A floating-point dB value stored as tenths of a dB.
    Fixed { min: f64, max: f64 },
    /// An integer in a fixed range (pan, numeric indices).
    Int { min: i32, max: i32 },
    /// A boolean flag.
    Bool,
    /// A read-only value the device reports; no OSC setter exists.
    ReadOnly,
    /// A case-insensitive string/int enum.
    Enum(&'static [&'static str]),
    /// A write-only trigger with no associated value.
    Trigger,
}

impl Param {
    /// Resolves a literal OSC address (`/input/3/gain`, `/mix/1/input/1`,
    /// `/durec/play`, ...) into a [`Param`]. Channel segments are parsed as
    /// 1-based decimal integers.
    pub fn parse(address: &str) -> Result<Param> {
        let segments: Vec<&str> = address.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        resolve(&segments).ok_or_else(|| NetError::UnknownAddress(address.to_string()))
    }

    pub fn kind(self) -> ParamKind {
        match self {
            Param::InputGain(_) | Param::OutputGain(_) => ParamKind::Fixed { min: -65.0, max: 6.0 },
            Param::InputPan(_) | Param::OutputPan(_) => ParamKind::Int { min: -100, max: 100 },
            Param::MixVolume { .. } => ParamKind::Fixed { min: -65.0, max: 6.0 },
            Param::MixPan { .. } => ParamKind::Int { min: -100, max: 100 },
            Param::InputMute(_) | Param::OutputMute(_) | Param::InputStereo(_) | Param::PlaybackStereo(_) => {
                ParamKind::Bool
            }
            Param::DurecStatus | Param::DurecTime | Param::DurecFile | Param::DurecNumFiles | Param::DurecName => {
                ParamKind::ReadOnly
            }
            Param::DurecPlay | Param::DurecStop | Param::DurecRecord | Param::DurecDelete | Param::Refresh => {
                ParamKind::Trigger
            }
            Param::HardwareDspLoad | Param::HardwareDspVersion => ParamKind::ReadOnly,
            Param::HardwareOpticalOut | Param::HardwareSpdifOut => ParamKind::Bool,
            Param::ClockSource => ParamKind::Enum(&["internal", "word-clock", "adat", "spdif"]),
            Param::ClockSampleRate => ParamKind::Int { min: 32_000, max: 192_000 },
        }
    }

    /// Primary register this parameter maps to (the `reg` worked examples
    /// write to and the device echoes back).
    pub fn register(self) -> u16 {
        match self {
            Param::InputGain(ch) => register::channel_register(register::INPUT_GAIN_BASE, ch),
            Param::InputMute(ch) => register::channel_register(register::INPUT_MUTE_BASE, ch),
            Param::InputPan(ch) => register::channel_register(register::INPUT_PAN_BASE, ch),
            Param::InputStereo(ch) => register::channel_register(register::INPUT_STEREO_BASE, ch),
            Param::OutputGain(ch) => register::channel_register(register::OUTPUT_GAIN_BASE, ch),
            Param::OutputMute(ch) => register::channel_register(register::OUTPUT_MUTE_BASE, ch),
            Param::OutputPan(ch) => register::channel_register(register::OUTPUT_PAN_BASE, ch),
            Param::PlaybackStereo(ch) => register::channel_register(register::PLAYBACK_STEREO_BASE, ch),
            Param::MixVolume { output, input } => register::matrix_register(output, input),
            Param::MixPan { output, input } => register::matrix_register(output, input) + 1,
            Param::Refresh => register::REFRESH_REGISTER,
            _ => 0,
        }
    }
}

fn resolve(segments: &[&str]) -> Option<Param> {
    match segments {
        ["input", ch, "gain"] => Some(Param::InputGain(parse_channel(ch)?)),
        ["input", ch, "mute"] => Some(Param::InputMute(parse_channel(ch)?)),
        ["input", ch, "pan"] => Some(Param::InputPan(parse_channel(ch)?)),
        ["input", ch, "stereo"] => Some(Param::InputStereo(parse_channel(ch)?)),
        ["output", ch, "gain"] => Some(Param::OutputGain(parse_channel(ch)?)),
        ["output", ch, "mute"] => Some(Param::OutputMute(parse_channel(ch)?)),
        ["output", ch, "pan"] => Some(Param::OutputPan(parse_channel(ch)?)),
        ["playback", ch, "stereo"] => Some(Param::PlaybackStereo(parse_channel(ch)?)),
        ["mix", out, "input", inp, "pan"] => {
            Some(Param::MixPan { output: parse_channel(out)?, input: parse_channel(inp)? })
        }
        ["mix", out, "input", inp] => {
            Some(Param::MixVolume { output: parse_channel(out)?, input: parse_channel(inp)? })
        }
        ["durec", "status"] => Some(Param::DurecStatus),
        ["durec", "time"] => Some(Param::DurecTime),
        ["durec", "file"] => Some(Param::DurecFile),
        ["durec", "play"] => Some(Param::DurecPlay),
        ["durec", "stop"] => Some(Param::DurecStop),
        ["durec", "record"] => Some(Param::DurecRecord),
        ["durec", "delete"] => Some(Param::DurecDelete),
        ["durec", "numfiles"] => Some(Param::DurecNumFiles),
        ["durec", "name"] => Some(Param::DurecName),
        ["hardware", "dspload"] => Some(Param::HardwareDspLoad),
        ["hardware", "dspvers"] => Some(Param::HardwareDspVersion),
        ["hardware", "opticalout"] => Some(Param::HardwareOpticalOut),
        ["hardware", "spdifout"] => Some(Param::HardwareSpdifOut),
        ["clock", "source"] => Some(Param::ClockSource),
        ["clock", "samplerate"] => Some(Param::ClockSampleRate),
        ["refresh"] => Some(Param::Refresh),
        _ => None,
    }
}

fn parse_channel(segment: &str) -> Option<u32> {
    let n: u32 = segment.parse().ok()?;
    if n == 0 { None } else { Some(n) }
}

/// The other channel of a stereo pair (1-indexed, pairs are `(1,2), (3,4),
/// ...`): the odd channel's partner is the next channel up, the even
/// channel's partner is the one below. Shared by the setter (which must
/// also write the partner's register) and the notifier (which must also
/// emit the partner's derived OSC broadcast) so the two sides of a stereo
/// link can never disagree on who's paired with whom.
pub fn stereo_partner_channel(channel: u32) -> u32 {
    if channel % 2 == 1 { channel + 1 } else { channel.saturating_sub(1) }
}

/// The channel count the control server enumerates for notification/echo
/// lookups. Not a hard protocol limit — just the bound this address tree
/// pre-builds its register->address reverse index over.
pub const MAX_ENUMERATED_CHANNELS: u32 = 20;

/// Every address this tree can produce, for a fixed channel bound. Used by
/// the control server to build a register -> address reverse index so a
/// decoded SysEx echo can be turned back into one or more OSC notifications.
pub fn known_addresses() -> Vec<(String, Param)> {
    let mut addresses = Vec::new();
    for ch in 1..=MAX_ENUMERATED_CHANNELS {
        addresses.push((format!("/input/{ch}/gain"), Param::InputGain(ch)));
        addresses.push((format!("/input/{ch}/mute"), Param::InputMute(ch)));
        addresses.push((format!("/input/{ch}/pan"), Param::InputPan(ch)));
        addresses.push((format!("/input/{ch}/stereo"), Param::InputStereo(ch)));
        addresses.push((format!("/output/{ch}/gain"), Param::OutputGain(ch)));
        addresses.push((format!("/output/{ch}/mute"), Param::OutputMute(ch)));
        addresses.push((format!("/output/{ch}/pan"), Param::OutputPan(ch)));
        addresses.push((format!("/playback/{ch}/stereo"), Param::PlaybackStereo(ch)));
    }
    for out in 1..=MAX_ENUMERATED_CHANNELS {
        for inp in 1..=MAX_ENUMERATED_CHANNELS {
            addresses.push((format!("/mix/{out}/input/{inp}"), Param::MixVolume { output: out, input: inp }));
            addresses.push((format!("/mix/{out}/input/{inp}/pan"), Param::MixPan { output: out, input: inp }));
        }
    }
    addresses.push(("/durec/status".into(), Param::DurecStatus));
    addresses.push(("/durec/time".into(), Param::DurecTime));
    addresses.push(("/durec/file".into(), Param::DurecFile));
    addresses.push(("/durec/numfiles".into(), Param::DurecNumFiles));
    addresses.push(("/durec/name".into(), Param::DurecName));
    addresses.push(("/hardware/dspload".into(), Param::HardwareDspLoad));
    addresses.push(("/hardware/dspvers".into(), Param::HardwareDspVersion));
    addresses.push(("/hardware/opticalout".into(), Param::HardwareOpticalOut));
    addresses.push(("/hardware/spdifout".into(), Param::HardwareSpdifOut));
    addresses.push(("/clock/source".into(), Param::ClockSource));
    addresses.push(("/clock/samplerate".into(), Param::ClockSampleRate));
    addresses
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_input_gain() {
        assert_eq!(Param::parse("/input/3/gain").unwrap(), Param::InputGain(3));
        assert_eq!(Param::InputGain(3).register(), 0x0208);
    }

    #[test]
    fn resolves_mix_cell_and_pan() {
        assert_eq!(Param::parse("/mix/1/input/1").unwrap(), Param::MixVolume { output: 1, input: 1 });
        assert_eq!(Param::parse("/mix/1/input/1/pan").unwrap(), Param::MixPan { output: 1, input: 1 });
    }

    #[test]
    fn rejects_unknown_address() {
        assert!(Param::parse("/nonsense/path").is_err());
    }

    #[test]
    fn rejects_zero_channel() {
        assert!(Param::parse("/input/0/gain").is_err());
    }

    #[test]
    fn durec_and_refresh_resolve() {
        assert_eq!(Param::parse("/durec/play").unwrap(), Param::DurecPlay);
        assert_eq!(Param::parse("/refresh").unwrap(), Param::Refresh);
    }

    #[test]
    fn stereo_partner_channel_pairs_odd_and_even() {
        assert_eq!(stereo_partner_channel(5), 6);
        assert_eq!(stereo_partner_channel(6), 5);
        assert_eq!(stereo_partner_channel(1), 2);
        assert_eq!(stereo_partner_channel(2), 1);
    }

    #[test]
    fn input_and_output_gain_registers_do_not_collide() {
        assert_ne!(Param::InputGain(3).register(), Param::OutputGain(3).register());
    }
}
