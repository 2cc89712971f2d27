//! Device Shadow State (C7): the control server's belief about what the
//! hardware currently holds, kept in sync by SysEx echoes rather than by
//! optimistically applying OSC writes.
//!
//! Writes arriving from OSC validate and compute a register value, then send
//! it to the device; the shadow is only updated once the device's SysEx echo
//! is decoded and run back through [`DeviceShadow::apply_register`]. This
//! keeps the shadow as "what the device says," never "what we wished."

use std::collections::HashMap;
use std::sync::Mutex;

/// Coarse-locked map from register address to last-known value, plus the
/// per-channel level frames the periodic meter poll refreshes.
pub struct DeviceShadow {
    registers: Mutex<HashMap<u16, i16>>,
    input_levels: Mutex<Vec<LevelFrame>>,
    output_levels: Mutex<Vec<LevelFrame>>,
    playback_levels: Mutex<Vec<LevelFrame>>,
    input_levels_fx: Mutex<Vec<LevelFrame>>,
    output_levels_fx: Mutex<Vec<LevelFrame>>,
    refresh_in_progress: Mutex<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LevelFrame {
    pub peak_db: f64,
    pub rms_db: f64,
    pub overload: bool,
}

impl DeviceShadow {
    pub fn new() -> Self {
        Self {
            registers: Mutex::new(HashMap::new()),
            input_levels: Mutex::new(Vec::new()),
            output_levels: Mutex::new(Vec::new()),
            playback_levels: Mutex::new(Vec::new()),
            input_levels_fx: Mutex::new(Vec::new()),
            output_levels_fx: Mutex::new(Vec::new()),
            refresh_in_progress: Mutex::new(false),
        }
    }

    /// Applies a decoded register echo. Returns `true` if the value actually
    /// changed, letting callers dedup outbound OSC notifications.
    pub fn apply_register(&self, register: u16, value: i16) -> bool {
        let mut registers = self.registers.lock().expect("shadow register lock poisoned");
        let changed = registers.get(&register) != Some(&value);
        registers.insert(register, value);
        changed
    }

    pub fn register(&self, register: u16) -> Option<i16> {
        self.registers.lock().expect("shadow register lock poisoned").get(&register).copied()
    }

    pub fn apply_levels(
        &self,
        target: LevelTarget,
        channels: Vec<LevelFrame>,
        mirror_fx: bool,
    ) {
        let slot = match target {
            LevelTarget::Input => &self.input_levels,
            LevelTarget::Playback => &self.playback_levels,
            LevelTarget::Output => &self.output_levels,
        };
        *slot.lock().expect("shadow level lock poisoned") = channels.clone();

        if mirror_fx {
            let fx_slot = match target {
                LevelTarget::Input => &self.input_levels_fx,
                LevelTarget::Output => &self.output_levels_fx,
                LevelTarget::Playback => return,
            };
            *fx_slot.lock().expect("shadow level lock poisoned") = channels;
        }
    }

    pub fn levels(&self, target: LevelTarget) -> Vec<LevelFrame> {
        let slot = match target {
            LevelTarget::Input => &self.input_levels,
            LevelTarget::Playback => &self.playback_levels,
            LevelTarget::Output => &self.output_levels,
        };
        slot.lock().expect("shadow level lock poisoned").clone()
    }

    pub fn set_refresh_in_progress(&self, value: bool) {
        *self.refresh_in_progress.lock().expect("shadow refresh lock poisoned") = value;
    }

    pub fn refresh_in_progress(&self) -> bool {
        *self.refresh_in_progress.lock().expect("shadow refresh lock poisoned")
    }
}

impl Default for DeviceShadow {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelTarget {
    Input,
    Playback,
    Output,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_apply_detects_change() {
        let shadow = DeviceShadow::new();
        assert!(shadow.apply_register(0x0208, 450));
        assert!(!shadow.apply_register(0x0208, 450));
        assert!(shadow.apply_register(0x0208, 460));
    }

    #[test]
    fn levels_round_trip() {
        let shadow = DeviceShadow::new();
        let frames = vec![LevelFrame { peak_db: -3.0, rms_db: -6.0, overload: false }];
        shadow.apply_levels(LevelTarget::Input, frames.clone(), true);
        assert_eq!(shadow.levels(LevelTarget::Input), frames);
    }
}
