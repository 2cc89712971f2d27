//! Parameter modulation system.
//!
//! This module provides the [`Parameter`] type, which lets a block's control
//! value come from either a fixed constant or another block's modulation
//! output. Per-sample smoothing is left to the individual block (see
//! [`crate::smoothing::SmoothedValue`]); not every parameter needs it, and
//! the ones that do apply it differently (gain smooths the linear value, a
//! filter's cutoff is just clamped and recomputed every block).

use crate::{block::BlockId, sample::Sample};

/// A block parameter: either a fixed value, or sourced from a modulator
/// block's output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parameter<S: Sample> {
    /// A fixed value that doesn't change during processing.
    Constant(S),

    /// A value controlled by a modulator block's output, referenced by
    /// [`BlockId`].
    Modulated(BlockId),
}

impl<S: Sample> Parameter<S> {
    /// Create a constant parameter with the given value.
    #[inline]
    pub fn constant(value: S) -> Self {
        Parameter::Constant(value)
    }

    /// Create a parameter sourced from a modulator block.
    #[inline]
    pub fn modulated(block_id: BlockId) -> Self {
        Parameter::Modulated(block_id)
    }

    /// Resolve the current value, looking up `modulation_values` for
    /// modulated parameters. Out-of-range block IDs resolve to zero rather
    /// than panicking: a modulation source disappearing is a configuration
    /// error caught at graph build time, not something the audio thread
    /// should ever fault on.
    #[inline]
    pub fn get_value(&self, modulation_values: &[S]) -> S {
        match self {
            Parameter::Constant(value) => *value,
            Parameter::Modulated(block_id) => modulation_values.get(block_id.0).copied().unwrap_or(S::ZERO),
        }
    }
}

/// Describes a modulation output provided by a modulator block.
///
/// Modulator blocks declare their outputs using this type, specifying the
/// output name and expected value range.
#[derive(Debug, Clone)]
pub struct ModulationOutput {
    /// Human-readable name for this output (e.g., "amplitude", "frequency").
    pub name: &'static str,

    /// Minimum value this output can produce.
    pub min_value: f64,

    /// Maximum value this output can produce.
    pub max_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_ignores_modulation_values() {
        let p = Parameter::constant(2.0f32);
        assert_eq!(p.get_value(&[9.0, 9.0]), 2.0);
    }

    #[test]
    fn modulated_reads_indexed_value() {
        let p = Parameter::modulated(BlockId(1));
        assert_eq!(p.get_value(&[1.0f32, 5.0, 9.0]), 5.0);
    }

    #[test]
    fn modulated_out_of_range_is_zero() {
        let p: Parameter<f32> = Parameter::modulated(BlockId(3));
        assert_eq!(p.get_value(&[1.0, 2.0]), 0.0);
    }
}
