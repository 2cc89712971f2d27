//! Gain block for applying volume control with smoothing.

use crate::{
    block::Block,
    context::DspContext,
    parameter::{ModulationOutput, Parameter},
    sample::Sample,
    smoothing::SmoothedValue,
};

/// Convert decibels to linear gain.
#[inline]
fn db_to_linear<S: Sample>(db: S) -> S {
    S::from_f64(10.0_f64.powf(db.to_f64() / 20.0))
}

/// Gain block for applying volume control.
///
/// The level parameter is in decibels (-inf to +24 dB typically).
/// Smoothing is applied to the linear gain, not the dB value, so the
/// change in perceived loudness is even across the ramp.
pub struct GainBlock<S: Sample> {
    /// Level in decibels.
    pub level_db: Parameter<S>,
    /// Smoothing time in milliseconds.
    smoothing_ms: f64,
    /// Smoothed linear gain value.
    smoothed_gain: SmoothedValue,
    /// Number of input/output channels.
    num_channels: usize,
}

impl<S: Sample> GainBlock<S> {
    /// Create a new `GainBlock` with the given level (in dB) and smoothing time.
    pub fn new(level_db: S, smoothing_ms: f64, num_channels: usize) -> Self {
        let linear = db_to_linear(level_db).to_f64();
        Self {
            level_db: Parameter::constant(level_db),
            smoothing_ms,
            smoothed_gain: SmoothedValue::new(linear),
            num_channels,
        }
    }

    /// Create a unity gain block (0 dB).
    pub fn unity(num_channels: usize) -> Self {
        Self::new(S::ZERO, 20.0, num_channels)
    }
}

impl<S: Sample> Block<S> for GainBlock<S> {
    fn process(&mut self, inputs: &[&[S]], outputs: &mut [&mut [S]], modulation_values: &[S], context: &DspContext) {
        let target_db = self.level_db.get_value(modulation_values);
        let target_linear = db_to_linear(target_db).to_f64();

        if (target_linear - self.smoothed_gain.target()).abs() > 1e-9 {
            let samples = ((self.smoothing_ms / 1000.0) * context.sample_rate) as usize;
            self.smoothed_gain.set_target(target_linear, samples);
        }

        let channel_count = inputs.len().min(outputs.len()).min(self.num_channels);
        for channel in 0..channel_count {
            let input = inputs[channel];
            let output = &mut outputs[channel];

            for i in 0..input.len().min(output.len()) {
                let gain = S::from_f64(self.smoothed_gain.next_value());
                output[i] = input[i] * gain;
            }
        }
    }

    #[inline]
    fn input_count(&self) -> usize {
        self.num_channels
    }

    #[inline]
    fn output_count(&self) -> usize {
        self.num_channels
    }

    #[inline]
    fn modulation_outputs(&self) -> &[ModulationOutput] {
        &[]
    }

    fn set_smoothing(&mut self, _sample_rate: f64, ramp_time_ms: f64) {
        self.smoothing_ms = ramp_time_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_to_linear() {
        // 0 dB = unity gain
        assert!((db_to_linear(0.0f32) - 1.0).abs() < 1e-6);
        // -6 dB ≈ 0.5
        assert!((db_to_linear(-6.0206f32) - 0.5).abs() < 0.01);
        // +6 dB ≈ 2.0
        assert!((db_to_linear(6.0206f32) - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_gain_unity() {
        let mut gain = GainBlock::<f32>::new(0.0, 0.0, 2); // 0 dB, no smoothing
        let input = [vec![0.5f32; 64], vec![0.5f32; 64]];
        let mut output_left = vec![0.0f32; 64];
        let mut output_right = vec![0.0f32; 64];

        let context = DspContext {
            sample_rate: 44100.0,
            buffer_size: 64,
            num_channels: 2,
            current_sample: 0,
            channel_layout: Default::default(),
        };

        gain.process(
            &[&input[0], &input[1]],
            &mut [&mut output_left, &mut output_right],
            &[],
            &context,
        );

        // 0 dB = unity gain, output should equal input
        assert!((output_left[63] - 0.5).abs() < 0.001);
        assert!((output_right[63] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_gain_minus_6db() {
        let mut gain = GainBlock::<f32>::new(-6.0206, 0.0, 2); // -6 dB ≈ 0.5x
        let input = [vec![1.0f32; 64], vec![1.0f32; 64]];
        let mut output_left = vec![0.0f32; 64];
        let mut output_right = vec![0.0f32; 64];

        let context = DspContext {
            sample_rate: 44100.0,
            buffer_size: 64,
            num_channels: 2,
            current_sample: 0,
            channel_layout: Default::default(),
        };

        gain.process(
            &[&input[0], &input[1]],
            &mut [&mut output_left, &mut output_right],
            &[],
            &context,
        );

        // -6 dB ≈ 0.5x gain
        assert!((output_left[63] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_gain_set_parameter_via_block_type() {
        use crate::block::BlockType;

        let mut block_type: BlockType<f32> = GainBlock::new(0.0, 0.0, 2).into();
        block_type.set_parameter("level_db", Parameter::constant(-6.0206)).unwrap();

        let input = [vec![1.0f32; 32], vec![1.0f32; 32]];
        let mut output_left = vec![0.0f32; 32];
        let mut output_right = vec![0.0f32; 32];
        let context = DspContext {
            sample_rate: 44100.0,
            buffer_size: 32,
            num_channels: 2,
            current_sample: 0,
            channel_layout: Default::default(),
        };

        block_type.process(
            &[&input[0], &input[1]],
            &mut [&mut output_left, &mut output_right],
            &[],
            &context,
        );

        assert!((output_left[31] - 0.5).abs() < 0.01);
    }
}
