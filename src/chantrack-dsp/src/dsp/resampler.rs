// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Polyphase fractional resampler driven by a running distance accumulator.

use num_complex::Complex;

use super::filter::windowed_sinc;
use crate::error::{ConfigResult, ConfigurationError};

/// Fractional phase resolution of the polyphase bank.
pub const PHASE_STEPS: usize = 16;

const MIN_TAPS_PER_PHASE: usize = 16;
const MAX_TAPS_PER_PHASE: usize = 2048;

/// Divisor applied to the RF bandwidth to get the anti-alias cutoff.
const BANDWIDTH_TO_CUTOFF: f64 = 2.2;

/// Polyphase FIR bank evaluated at arbitrary fractional positions.
///
/// `remain` is the caller-owned distance to the next output, measured in
/// input samples. Outputs are spaced `distance = input_rate / output_rate`
/// apart; the caller adds `distance` after every emitted sample.
#[derive(Debug, Clone)]
pub struct Resampler {
    taps_per_phase: usize,
    /// Per-phase taps, stored newest-last to line up with the delay window.
    phases: Vec<Vec<f32>>,
    delay: Vec<Complex<f32>>,
    pos: usize,
}

impl Resampler {
    /// Build a bank for `input_rate` with a low-pass at `cutoff_hz`.
    pub fn new(input_rate: f64, cutoff_hz: f64) -> Self {
        let cutoff_hz = cutoff_hz.clamp(1.0, 0.45 * input_rate.max(2.0));
        let taps_per_phase = ((8.0 * input_rate / cutoff_hz).ceil() as usize)
            .clamp(MIN_TAPS_PER_PHASE, MAX_TAPS_PER_PHASE);

        let total = PHASE_STEPS * taps_per_phase;
        let cutoff_norm = (cutoff_hz / (input_rate * PHASE_STEPS as f64)) as f32;
        let prototype = windowed_sinc(cutoff_norm, total);

        let gain = PHASE_STEPS as f32;
        let phases = (0..PHASE_STEPS)
            .map(|phase| {
                (0..taps_per_phase)
                    .rev()
                    .map(|k| prototype[k * PHASE_STEPS + phase] * gain)
                    .collect()
            })
            .collect();

        Self {
            taps_per_phase,
            phases,
            delay: vec![Complex::new(0.0, 0.0); 2 * taps_per_phase],
            pos: 0,
        }
    }

    pub fn taps_per_phase(&self) -> usize {
        self.taps_per_phase
    }

    pub fn reset(&mut self) {
        self.delay.fill(Complex::new(0.0, 0.0));
        self.pos = 0;
    }

    fn advance(&mut self, sample: Complex<f32>) {
        let n = self.taps_per_phase;
        self.delay[self.pos] = sample;
        self.delay[self.pos + n] = sample;
        self.pos = (self.pos + 1) % n;
    }

    fn evaluate(&self, remain: f64) -> Complex<f32> {
        let phase = ((remain * PHASE_STEPS as f64).floor().max(0.0) as usize).min(PHASE_STEPS - 1);
        let window = &self.delay[self.pos..self.pos + self.taps_per_phase];
        window
            .iter()
            .zip(&self.phases[phase])
            .fold(Complex::new(0.0, 0.0), |acc, (&x, &h)| acc + x * h)
    }

    /// Consume `sample`; return an output once `remain` drops below one.
    pub fn decimate(&mut self, remain: &mut f64, sample: Complex<f32>) -> Option<Complex<f32>> {
        self.advance(sample);
        *remain -= 1.0;
        if *remain >= 1.0 {
            return None;
        }
        Some(self.evaluate(*remain))
    }

    /// Produce one output without consuming `sample` while `remain < 1`;
    /// otherwise consume it and return `None`.
    pub fn interpolate(&mut self, remain: &mut f64, sample: Complex<f32>) -> Option<Complex<f32>> {
        if *remain >= 1.0 {
            self.advance(sample);
            *remain -= 1.0;
            return None;
        }
        Some(self.evaluate(*remain))
    }
}

/// Converts the NCO output rate to the channel rate.
///
/// Equal rates bypass the bank entirely, so samples pass through bit-exact.
#[derive(Debug, Clone)]
pub struct RateAdapter {
    resampler: Option<Resampler>,
    distance: f64,
    remain: f64,
}

impl RateAdapter {
    pub fn new(input_rate: u32, output_rate: u32, bandwidth_hz: f32) -> ConfigResult<Self> {
        if input_rate == 0 {
            return Err(ConfigurationError::ZeroSampleRate("input"));
        }
        if output_rate == 0 {
            return Err(ConfigurationError::ZeroSampleRate("channel"));
        }
        if !(bandwidth_hz.is_finite() && bandwidth_hz > 0.0) {
            return Err(ConfigurationError::InvalidBandwidth(bandwidth_hz));
        }

        let distance = input_rate as f64 / output_rate as f64;
        let resampler = (input_rate != output_rate).then(|| {
            Resampler::new(input_rate as f64, bandwidth_hz as f64 / BANDWIDTH_TO_CUTOFF)
        });
        Ok(Self {
            resampler,
            distance,
            remain: 0.0,
        })
    }

    /// Input samples per output sample.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn is_bypass(&self) -> bool {
        self.resampler.is_none()
    }

    pub fn reset(&mut self) {
        self.remain = 0.0;
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }

    /// Feed one input sample, calling `emit` for each channel-rate output.
    pub fn push(&mut self, sample: Complex<f32>, mut emit: impl FnMut(Complex<f32>)) {
        let Some(resampler) = self.resampler.as_mut() else {
            emit(sample);
            return;
        };

        if self.distance < 1.0 {
            while let Some(out) = resampler.interpolate(&mut self.remain, sample) {
                emit(out);
                self.remain += self.distance;
            }
        } else if let Some(out) = resampler.decimate(&mut self.remain, sample) {
            emit(out);
            self.remain += self.distance;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn tone(freq_hz: f32, rate: f32, len: usize) -> Vec<Complex<f32>> {
        (0..len)
            .map(|n| Complex::from_polar(1.0, TAU * freq_hz * n as f32 / rate))
            .collect()
    }

    fn run(adapter: &mut RateAdapter, input: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut out = Vec::new();
        for &sample in input {
            adapter.push(sample, |s| out.push(s));
        }
        out
    }

    #[test]
    fn equal_rates_are_identity() {
        let mut adapter = RateAdapter::new(48_000, 48_000, 6_000.0).unwrap();
        assert!(adapter.is_bypass());
        let input = tone(1_234.0, 48_000.0, 500);
        assert_eq!(run(&mut adapter, &input), input);
    }

    #[test]
    fn output_count_tracks_rate_ratio() {
        let n = 10_000;
        let input = tone(500.0, 48_000.0, n);
        for (input_rate, output_rate) in [
            (200_000, 50_000),
            (48_000, 44_100),
            (48_000, 96_000),
            (8_000, 48_000),
            (250_000, 48_000),
        ] {
            let mut adapter = RateAdapter::new(input_rate, output_rate, 4_000.0).unwrap();
            let count = run(&mut adapter, &input).len() as f64;
            let expected = n as f64 * output_rate as f64 / input_rate as f64;
            assert!(
                (count - expected).abs() <= 1.0,
                "{input_rate}->{output_rate}: {count} outputs, expected {expected}"
            );
        }
    }

    #[test]
    fn decimation_preserves_inband_tone() {
        let mut adapter = RateAdapter::new(200_000, 50_000, 10_000.0).unwrap();
        let out = run(&mut adapter, &tone(1_000.0, 200_000.0, 40_000));
        let settled = &out[500..];

        let expected_step = TAU * 1_000.0 / 50_000.0;
        for pair in settled.windows(2) {
            let step = (pair[1] * pair[0].conj()).arg();
            assert!((step - expected_step).abs() < 1e-2, "step {step}");
        }
        for s in settled {
            assert!((s.norm() - 1.0).abs() < 0.05, "magnitude {}", s.norm());
        }
    }

    #[test]
    fn high_ratio_decimation_keeps_flat_passband() {
        let mut adapter = RateAdapter::new(250_000, 48_000, 4_000.0).unwrap();
        let out = run(&mut adapter, &tone(500.0, 250_000.0, 50_000));
        let settled = &out[500..];
        for s in settled {
            assert!((s.norm() - 1.0).abs() < 0.01, "magnitude {}", s.norm());
        }
    }

    #[test]
    fn decimation_rejects_out_of_band_tone() {
        let mut adapter = RateAdapter::new(200_000, 50_000, 10_000.0).unwrap();
        let out = run(&mut adapter, &tone(40_000.0, 200_000.0, 40_000));
        let settled = &out[500..];
        let power = settled.iter().map(|s| s.norm_sqr()).sum::<f32>() / settled.len() as f32;
        assert!(power < 1e-3, "alias power {power}");
    }

    #[test]
    fn interpolation_preserves_tone() {
        let mut adapter = RateAdapter::new(8_000, 48_000, 3_000.0).unwrap();
        let out = run(&mut adapter, &tone(500.0, 8_000.0, 4_000));
        let settled = &out[2_000..];
        let expected_step = TAU * 500.0 / 48_000.0;
        let mean_step = settled
            .windows(2)
            .map(|p| (p[1] * p[0].conj()).arg())
            .sum::<f32>()
            / (settled.len() - 1) as f32;
        assert!((mean_step - expected_step).abs() < 1e-3, "mean step {mean_step}");
    }

    #[test]
    fn reset_restarts_accumulator() {
        let mut adapter = RateAdapter::new(200_000, 50_000, 10_000.0).unwrap();
        let input = tone(1_000.0, 200_000.0, 3);
        let first = run(&mut adapter, &input).len();
        adapter.reset();
        assert_eq!(run(&mut adapter, &input).len(), first);
    }

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(RateAdapter::new(0, 48_000, 1_000.0).is_err());
        assert!(RateAdapter::new(48_000, 0, 1_000.0).is_err());
        assert!(RateAdapter::new(48_000, 24_000, 0.0).is_err());
    }
}
