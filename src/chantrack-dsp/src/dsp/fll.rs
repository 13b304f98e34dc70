// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;

use super::wrap_phase;
use crate::error::{check_positive, ConfigResult, ConfigurationError};

pub const DEFAULT_FLL_BANDWIDTH: f32 = 0.004;

/// First-order frequency-locked loop.
///
/// Each input is derotated by the loop's own oscillator and the residual
/// differential phase between consecutive samples corrects the frequency
/// estimate by `alpha * error`.
#[derive(Debug, Clone)]
pub struct FreqLock {
    alpha: f32,
    sample_rate: u32,
    freq: f32,
    phase: f32,
    prev: Complex<f32>,
}

impl Default for FreqLock {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_FLL_BANDWIDTH,
            sample_rate: 48_000,
            freq: 0.0,
            phase: 0.0,
            prev: Complex::new(0.0, 0.0),
        }
    }
}

impl FreqLock {
    /// `bandwidth` is the per-sample correction factor in `(0, 1]`.
    pub fn compute_coefficients(&mut self, bandwidth: f32) -> ConfigResult<()> {
        check_positive("bandwidth", bandwidth)?;
        if bandwidth > 1.0 {
            return Err(ConfigurationError::InvalidLoopParameter {
                name: "bandwidth",
                value: bandwidth,
            });
        }
        self.alpha = bandwidth;
        Ok(())
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn reset(&mut self) {
        self.freq = 0.0;
        self.phase = 0.0;
        self.prev = Complex::new(0.0, 0.0);
    }

    pub fn feed(&mut self, re: f32, im: f32) {
        let z = Complex::new(re, im) * Complex::from_polar(1.0, -self.phase);
        let error = (z * self.prev.conj()).arg();
        self.prev = z;

        self.freq += self.alpha * error;
        self.phase = wrap_phase(self.phase + self.freq);
    }

    /// Frequency estimate in radians per sample.
    pub fn freq(&self) -> f32 {
        self.freq
    }

    pub fn freq_hz(&self) -> f64 {
        self.freq as f64 * self.sample_rate as f64 / std::f64::consts::TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::TAU;

    fn feed_tone(fll: &mut FreqLock, freq_hz: f64, rate: f64, len: usize) {
        for n in 0..len {
            let phase = (TAU * freq_hz * n as f64 / rate).rem_euclid(TAU);
            let s = Complex::from_polar(0.5, phase as f32);
            fll.feed(s.re, s.im);
        }
    }

    #[test]
    fn converges_to_tone_frequency() {
        for freq_hz in [-2_500.0, 150.0, 1_000.0] {
            let mut fll = FreqLock::default();
            fll.set_sample_rate(50_000);
            feed_tone(&mut fll, freq_hz, 50_000.0, 10_000);
            assert!(
                (fll.freq_hz() - freq_hz).abs() < 1.0,
                "{freq_hz}: {}",
                fll.freq_hz()
            );
        }
    }

    #[test]
    fn silence_holds_estimate() {
        let mut fll = FreqLock::default();
        fll.set_sample_rate(50_000);
        feed_tone(&mut fll, 800.0, 50_000.0, 10_000);
        let held = fll.freq();
        for _ in 0..1_000 {
            fll.feed(0.0, 0.0);
        }
        assert!((fll.freq() - held).abs() < 1e-6);
    }

    #[test]
    fn reset_zeroes_estimate() {
        let mut fll = FreqLock::default();
        feed_tone(&mut fll, 800.0, 48_000.0, 1_000);
        fll.reset();
        assert_eq!(fll.freq(), 0.0);
    }

    #[test]
    fn bandwidth_bounds() {
        let mut fll = FreqLock::default();
        assert!(fll.compute_coefficients(0.0).is_err());
        assert!(fll.compute_coefficients(1.5).is_err());
        assert!(fll.compute_coefficients(1.0).is_ok());
    }
}
