// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::f64::consts::TAU;

use num_complex::Complex;

/// Numerically controlled oscillator.
///
/// Produces `exp(j * phase)` and advances `phase` by `2π * freq / rate` on
/// every call. A positive frequency rotates counter-clockwise; mixing a
/// signal sitting at `+f` with an oscillator at `-f` brings it to DC.
#[derive(Debug, Clone, Default)]
pub struct Nco {
    phase: f64,
    phase_inc: f64,
}

impl Nco {
    pub fn new(freq_hz: f64, sample_rate: f64) -> Self {
        let mut nco = Self::default();
        nco.set_freq(freq_hz, sample_rate);
        nco
    }

    /// Retune without disturbing the running phase.
    pub fn set_freq(&mut self, freq_hz: f64, sample_rate: f64) {
        self.phase_inc = if sample_rate > 0.0 {
            TAU * freq_hz / sample_rate
        } else {
            0.0
        };
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn phase_inc(&self) -> f64 {
        self.phase_inc
    }

    pub fn next_iq(&mut self) -> Complex<f32> {
        let (sin, cos) = self.phase.sin_cos();
        self.phase = (self.phase + self.phase_inc).rem_euclid(TAU);
        Complex::new(cos as f32, sin as f32)
    }

    /// Multiply `sample` by the next oscillator output.
    #[inline]
    pub fn mix(&mut self, sample: Complex<f32>) -> Complex<f32> {
        sample * self.next_iq()
    }
}
