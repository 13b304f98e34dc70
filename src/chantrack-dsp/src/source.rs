// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample sources feeding a channel.

use num_complex::Complex;

use crate::dsp::Nco;

/// Abstraction over any IQ sample source (hardware driver, file, synthetic).
pub trait IqSource: Send + 'static {
    /// Read the next block of IQ samples into `buf`.
    /// Returns the number of samples written, or an error string.
    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, String>;
}

/// Produces silence.
pub struct MockIqSource;

impl IqSource for MockIqSource {
    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, String> {
        buf.fill(Complex::new(0.0, 0.0));
        Ok(buf.len())
    }
}

/// Continuous complex tone at a fixed offset from the input centre.
pub struct ToneIqSource {
    nco: Nco,
    amplitude: f32,
}

impl ToneIqSource {
    pub fn new(offset_hz: f64, sample_rate: u32, amplitude: f32) -> Self {
        Self {
            nco: Nco::new(offset_hz, sample_rate as f64),
            amplitude,
        }
    }
}

impl IqSource for ToneIqSource {
    fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, String> {
        for sample in buf.iter_mut() {
            *sample = self.nco.next_iq() * self.amplitude;
        }
        Ok(buf.len())
    }
}
