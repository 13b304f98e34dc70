// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! FFT overlap-add FIR engine with symmetric, single-sideband, vestigial and
//! root-raised-cosine responses.

use std::f32::consts::PI;
use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::error::{check_fraction, ConfigResult, ConfigurationError};

/// Default FFT length used by channel filters.
pub const DEFAULT_FFT_LEN: usize = 2048;

/// Hann-windowed sinc low-pass, normalised to unity DC gain.
///
/// `cutoff_norm` is the cutoff as a fraction of the sample rate.
pub(crate) fn windowed_sinc(cutoff_norm: f32, taps: usize) -> Vec<f32> {
    let taps = taps.max(1);
    let m = (taps - 1) as f32;
    let mut coeffs = Vec::with_capacity(taps);
    for i in 0..taps {
        let x = i as f32 - m / 2.0;
        let sinc = if x == 0.0 {
            2.0 * cutoff_norm
        } else {
            (2.0 * PI * cutoff_norm * x).sin() / (PI * x)
        };
        let window = if taps == 1 {
            1.0
        } else {
            0.5 * (1.0 - (2.0 * PI * i as f32 / m).cos())
        };
        coeffs.push(sinc * window);
    }
    normalize_dc(&mut coeffs);
    coeffs
}

fn normalize_dc(coeffs: &mut [f32]) {
    let sum: f32 = coeffs.iter().sum();
    if sum.abs() > 1e-12 {
        let inv = 1.0 / sum;
        for coeff in coeffs.iter_mut() {
            *coeff *= inv;
        }
    }
}

/// Complex band-pass passing `[low, high]` (signed fractions of the rate).
fn complex_band(low: f32, high: f32, taps: usize) -> Vec<Complex<f32>> {
    let proto = windowed_sinc((high - low) / 2.0, taps);
    let center = (high + low) / 2.0;
    let mid = (proto.len() - 1) as f32 / 2.0;
    proto
        .iter()
        .enumerate()
        .map(|(i, &coeff)| {
            Complex::from_polar(coeff, 2.0 * PI * center * (i as f32 - mid))
        })
        .collect()
}

fn real_kernel(coeffs: &[f32]) -> Vec<Complex<f32>> {
    coeffs.iter().map(|&c| Complex::new(c, 0.0)).collect()
}

fn rrc_tap(t: f32, rolloff: f32) -> f32 {
    if t.abs() < 1e-6 {
        return 1.0 - rolloff + 4.0 * rolloff / PI;
    }
    let edge = 1.0 / (4.0 * rolloff);
    if (t.abs() - edge).abs() < 1e-4 {
        let arg = PI / (4.0 * rolloff);
        return rolloff / 2.0_f32.sqrt()
            * ((1.0 + 2.0 / PI) * arg.sin() + (1.0 - 2.0 / PI) * arg.cos());
    }
    let num = (PI * t * (1.0 - rolloff)).sin() + 4.0 * rolloff * t * (PI * t * (1.0 + rolloff)).cos();
    let den = PI * t * (1.0 - (4.0 * rolloff * t).powi(2));
    num / den
}

/// Block convolution filter fed one sample at a time.
///
/// Samples accumulate until a block of `fft_len / 2` is complete; that call
/// returns the whole filtered block, every other call returns an empty slice.
/// Continuity across blocks is kept by adding the tail of the previous
/// convolution into the head of the next one.
pub struct OverlapAddFilter {
    fft_len: usize,
    block_len: usize,
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    /// Frequency response used by `run` and by the upper-sideband variants.
    h_upper: Vec<Complex<f32>>,
    /// Frequency response used by the lower-sideband variants.
    h_lower: Vec<Complex<f32>>,
    input: Vec<Complex<f32>>,
    input_idx: usize,
    overlap: Vec<Complex<f32>>,
    output: Vec<Complex<f32>>,
    work: Vec<Complex<f32>>,
}

impl OverlapAddFilter {
    /// Build an all-pass engine; `fft_len` is rounded up to a power of two.
    pub fn new(fft_len: usize) -> Self {
        let fft_len = fft_len.max(4).next_power_of_two();
        let block_len = fft_len / 2;

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_len);
        let ifft = planner.plan_fft_inverse(fft_len);

        let zero = Complex::new(0.0, 0.0);
        let mut filter = Self {
            fft_len,
            block_len,
            fft,
            ifft,
            h_upper: Vec::new(),
            h_lower: Vec::new(),
            input: vec![zero; block_len],
            input_idx: 0,
            overlap: vec![zero; fft_len - block_len],
            output: vec![zero; block_len],
            work: Vec::with_capacity(fft_len),
        };
        let identity = vec![Complex::new(1.0, 0.0)];
        filter.install(&identity, &identity);
        filter
    }

    pub fn block_len(&self) -> usize {
        self.block_len
    }

    fn kernel_taps(&self) -> usize {
        (self.block_len - 1).max(1)
    }

    fn to_freq(&self, kernel: &[Complex<f32>]) -> Vec<Complex<f32>> {
        let mut buf = Vec::with_capacity(self.fft_len);
        buf.extend_from_slice(&kernel[..kernel.len().min(self.fft_len - self.block_len + 1)]);
        buf.resize(self.fft_len, Complex::new(0.0, 0.0));
        self.fft.process(&mut buf);
        let scale = 1.0 / self.fft_len as f32;
        for value in &mut buf {
            *value *= scale;
        }
        buf
    }

    fn install(&mut self, upper: &[Complex<f32>], lower: &[Complex<f32>]) {
        self.h_upper = self.to_freq(upper);
        self.h_lower = self.to_freq(lower);
        self.reset();
    }

    /// Drop any partially accumulated block and convolution tail.
    pub fn reset(&mut self) {
        let zero = Complex::new(0.0, 0.0);
        self.input.fill(zero);
        self.overlap.fill(zero);
        self.input_idx = 0;
    }

    /// Symmetric band-pass passing `low <= |f| <= high`; `low == 0` gives a
    /// plain low-pass.
    pub fn create_filter(&mut self, low: f32, high: f32) -> ConfigResult<()> {
        check_fraction("band-pass lower edge", low)?;
        check_fraction("band-pass upper edge", high)?;
        if low >= high {
            return Err(ConfigurationError::InvertedBand {
                what: "band-pass",
                low,
                high,
            });
        }
        let taps = self.kernel_taps();
        let kernel = if low == 0.0 {
            real_kernel(&windowed_sinc(high, taps))
        } else {
            complex_band(low, high, taps)
                .into_iter()
                .zip(complex_band(-high, -low, taps))
                .map(|(pos, neg)| pos + neg)
                .collect()
        };
        self.install(&kernel, &kernel);
        Ok(())
    }

    /// Low-pass passing `|f| <= cutoff`.
    pub fn create_dsb_filter(&mut self, cutoff: f32) -> ConfigResult<()> {
        self.create_filter(0.0, cutoff)
    }

    /// One-sided band `[low, high]` for the upper sideband and its mirror
    /// `[-high, -low]` for the lower sideband.
    pub fn create_ssb_filter(&mut self, low: f32, high: f32) -> ConfigResult<()> {
        check_fraction("sideband lower edge", low)?;
        check_fraction("sideband upper edge", high)?;
        if low >= high {
            return Err(ConfigurationError::InvertedBand {
                what: "sideband",
                low,
                high,
            });
        }
        let taps = self.kernel_taps();
        let upper = complex_band(low, high, taps);
        let lower = complex_band(-high, -low, taps);
        self.install(&upper, &lower);
        Ok(())
    }

    /// Vestigial response: `[-opposite, inband]` for the upper sideband and
    /// `[-inband, opposite]` for the lower one.
    pub fn create_asym_filter(&mut self, opposite: f32, inband: f32) -> ConfigResult<()> {
        check_fraction("vestige width", opposite)?;
        check_fraction("in-band edge", inband)?;
        if opposite >= inband {
            return Err(ConfigurationError::InvertedBand {
                what: "vestigial band",
                low: opposite,
                high: inband,
            });
        }
        let taps = self.kernel_taps();
        let upper = complex_band(-opposite, inband, taps);
        let lower = complex_band(-inband, opposite, taps);
        self.install(&upper, &lower);
        Ok(())
    }

    /// Root-raised-cosine matched filter; `symbol_rate` is a fraction of the
    /// sample rate.
    pub fn create_rrc_filter(&mut self, symbol_rate: f32, rolloff: f32) -> ConfigResult<()> {
        if !(rolloff > 0.0 && rolloff <= 1.0) {
            return Err(ConfigurationError::InvalidRolloff(rolloff));
        }
        check_fraction("RRC band edge", symbol_rate * (1.0 + rolloff) / 2.0)?;
        if symbol_rate <= 0.0 {
            return Err(ConfigurationError::CutoffOutOfRange {
                what: "RRC symbol rate",
                value: symbol_rate,
            });
        }
        let taps = self.kernel_taps();
        let mid = (taps - 1) as f32 / 2.0;
        let mut coeffs: Vec<f32> = (0..taps)
            .map(|i| rrc_tap((i as f32 - mid) * symbol_rate, rolloff))
            .collect();
        normalize_dc(&mut coeffs);
        let kernel = real_kernel(&coeffs);
        self.install(&kernel, &kernel);
        Ok(())
    }

    fn push(&mut self, sample: Complex<f32>, upper: bool) -> &[Complex<f32>] {
        self.input[self.input_idx] = sample;
        self.input_idx += 1;
        if self.input_idx < self.block_len {
            return &[];
        }
        self.input_idx = 0;

        self.work.clear();
        self.work.extend_from_slice(&self.input);
        self.work.resize(self.fft_len, Complex::new(0.0, 0.0));
        self.fft.process(&mut self.work);
        let h = if upper { &self.h_upper } else { &self.h_lower };
        for (x, &h) in self.work.iter_mut().zip(h.iter()) {
            *x *= h;
        }
        self.ifft.process(&mut self.work);

        for (idx, out) in self.output.iter_mut().enumerate() {
            *out = self.work[idx] + self.overlap[idx];
        }
        self.overlap.copy_from_slice(&self.work[self.block_len..]);
        &self.output
    }

    pub fn run(&mut self, sample: Complex<f32>) -> &[Complex<f32>] {
        self.push(sample, true)
    }

    pub fn run_ssb(&mut self, sample: Complex<f32>, upper_sideband: bool) -> &[Complex<f32>] {
        self.push(sample, upper_sideband)
    }

    pub fn run_asym(&mut self, sample: Complex<f32>, upper_sideband: bool) -> &[Complex<f32>] {
        self.push(sample, upper_sideband)
    }
}
