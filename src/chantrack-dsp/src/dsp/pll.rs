// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Second-order complex phase-locked loop with M-PSK phase detector.

use num_complex::Complex;

use super::wrap_phase;
use crate::error::{check_positive, ConfigResult, ConfigurationError};

pub const DEFAULT_PLL_BANDWIDTH: f32 = 0.002;
pub const DEFAULT_PLL_DAMPING: f32 = 0.5;
pub const DEFAULT_PLL_GAIN: f32 = 10.0;

const MAX_PSK_ORDER: u32 = 32;
/// Phase error below which a sample counts towards lock.
const LOCK_THRESHOLD_RAD: f32 = 0.1;
const FREQ_SMOOTHING: f32 = 0.01;

pub fn is_valid_psk_order(order: u32) -> bool {
    order.is_power_of_two() && order <= MAX_PSK_ORDER
}

/// Phase-locked loop tracking a (possibly PSK-modulated) carrier.
///
/// The loop filter is a proportional-integral section obtained by bilinear
/// transform of `F(s) = (1 + t2 s) / (t1 s)` with `t1 = K / wn^2` and
/// `t2 = 2 zeta / wn`; its output drives the local phase accumulator.
/// All frequencies are in radians per sample.
#[derive(Debug, Clone)]
pub struct PhaseLock {
    gain: f32,
    b0: f32,
    b1: f32,
    psk_order: u32,
    sample_rate: u32,
    lock_window: u32,

    phi_hat: f32,
    control: f32,
    prev_error: f32,
    delta_phi: f32,
    freq: f32,
    lock_count: u32,
    locked: bool,
}

impl Default for PhaseLock {
    fn default() -> Self {
        let mut pll = Self {
            gain: 0.0,
            b0: 0.0,
            b1: 0.0,
            psk_order: 1,
            sample_rate: 0,
            lock_window: 0,
            phi_hat: 0.0,
            control: 0.0,
            prev_error: 0.0,
            delta_phi: 0.0,
            freq: 0.0,
            lock_count: 0,
            locked: false,
        };
        pll.set_sample_rate(48_000);
        // Defaults are valid by construction.
        let _ = pll.compute_coefficients(
            DEFAULT_PLL_BANDWIDTH,
            DEFAULT_PLL_DAMPING,
            DEFAULT_PLL_GAIN,
        );
        pll
    }
}

impl PhaseLock {
    pub fn compute_coefficients(&mut self, wn: f32, zeta: f32, gain: f32) -> ConfigResult<()> {
        check_positive("bandwidth", wn)?;
        check_positive("damping", zeta)?;
        check_positive("gain", gain)?;

        let t1 = gain / (wn * wn);
        let t2 = 2.0 * zeta / wn;
        self.gain = gain;
        self.b0 = (1.0 + 2.0 * t2) / (2.0 * t1);
        self.b1 = (1.0 - 2.0 * t2) / (2.0 * t1);
        Ok(())
    }

    /// Sets the lock detector window to 10 ms worth of samples.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.lock_window = (sample_rate / 100).max(16);
        self.lock_count = self.lock_count.min(2 * self.lock_window);
    }

    /// Accepts powers of two up to 32; anything else leaves the order as is.
    pub fn set_psk_order(&mut self, order: u32) -> ConfigResult<()> {
        if !is_valid_psk_order(order) {
            return Err(ConfigurationError::InvalidPskOrder(order));
        }
        self.psk_order = order;
        Ok(())
    }

    pub fn psk_order(&self) -> u32 {
        self.psk_order
    }

    pub fn reset(&mut self) {
        self.phi_hat = 0.0;
        self.control = 0.0;
        self.prev_error = 0.0;
        self.delta_phi = 0.0;
        self.freq = 0.0;
        self.lock_count = 0;
        self.locked = false;
    }

    pub fn feed(&mut self, re: f32, im: f32) {
        let x = Complex::new(re, im);
        let reference = Complex::from_polar(1.0, self.phi_hat);
        let order = self.psk_order as f32;
        let error = wrap_phase(order * (x * reference.conj()).arg()) / order;

        self.control += self.gain * (self.b0 * error + self.b1 * self.prev_error);
        self.prev_error = error;
        self.delta_phi = error;
        self.phi_hat = wrap_phase(self.phi_hat + self.control);
        self.freq += FREQ_SMOOTHING * (self.control - self.freq);

        let limit = 2 * self.lock_window;
        if error.abs() < LOCK_THRESHOLD_RAD {
            self.lock_count = (self.lock_count + 1).min(limit);
        } else {
            self.lock_count = self.lock_count.saturating_sub(1);
        }
        self.locked = self.lock_count >= self.lock_window;
    }

    pub fn locked(&self) -> bool {
        self.locked
    }

    /// Smoothed loop frequency in radians per sample.
    pub fn freq(&self) -> f32 {
        self.freq
    }

    /// Phase detector output of the last sample.
    pub fn delta_phi(&self) -> f32 {
        self.delta_phi
    }

    pub fn phi_hat(&self) -> f32 {
        self.phi_hat
    }
}
