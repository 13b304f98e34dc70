// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Window length of the power smoother in front of the squelch.
pub const MAGSQ_AVG_WINDOW: usize = 16;

/// Lowest level reported by [`power_db`].
pub const POWER_FLOOR_DB: f64 = -120.0;

/// Fixed-window running mean.
///
/// The divisor is always the window length, so the mean ramps up from zero
/// while the window fills.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: Vec<f64>,
    idx: usize,
    sum: f64,
}

impl MovingAverage {
    pub fn new(len: usize) -> Self {
        Self {
            window: vec![0.0; len.max(1)],
            idx: 0,
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.sum += value - self.window[self.idx];
        self.window[self.idx] = value;
        self.idx = (self.idx + 1) % self.window.len();
    }

    pub fn average(&self) -> f64 {
        (self.sum / self.window.len() as f64).max(0.0)
    }

    pub fn reset(&mut self) {
        self.window.fill(0.0);
        self.idx = 0;
        self.sum = 0.0;
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(MAGSQ_AVG_WINDOW)
    }
}

/// Power levels accumulated since the previous read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MagSqLevels {
    pub avg: f64,
    pub peak: f64,
    pub count: u32,
}

/// Sum/peak accumulator drained by readers.
#[derive(Debug, Clone, Default)]
pub struct MagSqMeter {
    sum: f64,
    peak: f64,
    count: u32,
}

impl MagSqMeter {
    pub fn push(&mut self, magsq: f64) {
        self.sum += magsq;
        self.peak = self.peak.max(magsq);
        self.count = self.count.saturating_add(1);
    }

    /// Return the levels since the last call and start a new period.
    pub fn take(&mut self) -> MagSqLevels {
        let levels = MagSqLevels {
            avg: if self.count > 0 {
                self.sum / self.count as f64
            } else {
                0.0
            },
            peak: self.peak,
            count: self.count,
        };
        *self = Self::default();
        levels
    }
}

pub fn db_to_power(db: f32) -> f64 {
    10f64.powf(db as f64 / 10.0)
}

pub fn power_db(power: f64) -> f64 {
    if power > 0.0 {
        (10.0 * power.log10()).max(POWER_FLOOR_DB)
    } else {
        POWER_FLOOR_DB
    }
}
