// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

/// Counter-debounced power gate.
///
/// The counter moves one step per sample within `[0, 2 * gate]` and the gate
/// is open while it sits at or above `gate`. A zero gate follows the power
/// comparison directly.
#[derive(Debug, Clone, Default)]
pub struct Squelch {
    gate: u32,
    count: u32,
    open: bool,
}

impl Squelch {
    pub fn new(gate: u32) -> Self {
        Self {
            gate,
            ..Self::default()
        }
    }

    pub fn gate(&self) -> u32 {
        self.gate
    }

    /// Change the debounce length, keeping the counter inside its new range.
    pub fn set_gate(&mut self, gate: u32) {
        self.gate = gate;
        self.count = self.count.min(gate.saturating_mul(2));
        if gate > 0 {
            self.open = self.count >= gate;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Return to the initial closed state.
    pub fn reset(&mut self) {
        self.count = 0;
        self.open = false;
    }

    /// Advance one sample; returns whether the gate is open afterwards.
    pub fn step(&mut self, power: f64, level: f64) -> bool {
        let above = power >= level;
        if self.gate == 0 {
            self.open = above;
            return self.open;
        }

        if above {
            if self.count < self.gate.saturating_mul(2) {
                self.count += 1;
            }
        } else if self.count > 0 {
            self.count -= 1;
        }
        self.open = self.count >= self.gate;
        self.open
    }
}
