// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Slow automatic frequency correction driven by the channel tick.

/// Per-tick observation of the channel handed to [`FrequencyCorrector::tick`].
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub squelch_open: bool,
    pub tracking: bool,
    /// Tracker estimate, `None` when no tracker is configured.
    pub tracker_freq_hz: Option<f64>,
    pub channel_sample_rate: u32,
    pub alpha: f32,
    pub correction_ticks: u32,
}

/// Smoothed frequency error with a decaying correction floor.
///
/// The average follows the tracker only while the squelch is open. Every
/// `correction_ticks` ticks a correction may fire, but only once the
/// magnitude of the previous correction has decayed below
/// `channel_rate / (200 * alpha)` and the average exceeds
/// `channel_rate / 1000`.
#[derive(Debug, Clone, Default)]
pub struct FrequencyCorrector {
    avg_delta_freq: f64,
    last_corr_abs: f64,
    tick_count: u32,
}

impl FrequencyCorrector {
    /// Forget the averaged error and the correction floor.
    pub fn reset(&mut self) {
        self.avg_delta_freq = 0.0;
        self.last_corr_abs = 0.0;
    }

    pub fn avg_delta_freq(&self) -> f64 {
        self.avg_delta_freq
    }

    /// Returns the offset adjustment in Hz when a correction is due.
    pub fn tick(&mut self, input: TickInput) -> Option<f64> {
        let freq_hz = input.tracker_freq_hz?;
        let alpha = input.alpha as f64;

        if input.squelch_open {
            self.avg_delta_freq = alpha * freq_hz + (1.0 - alpha) * self.avg_delta_freq;
        }

        if self.tick_count + 1 < input.correction_ticks.max(1) {
            self.tick_count += 1;
            return None;
        }
        self.tick_count = 0;

        if !(input.tracking && input.squelch_open) {
            return None;
        }

        let rate = input.channel_sample_rate as f64;
        let decay_divider = (200.0 * alpha).floor();
        let decay = if rate < decay_divider || decay_divider <= 0.0 {
            1.0
        } else {
            (rate / decay_divider).floor()
        };
        let trim = (rate / 1000.0).floor();

        if self.last_corr_abs < decay {
            self.last_corr_abs = self.avg_delta_freq.abs();
            (self.last_corr_abs > trim).then_some(self.avg_delta_freq)
        } else {
            self.last_corr_abs -= decay;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(freq_hz: f64) -> TickInput {
        TickInput {
            squelch_open: true,
            tracking: true,
            tracker_freq_hz: Some(freq_hz),
            channel_sample_rate: 48_000,
            alpha: 0.1,
            correction_ticks: 10,
        }
    }

    #[test]
    fn corrections_are_spaced_by_debounce() {
        let mut corrector = FrequencyCorrector::default();
        let fired: Vec<usize> = (0..200)
            .filter(|_| corrector.tick(input(1_000.0)).is_some())
            .collect();

        assert!(!fired.is_empty());
        assert!(fired.len() <= 200 / 10);
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= 10, "corrections at {pair:?}");
        }
    }

    #[test]
    fn first_correction_after_debounce_period() {
        let mut corrector = FrequencyCorrector::default();
        for _ in 0..9 {
            assert_eq!(corrector.tick(input(1_000.0)), None);
        }
        let correction = corrector.tick(input(1_000.0)).unwrap();
        // 1 - 0.9^10 of the way to the target.
        assert!((correction - 651.3).abs() < 0.1, "correction {correction}");
    }

    #[test]
    fn large_correction_is_damped() {
        let mut corrector = FrequencyCorrector::default();
        let mut fired = Vec::new();
        for tick in 0..100 {
            if corrector.tick(input(20_000.0)).is_some() {
                fired.push(tick);
            }
        }
        // |avg| > decay (2400 Hz) keeps the floor high for several periods.
        assert_eq!(fired.first(), Some(&9));
        assert!(fired.windows(2).all(|p| p[1] - p[0] > 10), "{fired:?}");
    }

    #[test]
    fn closed_squelch_freezes_average_and_blocks_correction() {
        let mut corrector = FrequencyCorrector::default();
        let closed = TickInput {
            squelch_open: false,
            ..input(1_000.0)
        };
        for _ in 0..50 {
            assert_eq!(corrector.tick(closed), None);
        }
        assert_eq!(corrector.avg_delta_freq(), 0.0);
    }

    #[test]
    fn tracking_off_still_averages() {
        let mut corrector = FrequencyCorrector::default();
        let passive = TickInput {
            tracking: false,
            ..input(1_000.0)
        };
        for _ in 0..50 {
            assert_eq!(corrector.tick(passive), None);
        }
        assert!((corrector.avg_delta_freq() - 1_000.0).abs() < 10.0);
    }

    #[test]
    fn small_error_below_trim_is_ignored() {
        let mut corrector = FrequencyCorrector::default();
        for _ in 0..100 {
            assert_eq!(corrector.tick(input(30.0)), None);
        }
    }

    #[test]
    fn no_tracker_means_no_feedback() {
        let mut corrector = FrequencyCorrector::default();
        let none = TickInput {
            tracker_freq_hz: None,
            ..input(1_000.0)
        };
        for _ in 0..50 {
            assert_eq!(corrector.tick(none), None);
        }
        assert_eq!(corrector.avg_delta_freq(), 0.0);
    }

    #[test]
    fn reset_clears_memory() {
        let mut corrector = FrequencyCorrector::default();
        for _ in 0..20 {
            corrector.tick(input(1_000.0));
        }
        corrector.reset();
        assert_eq!(corrector.avg_delta_freq(), 0.0);
    }
}
