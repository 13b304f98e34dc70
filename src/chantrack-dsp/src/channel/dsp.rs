// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Per-channel DSP state: mixer, rate adapter, channel filter, power
//! detector, squelch and carrier trackers.

use std::f64::consts::TAU;

use num_complex::Complex;

use super::config::{ChannelConfig, FilterPlan, TrackerType};
use super::feedback::{FrequencyCorrector, TickInput};
use crate::dsp::level::{MagSqLevels, MagSqMeter, MovingAverage};
use crate::dsp::{FreqLock, Nco, OverlapAddFilter, PhaseLock, RateAdapter, Squelch};
use crate::error::{ConfigResult, ConfigurationError};

/// Full-scale amplitude shared by every level measurement.
pub const FULL_SCALE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterMode {
    Symmetric,
    Sideband { upper: bool },
    Vestigial { upper: bool },
}

struct ChannelFilter {
    engine: OverlapAddFilter,
    mode: FilterMode,
}

impl ChannelFilter {
    fn from_plan(plan: FilterPlan) -> ConfigResult<Option<Self>> {
        let mode = match plan {
            FilterPlan::Ssb { upper, .. } => FilterMode::Sideband { upper },
            FilterPlan::Asym { upper, .. } => FilterMode::Vestigial { upper },
            _ => FilterMode::Symmetric,
        };
        Ok(plan.build()?.map(|engine| Self { engine, mode }))
    }

    fn run(&mut self, sample: Complex<f32>) -> &[Complex<f32>] {
        match self.mode {
            FilterMode::Symmetric => self.engine.run(sample),
            FilterMode::Sideband { upper } => self.engine.run_ssb(sample, upper),
            FilterMode::Vestigial { upper } => self.engine.run_asym(sample, upper),
        }
    }
}

/// Power measurement, squelch and carrier tracking for channel-rate samples.
struct Detector {
    squelch: Squelch,
    squelch_level: f64,
    magsq_avg: MovingAverage,
    meter: MagSqMeter,
    tracker: TrackerType,
    pll: PhaseLock,
    fll: FreqLock,
}

impl Detector {
    fn process(&mut self, sample: Complex<f32>, out: &mut Vec<Complex<f32>>) {
        let re = sample.re / FULL_SCALE;
        let im = sample.im / FULL_SCALE;
        let magsq = (re * re + im * im) as f64;

        self.magsq_avg.push(magsq);
        self.meter.push(magsq);

        if self.squelch.step(self.magsq_avg.average(), self.squelch_level) {
            match self.tracker {
                TrackerType::Pll => self.pll.feed(re, im),
                TrackerType::Fll => self.fll.feed(re, im),
                TrackerType::None => {}
            }
        }

        out.push(sample);
    }
}

/// Sequential state of one channel. Not thread safe by itself; see
/// [`crate::Channel`] for the locked wrapper.
pub struct ChannelDsp {
    config: ChannelConfig,
    input_sample_rate: u32,
    nco: Nco,
    rate: RateAdapter,
    filter: Option<ChannelFilter>,
    detector: Detector,
    corrector: FrequencyCorrector,
    resampled: Vec<Complex<f32>>,
}

impl ChannelDsp {
    pub fn new(input_sample_rate: u32, config: ChannelConfig) -> ConfigResult<Self> {
        config.validate(input_sample_rate)?;

        let rate = RateAdapter::new(
            input_sample_rate,
            config.channel_sample_rate,
            config.rf_bandwidth_hz,
        )?;
        let mut dsp = Self {
            config: config.clone(),
            input_sample_rate,
            nco: Nco::default(),
            rate,
            filter: None,
            detector: Detector {
                squelch: Squelch::default(),
                squelch_level: 0.0,
                magsq_avg: MovingAverage::default(),
                meter: MagSqMeter::default(),
                tracker: config.tracker,
                pll: PhaseLock::default(),
                fll: FreqLock::default(),
            },
            corrector: FrequencyCorrector::default(),
            resampled: Vec::new(),
        };
        dsp.apply_config(config, true)?;
        Ok(dsp)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }

    /// Install `config`, rebuilding only what its changed fields require.
    ///
    /// Every fallible step runs before any state is touched, so on error the
    /// previous configuration is still in effect.
    pub fn apply_config(&mut self, config: ChannelConfig, force: bool) -> ConfigResult<()> {
        config.validate(self.input_sample_rate)?;
        let old = &self.config;

        let rate_changed = force
            || config.channel_sample_rate != old.channel_sample_rate
            || config.rf_bandwidth_hz != old.rf_bandwidth_hz;
        let filter_changed = rate_changed || config.filter != old.filter;
        let offset_changed =
            force || config.input_frequency_offset_hz != old.input_frequency_offset_hz;
        let tracking_toggled = force || config.tracking != old.tracking;
        let tracker_changed = force || config.tracker != old.tracker;
        let pll_changed = force || config.pll != old.pll;
        let fll_changed = force || config.fll != old.fll;

        let rate = if rate_changed {
            Some(RateAdapter::new(
                self.input_sample_rate,
                config.channel_sample_rate,
                config.rf_bandwidth_hz,
            )?)
        } else {
            None
        };
        let filter = if filter_changed {
            Some(ChannelFilter::from_plan(config.filter_plan())?)
        } else {
            None
        };
        let pll = if pll_changed {
            let mut pll = self.detector.pll.clone();
            pll.compute_coefficients(config.pll.bandwidth, config.pll.damping, config.pll.gain)?;
            pll.set_psk_order(config.pll.psk_order)?;
            Some(pll)
        } else {
            None
        };
        let fll = if fll_changed {
            let mut fll = self.detector.fll.clone();
            fll.compute_coefficients(config.fll.bandwidth)?;
            Some(fll)
        } else {
            None
        };

        if offset_changed {
            self.nco.set_freq(
                -(config.input_frequency_offset_hz as f64),
                self.input_sample_rate as f64,
            );
        }
        if let Some(rate) = rate {
            self.rate = rate;
        }
        if let Some(filter) = filter {
            self.filter = filter;
        }
        if let Some(pll) = pll {
            self.detector.pll = pll;
        }
        if let Some(fll) = fll {
            self.detector.fll = fll;
        }
        if rate_changed {
            self.detector.pll.set_sample_rate(config.channel_sample_rate);
            self.detector.fll.set_sample_rate(config.channel_sample_rate);
        }

        self.detector.squelch.set_gate(config.squelch_gate);
        self.detector.squelch_level = config.squelch_level();

        if tracking_toggled {
            self.corrector.reset();
            if config.tracking {
                self.detector.pll.reset();
                self.detector.fll.reset();
            }
        }
        if tracker_changed {
            self.corrector.reset();
            match config.tracker {
                TrackerType::Pll => self.detector.pll.reset(),
                TrackerType::Fll => self.detector.fll.reset(),
                TrackerType::None => {}
            }
        }
        self.detector.tracker = config.tracker;

        tracing::debug!(
            "channel config applied: offset={} Hz, channel_rate={} Hz, rf_bw={} Hz, tracker={:?}, tracking={}, force={}",
            config.input_frequency_offset_hz,
            config.channel_sample_rate,
            config.rf_bandwidth_hz,
            config.tracker,
            config.tracking,
            force
        );
        self.config = config;
        Ok(())
    }

    /// Change the upstream rate; the mixer and rate adapter follow it.
    pub fn set_input_sample_rate(&mut self, sample_rate: u32) -> ConfigResult<()> {
        if sample_rate == 0 {
            return Err(ConfigurationError::ZeroSampleRate("input"));
        }
        self.config.validate(sample_rate)?;
        let rate = RateAdapter::new(
            sample_rate,
            self.config.channel_sample_rate,
            self.config.rf_bandwidth_hz,
        )?;

        self.rate = rate;
        self.input_sample_rate = sample_rate;
        self.nco.set_freq(
            -(self.config.input_frequency_offset_hz as f64),
            sample_rate as f64,
        );
        tracing::debug!("channel input sample rate set to {} Hz", sample_rate);
        Ok(())
    }

    /// Per-session reset performed on start.
    pub(crate) fn reset_session(&mut self) {
        self.detector.squelch.reset();
    }

    /// Run one input block, appending channel-rate samples to `out` in order.
    pub fn process_block(&mut self, block: &[Complex<f32>], out: &mut Vec<Complex<f32>>) {
        let mut resampled = std::mem::take(&mut self.resampled);
        resampled.clear();
        for &sample in block {
            let mixed = self.nco.mix(sample);
            self.rate.push(mixed, |s| resampled.push(s));
        }

        match self.filter.as_mut() {
            Some(filter) => {
                for &sample in &resampled {
                    for &filtered in filter.run(sample) {
                        self.detector.process(filtered, out);
                    }
                }
            }
            None => {
                for &sample in &resampled {
                    self.detector.process(sample, out);
                }
            }
        }
        self.resampled = resampled;
    }

    /// Advance the correction loop one tick; returns the new offset when a
    /// correction was applied.
    pub fn tick(&mut self) -> ConfigResult<Option<i64>> {
        let correction = self.corrector.tick(TickInput {
            squelch_open: self.squelch_open(),
            tracking: self.config.tracking,
            tracker_freq_hz: self.tracker_frequency_hz(),
            channel_sample_rate: self.config.channel_sample_rate,
            alpha: self.config.alpha_ema,
            correction_ticks: self.config.correction_ticks,
        });
        let Some(delta_hz) = correction else {
            return Ok(None);
        };

        let mut config = self.config.clone();
        config.input_frequency_offset_hz += delta_hz.round() as i64;
        let offset = config.input_frequency_offset_hz;
        self.apply_config(config, false)?;
        tracing::info!(
            "frequency correction {:+.1} Hz applied, offset now {} Hz",
            delta_hz,
            offset
        );
        Ok(Some(offset))
    }

    pub fn squelch_open(&self) -> bool {
        self.detector.squelch.is_open()
    }

    pub fn take_mag_sq_levels(&mut self) -> MagSqLevels {
        self.detector.meter.take()
    }

    /// Lock state of the PLL; other trackers never report lock.
    pub fn tracker_locked(&self) -> bool {
        self.config.tracker == TrackerType::Pll && self.detector.pll.locked()
    }

    /// Tracker estimate in Hz at the channel rate.
    pub fn tracker_frequency_hz(&self) -> Option<f64> {
        let rad_per_sample = match self.config.tracker {
            TrackerType::Pll => self.detector.pll.freq(),
            TrackerType::Fll => self.detector.fll.freq(),
            TrackerType::None => return None,
        };
        Some(rad_per_sample as f64 * self.config.channel_sample_rate as f64 / TAU)
    }

    pub fn avg_delta_freq_hz(&self) -> f64 {
        self.corrector.avg_delta_freq()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::config::FilterShape;

    fn tone(freq_hz: f64, rate: f64, amplitude: f32, len: usize) -> Vec<Complex<f32>> {
        (0..len)
            .map(|n| {
                let phase = (TAU * freq_hz * n as f64 / rate).rem_euclid(TAU);
                Complex::from_polar(amplitude, phase as f32)
            })
            .collect()
    }

    fn open_config() -> ChannelConfig {
        ChannelConfig {
            squelch_db: -20.0,
            squelch_gate: 10,
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn passthrough_at_unit_ratio() {
        let mut dsp = ChannelDsp::new(48_000, open_config()).unwrap();
        let input = tone(0.0, 48_000.0, 1.0, 48_000);
        let mut out = Vec::new();
        dsp.process_block(&input, &mut out);
        assert_eq!(out.len(), 48_000);
        assert!(dsp.squelch_open());
    }

    #[test]
    fn offset_moves_signal_to_dc() {
        let config = ChannelConfig {
            input_frequency_offset_hz: 5_000,
            ..open_config()
        };
        let mut dsp = ChannelDsp::new(48_000, config).unwrap();
        let input = tone(5_000.0, 48_000.0, 1.0, 1_000);
        let mut out = Vec::new();
        dsp.process_block(&input, &mut out);
        for s in &out {
            assert!((s - Complex::new(1.0, 0.0)).norm() < 1e-3, "{s}");
        }
    }

    #[test]
    fn fll_estimates_residual_offset() {
        let config = ChannelConfig {
            input_frequency_offset_hz: 10_000,
            ..open_config()
        };
        let mut dsp = ChannelDsp::new(48_000, config).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(10_250.0, 48_000.0, 1.0, 20_000), &mut out);
        let estimate = dsp.tracker_frequency_hz().unwrap();
        assert!((estimate - 250.0).abs() < 2.0, "estimate {estimate}");
    }

    #[test]
    fn weak_signal_keeps_squelch_closed_and_tracker_idle() {
        let mut dsp = ChannelDsp::new(48_000, open_config()).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(300.0, 48_000.0, 0.01, 10_000), &mut out);
        assert!(!dsp.squelch_open());
        assert_eq!(dsp.tracker_frequency_hz(), Some(0.0));
        let levels = dsp.take_mag_sq_levels();
        assert_eq!(levels.count, 10_000);
        assert!((levels.avg - 1e-4).abs() < 1e-6);
    }

    #[test]
    fn rejected_config_leaves_previous_in_place() {
        let mut dsp = ChannelDsp::new(48_000, open_config()).unwrap();
        let bad = ChannelConfig {
            channel_sample_rate: 0,
            input_frequency_offset_hz: 777,
            ..open_config()
        };
        assert!(dsp.apply_config(bad, false).is_err());
        assert_eq!(dsp.config(), &open_config());

        let mut out = Vec::new();
        dsp.process_block(&tone(0.0, 48_000.0, 1.0, 100), &mut out);
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn rate_change_rebuilds_adapter() {
        let mut dsp = ChannelDsp::new(48_000, open_config()).unwrap();
        let config = ChannelConfig {
            channel_sample_rate: 12_000,
            ..open_config()
        };
        dsp.apply_config(config, false).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(0.0, 48_000.0, 1.0, 4_800), &mut out);
        assert!((out.len() as i64 - 1_200).abs() <= 1, "{}", out.len());
    }

    #[test]
    fn input_rate_change_follows_upstream() {
        let mut dsp = ChannelDsp::new(48_000, open_config()).unwrap();
        dsp.set_input_sample_rate(96_000).unwrap();
        assert_eq!(dsp.input_sample_rate(), 96_000);
        let mut out = Vec::new();
        dsp.process_block(&tone(0.0, 96_000.0, 1.0, 9_600), &mut out);
        assert!((out.len() as i64 - 4_800).abs() <= 1, "{}", out.len());
        assert!(dsp.set_input_sample_rate(0).is_err());
        assert_eq!(dsp.input_sample_rate(), 96_000);
    }

    #[test]
    fn filtered_channel_emits_in_bursts() {
        let config = ChannelConfig {
            filter: FilterShape::BandPass { low_cut_hz: 0.0 },
            ..open_config()
        };
        let mut dsp = ChannelDsp::new(48_000, config).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(0.0, 48_000.0, 1.0, 1_000), &mut out);
        assert!(out.is_empty());
        dsp.process_block(&tone(0.0, 48_000.0, 1.0, 24), &mut out);
        assert_eq!(out.len(), 1_024);
    }

    #[test]
    fn no_tracker_reports_nothing() {
        let config = ChannelConfig {
            tracker: TrackerType::None,
            tracking: true,
            ..open_config()
        };
        let mut dsp = ChannelDsp::new(48_000, config).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(400.0, 48_000.0, 1.0, 4_800), &mut out);
        assert_eq!(dsp.tracker_frequency_hz(), None);
        for _ in 0..50 {
            assert_eq!(dsp.tick().unwrap(), None);
        }
        assert_eq!(dsp.config().input_frequency_offset_hz, 0);
    }

    #[test]
    fn tick_applies_correction_to_offset() {
        let config = ChannelConfig {
            tracking: true,
            ..open_config()
        };
        let mut dsp = ChannelDsp::new(48_000, config).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(1_000.0, 48_000.0, 1.0, 20_000), &mut out);

        let mut applied = None;
        for _ in 0..10 {
            if let Some(offset) = dsp.tick().unwrap() {
                applied = Some(offset);
            }
        }
        let offset = applied.unwrap();
        assert!((600..=700).contains(&offset), "offset {offset}");
        assert_eq!(dsp.config().input_frequency_offset_hz, offset);
    }

    #[test]
    fn enabling_tracking_resets_tracker() {
        let mut dsp = ChannelDsp::new(48_000, open_config()).unwrap();
        let mut out = Vec::new();
        dsp.process_block(&tone(1_000.0, 48_000.0, 1.0, 5_000), &mut out);
        assert!(dsp.tracker_frequency_hz().unwrap() > 900.0);

        let config = ChannelConfig {
            tracking: true,
            ..open_config()
        };
        dsp.apply_config(config, false).unwrap();
        assert_eq!(dsp.tracker_frequency_hz(), Some(0.0));
        assert_eq!(dsp.avg_delta_freq_hz(), 0.0);
    }
}
