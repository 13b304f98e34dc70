// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::{Deserialize, Serialize};

use crate::dsp::filter::{OverlapAddFilter, DEFAULT_FFT_LEN};
use crate::dsp::fll::DEFAULT_FLL_BANDWIDTH;
use crate::dsp::pll::{
    is_valid_psk_order, DEFAULT_PLL_BANDWIDTH, DEFAULT_PLL_DAMPING, DEFAULT_PLL_GAIN,
};
use crate::error::{check_fraction, check_positive, ConfigResult, ConfigurationError};

/// Carrier tracker fed while the squelch is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerType {
    None,
    Pll,
    #[default]
    Fll,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PllLoopConfig {
    /// Natural frequency in radians per sample.
    pub bandwidth: f32,
    pub damping: f32,
    pub gain: f32,
    /// 1 for a plain carrier, M for M-PSK.
    pub psk_order: u32,
}

impl Default for PllLoopConfig {
    fn default() -> Self {
        Self {
            bandwidth: DEFAULT_PLL_BANDWIDTH,
            damping: DEFAULT_PLL_DAMPING,
            gain: DEFAULT_PLL_GAIN,
            psk_order: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FllLoopConfig {
    /// Per-sample correction factor in `(0, 1]`.
    pub bandwidth: f32,
}

impl Default for FllLoopConfig {
    fn default() -> Self {
        Self {
            bandwidth: DEFAULT_FLL_BANDWIDTH,
        }
    }
}

/// Channel filter response, edges relative to the channel centre.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterShape {
    #[default]
    None,
    /// `low_cut_hz <= |f| <= rf_bandwidth / 2`.
    BandPass { low_cut_hz: f32 },
    /// One sideband from `low_cut_hz` to `rf_bandwidth`.
    Ssb { upper: bool, low_cut_hz: f32 },
    /// One sideband up to `rf_bandwidth` plus `vestige_hz` of the other.
    Vestigial { upper: bool, vestige_hz: f32 },
    /// Root-raised-cosine matched filter at `rf_bandwidth` symbols/s.
    Rrc { rolloff: f32 },
}

/// Everything that shapes one channel.
///
/// Applied as a whole; see [`crate::Channel::apply_config`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel centre relative to the input centre frequency.
    pub input_frequency_offset_hz: i64,
    pub channel_sample_rate: u32,
    pub rf_bandwidth_hz: f32,
    pub squelch_db: f32,
    /// Squelch debounce length in channel samples; 0 disables hysteresis.
    pub squelch_gate: u32,
    /// Feed the tracker estimate back into `input_frequency_offset_hz`.
    pub tracking: bool,
    pub tracker: TrackerType,
    pub pll: PllLoopConfig,
    pub fll: FllLoopConfig,
    /// Smoothing factor of the averaged frequency error.
    pub alpha_ema: f32,
    /// Ticks between correction attempts.
    pub correction_ticks: u32,
    pub filter: FilterShape,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            input_frequency_offset_hz: 0,
            channel_sample_rate: 48_000,
            rf_bandwidth_hz: 6_000.0,
            squelch_db: -40.0,
            squelch_gate: 480,
            tracking: false,
            tracker: TrackerType::Fll,
            pll: PllLoopConfig::default(),
            fll: FllLoopConfig::default(),
            alpha_ema: 0.1,
            correction_ticks: 10,
            filter: FilterShape::None,
        }
    }
}

/// Filter edges normalised to the channel rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum FilterPlan {
    None,
    BandPass { low: f32, high: f32 },
    Ssb { low: f32, high: f32, upper: bool },
    Asym { opposite: f32, inband: f32, upper: bool },
    Rrc { symbol_rate: f32, rolloff: f32 },
}

impl FilterPlan {
    fn check(&self) -> ConfigResult<()> {
        let inverted = |what, low: f32, high: f32| {
            if low < high {
                Ok(())
            } else {
                Err(ConfigurationError::InvertedBand { what, low, high })
            }
        };
        match *self {
            Self::None => Ok(()),
            Self::BandPass { low, high } => {
                check_fraction("band-pass lower edge", low)?;
                check_fraction("band-pass upper edge", high)?;
                inverted("band-pass", low, high)
            }
            Self::Ssb { low, high, .. } => {
                check_fraction("sideband lower edge", low)?;
                check_fraction("sideband upper edge", high)?;
                inverted("sideband", low, high)
            }
            Self::Asym {
                opposite, inband, ..
            } => {
                check_fraction("vestige width", opposite)?;
                check_fraction("in-band edge", inband)?;
                inverted("vestigial band", opposite, inband)
            }
            Self::Rrc {
                symbol_rate,
                rolloff,
            } => {
                if !(rolloff > 0.0 && rolloff <= 1.0) {
                    return Err(ConfigurationError::InvalidRolloff(rolloff));
                }
                check_fraction("RRC band edge", symbol_rate * (1.0 + rolloff) / 2.0)
            }
        }
    }

    /// Build the engine, `None` when no filtering is configured.
    pub(crate) fn build(&self) -> ConfigResult<Option<OverlapAddFilter>> {
        if *self == Self::None {
            return Ok(None);
        }
        let mut filter = OverlapAddFilter::new(DEFAULT_FFT_LEN);
        match *self {
            Self::None => {}
            Self::BandPass { low, high } => filter.create_filter(low, high)?,
            Self::Ssb { low, high, .. } => filter.create_ssb_filter(low, high)?,
            Self::Asym {
                opposite, inband, ..
            } => filter.create_asym_filter(opposite, inband)?,
            Self::Rrc {
                symbol_rate,
                rolloff,
            } => filter.create_rrc_filter(symbol_rate, rolloff)?,
        }
        Ok(Some(filter))
    }
}

impl ChannelConfig {
    pub fn squelch_level(&self) -> f64 {
        crate::dsp::level::db_to_power(self.squelch_db)
    }

    pub(crate) fn filter_plan(&self) -> FilterPlan {
        let rate = self.channel_sample_rate.max(1) as f32;
        let bw = self.rf_bandwidth_hz;
        match self.filter {
            FilterShape::None => FilterPlan::None,
            FilterShape::BandPass { low_cut_hz } => FilterPlan::BandPass {
                low: low_cut_hz / rate,
                high: bw / 2.0 / rate,
            },
            FilterShape::Ssb { upper, low_cut_hz } => FilterPlan::Ssb {
                low: low_cut_hz / rate,
                high: bw / rate,
                upper,
            },
            FilterShape::Vestigial { upper, vestige_hz } => FilterPlan::Asym {
                opposite: vestige_hz / rate,
                inband: bw / rate,
                upper,
            },
            FilterShape::Rrc { rolloff } => FilterPlan::Rrc {
                symbol_rate: bw / rate,
                rolloff,
            },
        }
    }

    /// Check every field against `input_sample_rate` without touching DSP
    /// state.
    pub fn validate(&self, input_sample_rate: u32) -> ConfigResult<()> {
        if input_sample_rate == 0 {
            return Err(ConfigurationError::ZeroSampleRate("input"));
        }
        if self.channel_sample_rate == 0 {
            return Err(ConfigurationError::ZeroSampleRate("channel"));
        }
        let bw = self.rf_bandwidth_hz;
        if !(bw.is_finite() && bw > 0.0 && bw <= self.channel_sample_rate as f32) {
            return Err(ConfigurationError::InvalidBandwidth(bw));
        }
        if !self.squelch_db.is_finite() {
            return Err(ConfigurationError::InvalidSquelch(self.squelch_db));
        }
        if !(self.alpha_ema > 0.0 && self.alpha_ema <= 1.0) {
            return Err(ConfigurationError::InvalidAlpha(self.alpha_ema));
        }
        if self.correction_ticks == 0 {
            return Err(ConfigurationError::ZeroCorrectionTicks);
        }

        check_positive("bandwidth", self.pll.bandwidth)?;
        check_positive("damping", self.pll.damping)?;
        check_positive("gain", self.pll.gain)?;
        if !is_valid_psk_order(self.pll.psk_order) {
            return Err(ConfigurationError::InvalidPskOrder(self.pll.psk_order));
        }
        check_positive("bandwidth", self.fll.bandwidth)?;
        if self.fll.bandwidth > 1.0 {
            return Err(ConfigurationError::InvalidLoopParameter {
                name: "bandwidth",
                value: self.fll.bandwidth,
            });
        }

        self.filter_plan().check()
    }
}
