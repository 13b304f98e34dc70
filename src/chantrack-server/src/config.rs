// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for chantrack-server.
//!
//! Config is loaded from the `[chantrack-server]` section of `chantrack.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./chantrack.toml`
//! 3. `~/.config/chantrack/chantrack.toml`
//! 4. `/etc/chantrack/chantrack.toml`

use serde::{Deserialize, Serialize};

use chantrack_app::ConfigFile;
use chantrack_dsp::channel::{ChannelConfig, FilterShape, TrackerType};

/// Top-level server configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    /// Sample source feeding the channel
    pub source: SourceConfig,
    /// Channel pipeline settings
    pub channel: ChannelConfig,
    /// Frequency-correction tick
    pub tick: TickConfig,
    /// Periodic status report
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Complex tone at `tone_offset_hz`
    Tone,
    /// All-zero samples
    Silence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Input sample rate (Hz)
    pub sample_rate: u32,
    /// Tone offset from the input centre (Hz)
    pub tone_offset_hz: f64,
    /// Tone amplitude relative to full scale
    pub amplitude: f32,
    /// Samples per block handed to the channel
    pub block_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Tone,
            sample_rate: 48_000,
            tone_offset_hz: 1_000.0,
            amplitude: 0.5,
            block_size: chantrack_dsp::driver::IQ_BLOCK_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    pub interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { interval_ms: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1_000,
        }
    }
}

/// Bounds applied to a user-supplied EMA factor.
pub const ALPHA_EMA_RANGE: (f32, f32) = (0.01, 1.0);

pub fn clamp_alpha_ema(alpha: f32) -> f32 {
    alpha.clamp(ALPHA_EMA_RANGE.0, ALPHA_EMA_RANGE.1)
}

impl ServerConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.source.sample_rate == 0 {
            return Err("[source].sample_rate must be > 0".to_string());
        }
        if self.source.block_size == 0 {
            return Err("[source].block_size must be > 0".to_string());
        }
        if !(self.source.amplitude.is_finite() && self.source.amplitude >= 0.0) {
            return Err("[source].amplitude must be a finite value >= 0".to_string());
        }
        if !self.source.tone_offset_hz.is_finite() {
            return Err("[source].tone_offset_hz must be finite".to_string());
        }
        if self.tick.interval_ms == 0 {
            return Err("[tick].interval_ms must be > 0".to_string());
        }
        if self.report.enabled && self.report.interval_ms == 0 {
            return Err("[report].interval_ms must be > 0 when reporting is enabled".to_string());
        }

        self.channel
            .validate(self.source.sample_rate)
            .map_err(|e| format!("[channel] {}", e))
    }

    /// Generate an example configuration as a TOML string.
    pub fn example_toml() -> String {
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            source: SourceConfig {
                kind: SourceKind::Tone,
                sample_rate: 200_000,
                tone_offset_hz: 26_000.0,
                amplitude: 0.5,
                block_size: 4_096,
            },
            channel: ChannelConfig {
                input_frequency_offset_hz: 25_000,
                channel_sample_rate: 50_000,
                rf_bandwidth_hz: 10_000.0,
                tracking: true,
                tracker: TrackerType::Fll,
                filter: FilterShape::BandPass { low_cut_hz: 0.0 },
                ..ChannelConfig::default()
            },
            tick: TickConfig::default(),
            report: ReportConfig::default(),
        };

        let mut root = toml::Table::new();
        match toml::Value::try_from(&example) {
            Ok(section) => {
                root.insert(Self::section_key().to_string(), section);
            }
            Err(_) => return String::new(),
        }
        toml::to_string_pretty(&root).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level.trim().to_ascii_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "chantrack-server"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_section(text: &str) -> ServerConfig {
        let mut root: toml::Table = toml::from_str(text).unwrap();
        root.remove("chantrack-server").unwrap().try_into().unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.source.kind, SourceKind::Tone);
        assert_eq!(config.source.sample_rate, 48_000);
        assert_eq!(config.tick.interval_ms, 50);
        assert!(config.report.enabled);
        assert_eq!(config.channel, ChannelConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = parse_section(
            r#"
[chantrack-server.source]
kind = "silence"
sample_rate = 96000

[chantrack-server.channel]
input_frequency_offset_hz = 12000
tracker = "pll"
"#,
        );
        assert_eq!(config.source.kind, SourceKind::Silence);
        assert_eq!(config.source.sample_rate, 96_000);
        assert_eq!(config.source.block_size, 4_096);
        assert_eq!(config.channel.input_frequency_offset_hz, 12_000);
        assert_eq!(config.channel.tracker, TrackerType::Pll);
        assert_eq!(config.channel.rf_bandwidth_hz, 6_000.0);
    }

    #[test]
    fn test_example_toml_parses() {
        let example = ServerConfig::example_toml();
        let config = parse_section(&example);
        assert!(config.validate().is_ok());
        assert_eq!(config.channel.channel_sample_rate, 50_000);
        assert_eq!(
            config.channel.filter,
            FilterShape::BandPass { low_cut_hz: 0.0 }
        );
    }

    #[test]
    fn test_validate_rejects_zero_tick_interval() {
        let mut config = ServerConfig::default();
        config.tick.interval_ms = 0;
        assert_eq!(
            config.validate(),
            Err("[tick].interval_ms must be > 0".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = ServerConfig::default();
        config.general.log_level = Some("chatty".to_string());
        assert!(config.validate().unwrap_err().starts_with("[general].log_level"));
    }

    #[test]
    fn test_log_level_is_case_insensitive() {
        for level in ["WARN", "Debug", " info "] {
            let mut config = ServerConfig::default();
            config.general.log_level = Some(level.to_string());
            assert!(config.validate().is_ok(), "{level}");
        }
    }

    #[test]
    fn test_validate_reports_channel_errors() {
        let mut config = ServerConfig::default();
        config.channel.channel_sample_rate = 0;
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("[channel]"), "{err}");
    }

    #[test]
    fn test_validate_checks_channel_against_source_rate() {
        let mut config = ServerConfig::default();
        config.source.sample_rate = 0;
        assert_eq!(
            config.validate(),
            Err("[source].sample_rate must be > 0".to_string())
        );
    }

    #[test]
    fn test_alpha_is_clamped() {
        assert_eq!(clamp_alpha_ema(0.0), 0.01);
        assert_eq!(clamp_alpha_ema(5.0), 1.0);
        assert_eq!(clamp_alpha_ema(0.3), 0.3);
    }
}
