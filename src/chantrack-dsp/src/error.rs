// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// A configuration rejected before it reached any DSP state.
///
/// The previously applied configuration stays authoritative whenever one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("{0} sample rate must be > 0")]
    ZeroSampleRate(&'static str),

    #[error("RF bandwidth must be a positive finite value (got {0} Hz)")]
    InvalidBandwidth(f32),

    #[error("{what} must be within [0, 0.5) of the sample rate (got {value})")]
    CutoffOutOfRange { what: &'static str, value: f32 },

    #[error("{what}: lower edge {low} must be below upper edge {high}")]
    InvertedBand {
        what: &'static str,
        low: f32,
        high: f32,
    },

    #[error("loop parameter {name} must be a positive finite value (got {value})")]
    InvalidLoopParameter { name: &'static str, value: f32 },

    #[error("PSK order must be a power of two no larger than 32 (got {0})")]
    InvalidPskOrder(u32),

    #[error("EMA smoothing factor must be within (0, 1] (got {0})")]
    InvalidAlpha(f32),

    #[error("RRC roll-off must be within (0, 1] (got {0})")]
    InvalidRolloff(f32),

    #[error("frequency correction debounce must be at least one tick")]
    ZeroCorrectionTicks,

    #[error("squelch level must be finite (got {0} dB)")]
    InvalidSquelch(f32),
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Check a frequency given as a fraction of the sample rate.
pub(crate) fn check_fraction(what: &'static str, value: f32) -> ConfigResult<()> {
    if value.is_finite() && (0.0..0.5).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::CutoffOutOfRange { what, value })
    }
}

pub(crate) fn check_positive(name: &'static str, value: f32) -> ConfigResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidLoopParameter { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_bounds() {
        assert!(check_fraction("cutoff", 0.0).is_ok());
        assert!(check_fraction("cutoff", 0.499).is_ok());
        assert!(check_fraction("cutoff", 0.5).is_err());
        assert!(check_fraction("cutoff", -0.01).is_err());
        assert!(check_fraction("cutoff", f32::NAN).is_err());
    }

    #[test]
    fn error_messages_name_the_field() {
        let err = check_positive("damping", 0.0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "loop parameter damping must be a positive finite value (got 0)"
        );
    }
}
