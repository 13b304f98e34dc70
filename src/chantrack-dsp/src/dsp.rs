// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Leaf signal-processing blocks composed by [`crate::channel`].

pub mod filter;
pub mod fll;
pub mod level;
pub mod nco;
pub mod pll;
pub mod resampler;
pub mod squelch;

pub use filter::OverlapAddFilter;
pub use fll::FreqLock;
pub use level::{MagSqLevels, MagSqMeter, MovingAverage};
pub use nco::Nco;
pub use pll::PhaseLock;
pub use resampler::{RateAdapter, Resampler};
pub use squelch::Squelch;

use std::f32::consts::{PI, TAU};

/// Wrap an angle into `(-PI, PI]`.
#[inline]
pub(crate) fn wrap_phase(phase: f32) -> f32 {
    let wrapped = (phase + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}
