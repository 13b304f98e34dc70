// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Channel DSP: mixer, polyphase resampler, overlap-add filter, squelch and
//! PLL/FLL carrier trackers with slow automatic frequency correction.

pub mod channel;
pub mod driver;
pub mod dsp;
pub mod error;
pub mod sink;
pub mod source;

pub use channel::{
    Channel, ChannelConfig, ChannelMessage, ChannelReport, FilterShape, TrackerType,
};
pub use driver::{run_tick_loop, spawn_iq_reader};
pub use error::{ConfigResult, ConfigurationError};
pub use sink::{NullSink, SampleSink};
pub use source::{IqSource, MockIqSource, ToneIqSource};
