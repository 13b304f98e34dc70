// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Thread-safe channel: one [`ChannelDsp`] behind a mutex shared by the
//! sample feed, the control path and the periodic tick.

pub mod config;
pub mod dsp;
pub mod feedback;
pub mod message;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::dsp::level::{power_db, MagSqLevels};
use crate::error::ConfigResult;
use crate::sink::SampleSink;

pub use config::{ChannelConfig, FilterShape, FllLoopConfig, PllLoopConfig, TrackerType};
pub use dsp::ChannelDsp;
pub use feedback::FrequencyCorrector;
pub use message::ChannelMessage;

/// Snapshot of a channel for status consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelReport {
    pub running: bool,
    /// Mean power since the previous report.
    pub power_db: f64,
    pub peak_db: f64,
    pub sample_count: u32,
    pub squelch_open: bool,
    pub input_sample_rate: u32,
    pub channel_sample_rate: u32,
    pub input_frequency_offset_hz: i64,
    pub tracker: TrackerType,
    pub tracking: bool,
    pub tracker_locked: bool,
    pub tracker_frequency_hz: Option<f64>,
    pub avg_delta_freq_hz: f64,
}

struct ChannelState {
    dsp: ChannelDsp,
    sink: Box<dyn SampleSink>,
    out: Vec<Complex<f32>>,
}

/// A running channel pipeline.
///
/// `feed`, `apply_config` and `tick` all take the same lock, so an output
/// block is always computed under a single configuration.
pub struct Channel {
    state: Mutex<ChannelState>,
    running: AtomicBool,
}

impl Channel {
    /// Build a stopped channel; call [`Channel::start`] before feeding.
    pub fn new(
        input_sample_rate: u32,
        config: ChannelConfig,
        sink: Box<dyn SampleSink>,
    ) -> ConfigResult<Self> {
        let dsp = ChannelDsp::new(input_sample_rate, config)?;
        Ok(Self {
            state: Mutex::new(ChannelState {
                dsp,
                sink,
                out: Vec::new(),
            }),
            running: AtomicBool::new(false),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("channel DSP mutex poisoned: {}", poisoned);
                poisoned.into_inner()
            }
        }
    }

    /// Reset the squelch and force-apply the current configuration.
    pub fn start(&self) {
        {
            let mut state = self.lock();
            state.dsp.reset_session();
            let config = state.dsp.config().clone();
            if let Err(e) = state.dsp.apply_config(config, true) {
                tracing::warn!("channel restart kept previous state: {}", e);
            }
        }
        self.running.store(true, Ordering::Release);
        tracing::info!("channel started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        tracing::info!("channel stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Process one input block and push its output to the sink.
    /// Blocks arriving while stopped are dropped.
    pub fn feed(&self, block: &[Complex<f32>]) {
        if !self.is_running() {
            return;
        }
        let mut guard = self.lock();
        let ChannelState { dsp, sink, out } = &mut *guard;
        out.clear();
        dsp.process_block(block, out);
        if !out.is_empty() {
            sink.push_block(out);
        }
    }

    pub fn apply_config(&self, config: ChannelConfig, force: bool) -> ConfigResult<()> {
        self.lock().dsp.apply_config(config, force).inspect_err(|e| {
            tracing::warn!("channel config rejected: {}", e);
        })
    }

    pub fn set_input_sample_rate(&self, sample_rate: u32) -> ConfigResult<()> {
        self.lock()
            .dsp
            .set_input_sample_rate(sample_rate)
            .inspect_err(|e| {
                tracing::warn!("input sample rate {} rejected: {}", sample_rate, e);
            })
    }

    pub fn handle_message(&self, message: ChannelMessage) -> ConfigResult<()> {
        match message {
            ChannelMessage::Configure { config, force } => self.apply_config(config, force),
            ChannelMessage::InputSampleRate { sample_rate } => {
                self.set_input_sample_rate(sample_rate)
            }
        }
    }

    /// One step of the slow correction loop; returns the new offset when a
    /// correction was applied. A stopped channel ignores ticks.
    pub fn tick(&self) -> ConfigResult<Option<i64>> {
        if !self.is_running() {
            return Ok(None);
        }
        self.lock().dsp.tick()
    }

    pub fn config(&self) -> ChannelConfig {
        self.lock().dsp.config().clone()
    }

    pub fn squelch_open(&self) -> bool {
        self.lock().dsp.squelch_open()
    }

    /// Power levels since the previous read; reading resets them.
    pub fn take_mag_sq_levels(&self) -> MagSqLevels {
        self.lock().dsp.take_mag_sq_levels()
    }

    pub fn tracker_locked(&self) -> bool {
        self.lock().dsp.tracker_locked()
    }

    pub fn tracker_frequency_hz(&self) -> Option<f64> {
        self.lock().dsp.tracker_frequency_hz()
    }

    pub fn avg_delta_freq_hz(&self) -> f64 {
        self.lock().dsp.avg_delta_freq_hz()
    }

    /// Build a status snapshot. Drains the power meter like
    /// [`Channel::take_mag_sq_levels`].
    pub fn report(&self) -> ChannelReport {
        let running = self.is_running();
        let mut state = self.lock();
        let levels = state.dsp.take_mag_sq_levels();
        let dsp = &state.dsp;
        let config = dsp.config();
        ChannelReport {
            running,
            power_db: power_db(levels.avg),
            peak_db: power_db(levels.peak),
            sample_count: levels.count,
            squelch_open: dsp.squelch_open(),
            input_sample_rate: dsp.input_sample_rate(),
            channel_sample_rate: config.channel_sample_rate,
            input_frequency_offset_hz: config.input_frequency_offset_hz,
            tracker: config.tracker,
            tracking: config.tracking,
            tracker_locked: dsp.tracker_locked(),
            tracker_frequency_hz: dsp.tracker_frequency_hz(),
            avg_delta_freq_hz: dsp.avg_delta_freq_hz(),
        }
    }
}
