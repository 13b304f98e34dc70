// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;
use std::time::Duration;

use num_complex::Complex;
use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use chantrack_dsp::Channel;

/// Counts channel output between reports.
#[derive(Debug, Default)]
struct OutputCounter {
    samples: u64,
    lagged: u64,
}

/// Log a JSON [`chantrack_dsp::ChannelReport`] every `period` and count the
/// samples arriving on `output` until shutdown.
pub async fn run_reporter(
    channel: Arc<Channel>,
    mut output: broadcast::Receiver<Vec<Complex<f32>>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut counter = OutputCounter::default();
    let mut output_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = channel.report();
                match serde_json::to_string(&report) {
                    Ok(json) => info!(
                        output_samples = counter.samples,
                        lagged = counter.lagged,
                        "channel report {}",
                        json
                    ),
                    Err(e) => warn!("failed to serialize channel report: {}", e),
                }
                counter = OutputCounter::default();
            }
            block = output.recv(), if output_open => {
                match block {
                    Ok(block) => counter.samples += block.len() as u64,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        counter.lagged += n;
                    }
                    Err(broadcast::error::RecvError::Closed) => output_open = false,
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
