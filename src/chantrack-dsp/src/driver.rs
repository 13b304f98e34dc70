// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Drivers pushing samples and ticks into a [`Channel`].

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use num_complex::Complex;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::channel::Channel;
use crate::source::IqSource;

/// Default block size for IQ reads.
pub const IQ_BLOCK_SIZE: usize = 4096;

/// Default period of the correction tick.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// IQ read loop
// ---------------------------------------------------------------------------

/// Spawn the `chantrack-iq-read` thread pulling blocks from `source` into
/// `channel` until `shutdown` turns true or its sender is dropped.
///
/// `sample_rate` paces synthetic sources to real time.
pub fn spawn_iq_reader(
    source: Box<dyn IqSource>,
    channel: Arc<Channel>,
    sample_rate: u32,
    block_size: usize,
    shutdown: watch::Receiver<bool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("chantrack-iq-read".to_string())
        .spawn(move || iq_read_loop(source, channel, sample_rate, block_size, shutdown))
}

fn shutdown_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

fn iq_read_loop(
    mut source: Box<dyn IqSource>,
    channel: Arc<Channel>,
    sample_rate: u32,
    block_size: usize,
    shutdown: watch::Receiver<bool>,
) {
    let mut block = vec![Complex::new(0.0_f32, 0.0_f32); block_size.max(1)];
    let block_duration = if sample_rate > 0 {
        Duration::from_secs_f64(block.len() as f64 / sample_rate as f64)
    } else {
        Duration::from_millis(1)
    };
    tracing::info!(
        "IQ reader started: {} samples/block at {} Hz",
        block.len(),
        sample_rate
    );

    while !shutdown_requested(&shutdown) {
        let n = match source.read_into(&mut block) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("IQ source read error: {}; retrying", e);
                std::thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        if n == 0 {
            std::thread::sleep(Duration::from_millis(1));
            continue;
        }

        channel.feed(&block[..n]);

        // Synthetic sources return immediately; hold them to the sample clock.
        std::thread::sleep(block_duration);
    }
    tracing::info!("IQ reader stopped");
}

// ---------------------------------------------------------------------------
// Tick loop
// ---------------------------------------------------------------------------

/// Call [`Channel::tick`] every `period` until `shutdown` turns true or its
/// sender is dropped.
pub async fn run_tick_loop(
    channel: Arc<Channel>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match channel.tick() {
                    Ok(Some(offset)) => {
                        tracing::debug!("tick moved channel offset to {} Hz", offset);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!("frequency correction rejected: {}", e),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelConfig;
    use crate::sink::NullSink;
    use crate::source::{MockIqSource, ToneIqSource};
    use tokio::sync::broadcast;

    struct FailingSource {
        calls: usize,
    }

    impl IqSource for FailingSource {
        fn read_into(&mut self, buf: &mut [Complex<f32>]) -> Result<usize, String> {
            self.calls += 1;
            if self.calls % 2 == 1 {
                Err("device busy".to_string())
            } else {
                buf.fill(Complex::new(1.0, 0.0));
                Ok(buf.len())
            }
        }
    }

    #[test]
    fn reader_feeds_channel_until_shutdown() {
        let (tx, mut rx) = broadcast::channel::<Vec<Complex<f32>>>(64);
        let channel =
            Arc::new(Channel::new(48_000, ChannelConfig::default(), Box::new(tx)).unwrap());
        channel.start();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_iq_reader(
            Box::new(ToneIqSource::new(500.0, 48_000, 1.0)),
            Arc::clone(&channel),
            48_000,
            480,
            shutdown_rx,
        )
        .unwrap();

        let block = rx.blocking_recv().unwrap();
        assert_eq!(block.len(), 480);

        let _ = shutdown_tx.send(true);
        handle.join().unwrap();
    }

    #[test]
    fn reader_survives_read_errors() {
        let (tx, mut rx) = broadcast::channel::<Vec<Complex<f32>>>(64);
        let channel =
            Arc::new(Channel::new(48_000, ChannelConfig::default(), Box::new(tx)).unwrap());
        channel.start();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_iq_reader(
            Box::new(FailingSource { calls: 0 }),
            Arc::clone(&channel),
            48_000,
            256,
            shutdown_rx,
        )
        .unwrap();

        for _ in 0..3 {
            assert_eq!(rx.blocking_recv().unwrap().len(), 256);
        }
        drop(shutdown_tx);
        handle.join().unwrap();
    }

    #[test]
    fn dropped_shutdown_sender_stops_reader() {
        let channel =
            Arc::new(Channel::new(48_000, ChannelConfig::default(), Box::new(NullSink)).unwrap());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn_iq_reader(
            Box::new(MockIqSource),
            channel,
            48_000,
            64,
            shutdown_rx,
        )
        .unwrap();
        drop(shutdown_tx);
        handle.join().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn tick_loop_drives_frequency_correction() {
        let config = ChannelConfig {
            tracking: true,
            ..ChannelConfig::default()
        };
        let channel = Arc::new(Channel::new(48_000, config, Box::new(NullSink)).unwrap());
        channel.start();
        let mut source = ToneIqSource::new(1_000.0, 48_000, 1.0);
        let mut block = vec![Complex::new(0.0_f32, 0.0); 20_000];
        source.read_into(&mut block).unwrap();
        channel.feed(&block);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_tick_loop(
            Arc::clone(&channel),
            DEFAULT_TICK_PERIOD,
            shutdown_rx,
        ));

        tokio::time::sleep(DEFAULT_TICK_PERIOD * 15).await;
        let offset = channel.config().input_frequency_offset_hz;
        assert!(offset > 500 && offset < 1_000, "offset {offset}");

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
