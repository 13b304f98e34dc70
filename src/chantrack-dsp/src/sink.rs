// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use num_complex::Complex;
use tokio::sync::broadcast;

/// Downstream consumer of channel-rate samples.
///
/// Called once per input block, under the channel lock, with every sample
/// that block produced.
pub trait SampleSink: Send + 'static {
    fn push_block(&mut self, block: &[Complex<f32>]);
}

impl SampleSink for broadcast::Sender<Vec<Complex<f32>>> {
    fn push_block(&mut self, block: &[Complex<f32>]) {
        // No active receivers is fine.
        let _ = self.send(block.to_vec());
    }
}

/// Discards everything.
pub struct NullSink;

impl SampleSink for NullSink {
    fn push_block(&mut self, _block: &[Complex<f32>]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_sink_delivers_blocks() {
        let (mut tx, mut rx) = broadcast::channel::<Vec<Complex<f32>>>(4);
        let block = vec![Complex::new(0.5_f32, -0.5_f32); 8];
        tx.push_block(&block);
        assert_eq!(rx.try_recv().unwrap(), block);
    }

    #[test]
    fn broadcast_sink_without_receivers_is_silent() {
        let (mut tx, rx) = broadcast::channel::<Vec<Complex<f32>>>(4);
        drop(rx);
        tx.push_block(&[Complex::new(1.0, 0.0)]);
    }
}
