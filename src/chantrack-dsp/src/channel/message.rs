// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use super::config::ChannelConfig;

/// Control messages accepted by [`crate::Channel::handle_message`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Replace the whole channel configuration. `force` rebuilds every
    /// component even when nothing changed.
    Configure { config: ChannelConfig, force: bool },
    /// The upstream (pre-resampler) sample rate changed.
    InputSampleRate { sample_rate: u32 },
}

impl ChannelMessage {
    pub fn configure(config: ChannelConfig) -> Self {
        Self::Configure {
            config,
            force: false,
        }
    }
}
