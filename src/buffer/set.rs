//! Channel-indexed collection of ring buffers

use tracing::info;

use super::{ChannelRing, ChannelRingStats};
use crate::{AcquireError, Result};

/// Owns one [`ChannelRing`] per hardware channel and routes operations by
/// channel index.
///
/// Channel indices are dense, starting at zero. Every operation on an index
/// outside `[0, num_channels)` fails with
/// [`AcquireError::ChannelOutOfRange`].
pub struct RingBufferSet {
    rings: Vec<ChannelRing>,
}

impl RingBufferSet {
    /// Allocate `num_channels` independent rings of `capacity_per_channel`
    /// sample pairs each.
    ///
    /// # Panics
    ///
    /// Panics if `num_channels` or `capacity_per_channel` is zero.
    pub fn new(num_channels: usize, capacity_per_channel: usize) -> Self {
        assert!(num_channels > 0, "need at least one channel");
        let rings =
            (0..num_channels).map(|ch| ChannelRing::new(ch, capacity_per_channel)).collect();
        info!(
            num_channels,
            capacity_per_channel, "Allocated ring buffers ({} samples total)",
            num_channels * capacity_per_channel
        );
        Self { rings }
    }

    /// Number of channels in the set.
    pub fn num_channels(&self) -> usize {
        self.rings.len()
    }

    /// Look up a channel's ring, failing for out-of-range indices.
    pub fn channel(&self, channel: usize) -> Result<&ChannelRing> {
        self.rings
            .get(channel)
            .ok_or_else(|| AcquireError::channel_out_of_range(channel, self.rings.len()))
    }

    /// Append samples to one channel. See [`ChannelRing::write`].
    pub fn write(&self, channel: usize, i_samples: &[i16], q_samples: &[i16]) -> Result<bool> {
        self.channel(channel)?.write(i_samples, q_samples)
    }

    /// Consume samples from one channel. See [`ChannelRing::read`].
    pub fn read(&self, channel: usize, n: usize) -> Result<Option<(Vec<i16>, Vec<i16>)>> {
        Ok(self.channel(channel)?.read(n))
    }

    /// Inspect samples without consuming. See [`ChannelRing::peek`].
    pub fn peek(&self, channel: usize, n: usize) -> Result<Option<(Vec<i16>, Vec<i16>)>> {
        Ok(self.channel(channel)?.peek(n))
    }

    /// Samples currently buffered on one channel.
    pub fn available(&self, channel: usize) -> Result<usize> {
        Ok(self.channel(channel)?.available())
    }

    /// Clear one channel, or all channels when `channel` is `None`.
    pub fn clear(&self, channel: Option<usize>) -> Result<()> {
        match channel {
            Some(ch) => self.channel(ch)?.clear(),
            None => {
                for ring in &self.rings {
                    ring.clear();
                }
            }
        }
        Ok(())
    }

    /// Statistics snapshots for every channel, in index order.
    pub fn statistics(&self) -> Vec<ChannelRingStats> {
        self.rings.iter().map(ChannelRing::statistics).collect()
    }
}
