//! Per-channel circular buffer for I/Q samples
//!
//! Fixed-capacity store with overwrite-on-overflow semantics: a write never
//! blocks and never rejects data; when the buffer is full the oldest unread
//! samples are discarded to make room. Reads are all-or-nothing — a request
//! for more samples than are buffered returns nothing and mutates nothing.
//!
//! All operations take the channel's own lock for their full duration and
//! perform only bounded, in-memory work under it. Lifetime counters
//! (`total_written`, `total_read`, `overflow_count`) survive [`clear`],
//! distinguishing buffer contents from historical statistics.
//!
//! [`clear`]: ChannelRing::clear

use std::sync::Mutex;

use serde::Serialize;
use tracing::debug;

use crate::{AcquireError, Result};

/// Snapshot of one channel buffer's state and lifetime counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelRingStats {
    pub channel: usize,
    pub capacity: usize,
    pub available: usize,
    pub write_pos: usize,
    pub read_pos: usize,
    pub total_written: u64,
    pub total_read: u64,
    pub overflow_count: u64,
    pub fill_percentage: f64,
}

/// Mutable ring state, guarded by the channel lock.
struct RingState {
    storage_i: Vec<i16>,
    storage_q: Vec<i16>,
    write_pos: usize,
    read_pos: usize,
    available: usize,
    total_written: u64,
    total_read: u64,
    overflow_count: u64,
}

/// A thread-safe circular buffer for one channel's I/Q sample stream.
///
/// Invariants held across all operations: `available <= capacity`, and both
/// positions stay in `[0, capacity)`. Samples come out of [`read`] in the
/// order [`write`] appended them (FIFO per channel).
///
/// [`read`]: ChannelRing::read
/// [`write`]: ChannelRing::write
pub struct ChannelRing {
    channel: usize,
    capacity: usize,
    state: Mutex<RingState>,
}

impl ChannelRing {
    /// Create a ring for `channel` holding up to `capacity` sample pairs.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(channel: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            channel,
            capacity,
            state: Mutex::new(RingState {
                storage_i: vec![0; capacity],
                storage_q: vec![0; capacity],
                write_pos: 0,
                read_pos: 0,
                available: 0,
                total_written: 0,
                total_read: 0,
                overflow_count: 0,
            }),
        }
    }

    /// Sample capacity fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append I/Q samples, discarding the oldest unread data on overflow.
    ///
    /// Returns `true` if the call triggered an overflow — a diagnostic
    /// signal only; the write itself always fully succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::SampleLengthMismatch`] if the two arrays
    /// differ in length.
    pub fn write(&self, i_samples: &[i16], q_samples: &[i16]) -> Result<bool> {
        if i_samples.len() != q_samples.len() {
            return Err(AcquireError::sample_length_mismatch(i_samples.len(), q_samples.len()));
        }

        let n = i_samples.len();
        if n == 0 {
            return Ok(false);
        }

        let mut state = self.state.lock().expect("channel ring lock poisoned");
        let mut overflowed = false;

        if n >= self.capacity {
            // A single write larger than the whole buffer: only the newest
            // `capacity` samples can survive. Restart the ring from zero.
            overflowed = true;
            state.overflow_count += 1;
            debug!(
                channel = self.channel,
                n, "Write exceeds ring capacity, keeping newest samples only"
            );

            let start = n - self.capacity;
            state.storage_i.copy_from_slice(&i_samples[start..]);
            state.storage_q.copy_from_slice(&q_samples[start..]);
            state.write_pos = 0;
            state.read_pos = 0;
            state.available = self.capacity;
            state.total_written += n as u64;
            return Ok(overflowed);
        }

        let space = self.capacity - state.available;
        if n > space {
            // Advance the read position past the oldest unread samples
            overflowed = true;
            state.overflow_count += 1;
            let excess = n - space;
            state.read_pos = (state.read_pos + excess) % self.capacity;
            state.available -= excess;
            debug!(channel = self.channel, discarded = excess, "Ring overflow");
        }

        // Copy in, splitting at the wrap point if needed
        let write_pos = state.write_pos;
        if write_pos + n <= self.capacity {
            state.storage_i[write_pos..write_pos + n].copy_from_slice(i_samples);
            state.storage_q[write_pos..write_pos + n].copy_from_slice(q_samples);
        } else {
            let first = self.capacity - write_pos;
            state.storage_i[write_pos..].copy_from_slice(&i_samples[..first]);
            state.storage_q[write_pos..].copy_from_slice(&q_samples[..first]);
            state.storage_i[..n - first].copy_from_slice(&i_samples[first..]);
            state.storage_q[..n - first].copy_from_slice(&q_samples[first..]);
        }

        state.write_pos = (write_pos + n) % self.capacity;
        state.available += n;
        state.total_written += n as u64;

        Ok(overflowed)
    }

    /// Consume `n` samples in FIFO order.
    ///
    /// Returns `None` without mutating anything when fewer than `n` samples
    /// are buffered; partial reads are never returned.
    pub fn read(&self, n: usize) -> Option<(Vec<i16>, Vec<i16>)> {
        let mut state = self.state.lock().expect("channel ring lock poisoned");
        if n > state.available {
            return None;
        }

        let out = copy_from(&state, self.capacity, n);
        state.read_pos = (state.read_pos + n) % self.capacity;
        state.available -= n;
        state.total_read += n as u64;
        Some(out)
    }

    /// Copy `n` samples without consuming them.
    ///
    /// Identical to [`read`](ChannelRing::read) except that positions,
    /// `available`, and counters are untouched.
    pub fn peek(&self, n: usize) -> Option<(Vec<i16>, Vec<i16>)> {
        let state = self.state.lock().expect("channel ring lock poisoned");
        if n > state.available {
            return None;
        }
        Some(copy_from(&state, self.capacity, n))
    }

    /// Number of samples currently buffered.
    pub fn available(&self) -> usize {
        self.state.lock().expect("channel ring lock poisoned").available
    }

    /// Drop all buffered samples. Lifetime counters are preserved.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("channel ring lock poisoned");
        state.write_pos = 0;
        state.read_pos = 0;
        state.available = 0;
    }

    /// Snapshot this channel's state and counters.
    pub fn statistics(&self) -> ChannelRingStats {
        let state = self.state.lock().expect("channel ring lock poisoned");
        ChannelRingStats {
            channel: self.channel,
            capacity: self.capacity,
            available: state.available,
            write_pos: state.write_pos,
            read_pos: state.read_pos,
            total_written: state.total_written,
            total_read: state.total_read,
            overflow_count: state.overflow_count,
            fill_percentage: 100.0 * state.available as f64 / self.capacity as f64,
        }
    }
}

/// Copy `n` samples starting at the read position, handling wraparound.
fn copy_from(state: &RingState, capacity: usize, n: usize) -> (Vec<i16>, Vec<i16>) {
    let mut i_out = vec![0i16; n];
    let mut q_out = vec![0i16; n];
    let read_pos = state.read_pos;

    if read_pos + n <= capacity {
        i_out.copy_from_slice(&state.storage_i[read_pos..read_pos + n]);
        q_out.copy_from_slice(&state.storage_q[read_pos..read_pos + n]);
    } else {
        let first = capacity - read_pos;
        i_out[..first].copy_from_slice(&state.storage_i[read_pos..]);
        q_out[..first].copy_from_slice(&state.storage_q[read_pos..]);
        i_out[first..].copy_from_slice(&state.storage_i[..n - first]);
        q_out[first..].copy_from_slice(&state.storage_q[..n - first]);
    }

    (i_out, q_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(start: i16, len: usize) -> Vec<i16> {
        (start..start + len as i16).collect()
    }

    #[test]
    fn test_basic_write_read() {
        let ring = ChannelRing::new(0, 1000);
        let i = ramp(0, 100);
        let q = ramp(100, 100);

        assert!(!ring.write(&i, &q).unwrap());
        assert_eq!(ring.available(), 100);

        let (i_read, q_read) = ring.read(50).unwrap();
        assert_eq!(i_read, ramp(0, 50));
        assert_eq!(q_read, ramp(100, 50));
        assert_eq!(ring.available(), 50);
    }

    #[test]
    fn test_peek_then_read_identical() {
        let ring = ChannelRing::new(0, 64);
        ring.write(&ramp(0, 40), &ramp(40, 40)).unwrap();

        let peeked = ring.peek(30).unwrap();
        assert_eq!(ring.available(), 40);

        let read = ring.read(30).unwrap();
        assert_eq!(peeked, read);
        assert_eq!(ring.available(), 10);
    }

    #[test]
    fn test_insufficient_read_is_noop() {
        let ring = ChannelRing::new(0, 64);
        ring.write(&[1, 2, 3], &[4, 5, 6]).unwrap();

        assert!(ring.read(4).is_none());
        assert!(ring.peek(4).is_none());
        assert_eq!(ring.available(), 3);

        let stats = ring.statistics();
        assert_eq!(stats.total_read, 0);
        assert_eq!(stats.read_pos, 0);
    }

    #[test]
    fn test_overflow_keeps_newest_samples() {
        let ring = ChannelRing::new(0, 100);

        // 120 samples in two writes: 20 oldest must be sacrificed
        ring.write(&ramp(0, 80), &ramp(0, 80)).unwrap();
        let overflowed = ring.write(&ramp(80, 40), &ramp(80, 40)).unwrap();

        assert!(overflowed);
        assert_eq!(ring.available(), 100);
        let stats = ring.statistics();
        assert_eq!(stats.overflow_count, 1);
        assert_eq!(stats.total_written, 120);

        let (i, _q) = ring.read(100).unwrap();
        assert_eq!(i, ramp(20, 100));
    }

    #[test]
    fn test_write_larger_than_capacity() {
        let ring = ChannelRing::new(0, 50);
        let overflowed = ring.write(&ramp(0, 120), &ramp(0, 120)).unwrap();

        assert!(overflowed);
        assert_eq!(ring.available(), 50);
        let (i, _q) = ring.read(50).unwrap();
        assert_eq!(i, ramp(70, 50));
    }

    #[test]
    fn test_wraparound_split_copy() {
        let ring = ChannelRing::new(0, 10);
        ring.write(&ramp(0, 8), &ramp(0, 8)).unwrap();
        ring.read(6).unwrap();

        // write_pos = 8, this write wraps past the end
        ring.write(&ramp(8, 6), &ramp(8, 6)).unwrap();
        assert_eq!(ring.available(), 8);

        let (i, _q) = ring.read(8).unwrap();
        assert_eq!(i, ramp(6, 8));
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let ring = ChannelRing::new(0, 10);
        let err = ring.write(&[1, 2], &[1]).unwrap_err();
        assert!(matches!(err, AcquireError::SampleLengthMismatch { i_len: 2, q_len: 1 }));
    }

    #[test]
    fn test_clear_preserves_counters() {
        let ring = ChannelRing::new(3, 10);
        ring.write(&ramp(0, 12), &ramp(0, 12)).unwrap(); // forces an overflow
        ring.read(5).unwrap();
        ring.clear();

        let stats = ring.statistics();
        assert_eq!(stats.available, 0);
        assert_eq!(stats.write_pos, 0);
        assert_eq!(stats.read_pos, 0);
        assert_eq!(stats.total_written, 12);
        assert_eq!(stats.total_read, 5);
        assert_eq!(stats.overflow_count, 1);
        assert_eq!(stats.fill_percentage, 0.0);
    }

    #[test]
    fn test_fill_percentage() {
        let ring = ChannelRing::new(0, 200);
        ring.write(&[0; 50], &[0; 50]).unwrap();
        let stats = ring.statistics();
        assert_eq!(stats.fill_percentage, 25.0);
    }

    #[test]
    fn test_zero_length_write_is_noop() {
        let ring = ChannelRing::new(0, 10);
        assert!(!ring.write(&[], &[]).unwrap());
        assert_eq!(ring.statistics().total_written, 0);
    }

    proptest! {
        /// Any write sequence fitting within capacity reads back in FIFO
        /// order, regardless of how reads are chunked.
        #[test]
        fn prop_fifo_order_within_capacity(
            chunks in prop::collection::vec(1..40usize, 1..8),
            read_chunk in 1..25usize,
        ) {
            let total: usize = chunks.iter().sum();
            let ring = ChannelRing::new(0, 256);
            prop_assume!(total <= 256);

            let mut next = 0i16;
            for len in &chunks {
                let i: Vec<i16> = (next..next + *len as i16).collect();
                let q: Vec<i16> = i.iter().map(|v| v + 1000).collect();
                prop_assert!(!ring.write(&i, &q).unwrap());
                next += *len as i16;
            }

            let mut expect = 0i16;
            while ring.available() >= read_chunk {
                let (i, q) = ring.read(read_chunk).unwrap();
                for (iv, qv) in i.iter().zip(&q) {
                    prop_assert_eq!(*iv, expect);
                    prop_assert_eq!(*qv, expect + 1000);
                    expect += 1;
                }
            }
            prop_assert_eq!(ring.available() as i16, total as i16 - expect);
        }

        /// Overflowing writes always leave a full buffer holding exactly the
        /// most recent `capacity` samples.
        #[test]
        fn prop_overflow_keeps_most_recent(
            writes in prop::collection::vec(1..60usize, 2..10),
        ) {
            let capacity = 100usize;
            let total: usize = writes.iter().sum();
            prop_assume!(total > capacity);

            let ring = ChannelRing::new(0, capacity);
            let mut next = 0i16;
            for len in &writes {
                let i: Vec<i16> = (next..next + *len as i16).collect();
                ring.write(&i, &i).unwrap();
                next += *len as i16;
            }

            let stats = ring.statistics();
            prop_assert_eq!(stats.available, capacity);
            prop_assert!(stats.overflow_count >= 1);

            let (i, _q) = ring.read(capacity).unwrap();
            let expected: Vec<i16> =
                ((total - capacity) as i16..total as i16).collect();
            prop_assert_eq!(i, expected);
        }
    }
}
