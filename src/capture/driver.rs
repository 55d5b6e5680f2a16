//! Background capture task and sequence-loss tracking
//!
//! One task per [`Acquisition`](crate::Acquisition) owns the packet source
//! and runs until cancelled: receive, decode, route by stream ID, account
//! for sequence gaps, deposit samples into the channel ring. Every
//! per-packet failure is absorbed here — a malformed datagram costs one
//! callback invocation and nothing else.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::PacketSource;
use crate::buffer::RingBufferSet;
use crate::vita::VitaPacket;

/// Sequence counts are 4 bits on the wire; all gap arithmetic wraps here.
const SEQUENCE_MODULO: u8 = 16;

/// Counters shared between the capture task and reader threads.
///
/// Updated only from the capture task, read from arbitrary threads without
/// the channel locks, hence atomics.
#[derive(Default)]
pub(crate) struct SharedCounters {
    pub running: AtomicBool,
    pub packets_received: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub bytes_received: AtomicU64,
}

/// Optional sinks invoked synchronously from the capture task.
///
/// Set once before `start()`; a slow callback throttles ingestion, so both
/// should do minimal work.
#[derive(Clone, Default)]
pub(crate) struct Callbacks {
    pub error: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    pub packet: Option<Arc<dyn Fn(&VitaPacket, usize) + Send + Sync>>,
}

impl Callbacks {
    /// Report a recoverable per-packet condition.
    fn report(&self, message: &str) {
        warn!("{message}");
        if let Some(cb) = &self.error {
            cb(message);
        }
    }
}

/// A detected gap in a stream's sequence counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceGap {
    /// The count the tracker expected next.
    pub expected: u8,
    /// The count that actually arrived.
    pub received: u8,
    /// Packets inferred lost, `(received - expected) mod 16`.
    pub dropped: u8,
}

/// Per-stream sequence-count tracker.
///
/// The 4-bit counter limits resolution: a burst of 16 or more consecutive
/// losses on one stream wraps past the gap undetected. That is a property
/// of the wire format, not of this tracker.
#[derive(Default)]
pub struct LossTracker {
    last_seen: HashMap<u32, u8>,
}

impl LossTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a packet's sequence count, returning the gap it revealed, if
    /// any. The first packet of a stream never counts as loss.
    pub fn observe(&mut self, stream_id: u32, sequence_count: u8) -> Option<SequenceGap> {
        let sequence_count = sequence_count % SEQUENCE_MODULO;
        let gap = self.last_seen.get(&stream_id).and_then(|last| {
            let expected = (last + 1) % SEQUENCE_MODULO;
            let dropped = sequence_count.wrapping_sub(expected) % SEQUENCE_MODULO;
            (dropped != 0).then_some(SequenceGap {
                expected,
                received: sequence_count,
                dropped,
            })
        });
        self.last_seen.insert(stream_id, sequence_count);
        gap
    }
}

/// The capture loop: runs on its own task until cancelled.
pub(crate) async fn capture_task<S: PacketSource>(
    mut source: S,
    rings: Arc<RingBufferSet>,
    counters: Arc<SharedCounters>,
    callbacks: Callbacks,
    cancel: CancellationToken,
) {
    info!("Capture task started");
    let num_channels = rings.num_channels();
    let mut loss = LossTracker::new();
    let mut consecutive_errors = 0u32;

    loop {
        // The receive is the loop's only suspension point; cancellation is
        // checked there rather than between steps.
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Capture task cancelled");
                break;
            }
            result = source.recv() => result,
        };

        let datagram = match result {
            Ok(Some(datagram)) => {
                consecutive_errors = 0;
                datagram
            }
            Ok(None) => continue,
            Err(e) => {
                // Transient receive failure: log, back off briefly so a
                // persistent fault cannot spin the loop, keep going.
                consecutive_errors += 1;
                warn!("Receive error ({consecutive_errors} consecutive): {e}");
                let backoff =
                    std::time::Duration::from_millis(50 * (1 << consecutive_errors.min(5)));
                tokio::time::sleep(backoff).await;
                continue;
            }
        };

        counters.bytes_received.fetch_add(datagram.len() as u64, Ordering::Relaxed);

        let packet = match VitaPacket::decode(&datagram) {
            Ok(packet) => packet,
            Err(e) => {
                callbacks.report(&format!(
                    "Failed to decode {}-byte datagram: {e}",
                    datagram.len()
                ));
                continue;
            }
        };

        // Stream IDs are one-based by hardware contract
        let channel = (packet.stream_id.wrapping_sub(1) % num_channels as u32) as usize;
        if channel >= num_channels {
            callbacks.report(&format!(
                "Invalid stream ID {} (channel {channel})",
                packet.stream_id
            ));
            continue;
        }

        if let Some(gap) = loss.observe(packet.stream_id, packet.sequence_count) {
            counters.packets_dropped.fetch_add(u64::from(gap.dropped), Ordering::Relaxed);
            callbacks.report(&format!(
                "Dropped {} packet(s) on stream {} (expected {}, got {})",
                gap.dropped, packet.stream_id, gap.expected, gap.received
            ));
        }

        if packet.sample_count() > 0 {
            match rings.write(channel, &packet.i_samples, &packet.q_samples) {
                // Overflow is absorbed: counted by the ring, never an error
                Ok(_overflowed) => {}
                Err(e) => {
                    callbacks.report(&format!("Buffer write failed on channel {channel}: {e}"));
                    continue;
                }
            }
        }

        let received = counters.packets_received.fetch_add(1, Ordering::Relaxed) + 1;
        if received % 10_000 == 0 {
            debug!(packets = received, "Capture progress");
        }

        if let Some(cb) = &callbacks.packet {
            cb(&packet, channel);
        }
    }

    counters.running.store(false, Ordering::Relaxed);
    info!(
        packets = counters.packets_received.load(Ordering::Relaxed),
        "Capture task ended"
    );
}
