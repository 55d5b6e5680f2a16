//! Configuration and statistics types for the acquisition pipeline.
//!
//! Plain serde-friendly data types with no behavior of their own:
//! [`AcquisitionConfig`] is consumed at construction time and
//! [`AcquisitionStats`] is the aggregate snapshot produced by
//! [`Acquisition::statistics`](crate::Acquisition::statistics).

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::buffer::ChannelRingStats;

/// Default UDP port the Crimson TNG streams receive data to.
pub const DEFAULT_PORT: u16 = 28888;

/// Default number of Rx channels.
pub const DEFAULT_NUM_CHANNELS: usize = 4;

/// Default per-channel ring capacity in sample pairs (10 M).
pub const DEFAULT_CAPACITY: usize = 10_000_000;

/// Static configuration for an [`Acquisition`](crate::Acquisition).
///
/// Stream IDs are assumed dense and one-based: stream ID `s` lands on
/// channel `(s - 1) % num_channels`. This is a configuration contract with
/// the hardware, not something the pipeline can infer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Address and port the UDP socket binds to.
    pub bind_addr: SocketAddr,
    /// Number of Rx channels to allocate ring buffers for.
    pub num_channels: usize,
    /// Ring capacity per channel, in I/Q sample pairs.
    pub capacity_per_channel: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            num_channels: DEFAULT_NUM_CHANNELS,
            capacity_per_channel: DEFAULT_CAPACITY,
        }
    }
}

impl AcquisitionConfig {
    /// Config bound to an explicit address, other fields defaulted.
    pub fn with_bind_addr(bind_addr: SocketAddr) -> Self {
        Self { bind_addr, ..Self::default() }
    }
}

/// Aggregate acquisition snapshot.
///
/// Rates are zero when no time has elapsed or no packets have arrived; the
/// division-by-zero guards live where the snapshot is computed.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionStats {
    /// Whether the receive task is currently running.
    pub running: bool,
    /// Wall-clock seconds since `start()`.
    pub elapsed_secs: f64,
    /// Packets successfully decoded and routed.
    pub packets_received: u64,
    /// Packets inferred lost from sequence-count gaps.
    pub packets_dropped: u64,
    /// Total datagram bytes received, including malformed packets.
    pub bytes_received: u64,
    /// Packets per second over the elapsed window.
    pub packet_rate: f64,
    /// `100 * packets_dropped / packets_received`.
    pub drop_rate_percent: f64,
    /// Mean datagram size in bytes.
    pub avg_packet_size: f64,
    /// Per-channel ring buffer statistics, in channel order.
    pub channels: Vec<ChannelRingStats>,
}
