//! Acquisition orchestrator
//!
//! Binds the wire decoder and the ring buffer set together: owns the UDP
//! socket, spawns the background capture task, tracks loss statistics, and
//! exposes lifecycle control plus the channel read surface.

mod driver;
mod source;

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use num_complex::Complex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use driver::{LossTracker, SequenceGap};
pub use source::{PacketSource, UdpSource};

use crate::buffer::{ChannelRingStats, RingBufferSet};
use crate::types::{AcquisitionConfig, AcquisitionStats};
use crate::vita::VitaPacket;
use crate::Result;

use driver::{Callbacks, SharedCounters, capture_task};

/// How long `stop()` waits for the capture task before giving up on the
/// join. The task is cancelled at its receive point, so in practice it
/// exits well inside this bound.
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Handles for a running capture task.
struct RunState {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    local_addr: Option<SocketAddr>,
}

/// Real-time I/Q acquisition pipeline.
///
/// Lifecycle is `Idle -> Running -> Idle`: [`start`] binds the socket and
/// spawns exactly one background capture task; [`stop`] cancels it and
/// waits (bounded) for it to finish. Both are idempotent — starting while
/// running logs a warning and does nothing, stopping while idle is a no-op.
///
/// Samples land in one ring buffer per channel and are consumed through
/// [`read`]/[`peek`] from any thread while the capture task keeps writing.
///
/// # Example
///
/// ```rust,no_run
/// use iqflow::{Acquisition, AcquisitionConfig};
///
/// #[tokio::main]
/// async fn main() -> iqflow::Result<()> {
///     let mut acq = Acquisition::new(AcquisitionConfig::default());
///     acq.on_error(|msg| eprintln!("acquisition: {msg}"));
///     acq.start().await?;
///
///     // ... elsewhere, consume samples:
///     if let Some((i, q)) = acq.read(0, 4096)? {
///         assert_eq!(i.len(), q.len());
///     }
///
///     acq.stop().await;
///     Ok(())
/// }
/// ```
///
/// [`start`]: Acquisition::start
/// [`stop`]: Acquisition::stop
/// [`read`]: Acquisition::read
/// [`peek`]: Acquisition::peek
pub struct Acquisition {
    config: AcquisitionConfig,
    rings: Arc<RingBufferSet>,
    counters: Arc<SharedCounters>,
    callbacks: Callbacks,
    run: Option<RunState>,
    start_time: Option<Instant>,
}

impl Acquisition {
    /// Create an idle acquisition with its ring buffers allocated.
    pub fn new(config: AcquisitionConfig) -> Self {
        let rings =
            Arc::new(RingBufferSet::new(config.num_channels, config.capacity_per_channel));
        Self {
            config,
            rings,
            counters: Arc::new(SharedCounters::default()),
            callbacks: Callbacks::default(),
            run: None,
            start_time: None,
        }
    }

    /// Register a sink for recoverable per-packet errors.
    ///
    /// Invoked synchronously on the capture task; must not block. Set
    /// before [`start`](Acquisition::start) — changes after that apply to
    /// the next start.
    pub fn on_error(&mut self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.callbacks.error = Some(Arc::new(callback));
    }

    /// Register a sink invoked with every decoded packet and its resolved
    /// channel. Same threading rules as [`on_error`](Acquisition::on_error).
    pub fn on_packet(&mut self, callback: impl Fn(&VitaPacket, usize) + Send + Sync + 'static) {
        self.callbacks.packet = Some(Arc::new(callback));
    }

    /// Bind the configured UDP address and start capturing.
    ///
    /// A no-op (with a warning) if already running.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Bind`](crate::AcquireError::Bind) when the
    /// socket cannot be bound; the acquisition stays idle in that case.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            warn!("Acquisition already running");
            return Ok(());
        }
        let source = UdpSource::bind(self.config.bind_addr).await?;
        let local_addr = source.local_addr();
        self.spawn(source, local_addr);
        Ok(())
    }

    /// Start capturing from an arbitrary [`PacketSource`].
    ///
    /// The injection seam for simulation and testing; [`start`] is the UDP
    /// convenience over it. A no-op (with a warning) if already running.
    ///
    /// [`start`]: Acquisition::start
    pub fn start_with_source<S: PacketSource>(&mut self, source: S) {
        if self.is_running() {
            warn!("Acquisition already running");
            return;
        }
        self.spawn(source, None);
    }

    fn spawn<S: PacketSource>(&mut self, source: S, local_addr: Option<SocketAddr>) {
        let cancel = CancellationToken::new();
        self.counters.running.store(true, Ordering::Relaxed);
        self.start_time = Some(Instant::now());

        let handle = tokio::spawn(capture_task(
            source,
            Arc::clone(&self.rings),
            Arc::clone(&self.counters),
            self.callbacks.clone(),
            cancel.clone(),
        ));

        self.run = Some(RunState { cancel, handle, local_addr });
        info!(
            channels = self.config.num_channels,
            capacity = self.config.capacity_per_channel,
            "Acquisition started"
        );
    }

    /// Stop capturing: cancel the task, wait up to two seconds for it to
    /// finish, then release the socket. Idempotent; a task that misses the
    /// deadline is aborted rather than treated as fatal.
    pub async fn stop(&mut self) {
        let Some(run) = self.run.take() else {
            return;
        };

        run.cancel.cancel();
        let abort = run.handle.abort_handle();
        match tokio::time::timeout(JOIN_TIMEOUT, run.handle).await {
            Ok(Ok(())) => info!("Acquisition stopped"),
            Ok(Err(e)) => warn!("Capture task failed during shutdown: {e}"),
            Err(_) => {
                warn!("Capture task did not exit within {JOIN_TIMEOUT:?}, aborting it");
                abort.abort();
            }
        }
        self.counters.running.store(false, Ordering::Relaxed);
    }

    /// Whether the capture task is currently running.
    pub fn is_running(&self) -> bool {
        self.run.is_some() && self.counters.running.load(Ordering::Relaxed)
    }

    /// The socket address the running UDP source is bound to.
    ///
    /// `None` while idle, or when capturing from an injected source.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.run.as_ref().and_then(|run| run.local_addr)
    }

    /// Consume `n` I/Q samples from a channel.
    ///
    /// `Ok(None)` when fewer than `n` samples are buffered (nothing is
    /// consumed); retry later.
    pub fn read(&self, channel: usize, n: usize) -> Result<Option<(Vec<i16>, Vec<i16>)>> {
        self.rings.read(channel, n)
    }

    /// Inspect `n` samples without consuming them.
    pub fn peek(&self, channel: usize, n: usize) -> Result<Option<(Vec<i16>, Vec<i16>)>> {
        self.rings.peek(channel, n)
    }

    /// Consume `n` samples as complex values (`I + jQ`, f32).
    pub fn read_complex(&self, channel: usize, n: usize) -> Result<Option<Vec<Complex<f32>>>> {
        Ok(self.rings.read(channel, n)?.map(to_complex))
    }

    /// Inspect `n` samples as complex values without consuming them.
    pub fn peek_complex(&self, channel: usize, n: usize) -> Result<Option<Vec<Complex<f32>>>> {
        Ok(self.rings.peek(channel, n)?.map(to_complex))
    }

    /// Samples currently buffered on a channel.
    pub fn available(&self, channel: usize) -> Result<usize> {
        self.rings.available(channel)
    }

    /// Clear one channel's buffer, or all of them when `channel` is `None`.
    /// Lifetime statistics survive.
    pub fn clear(&self, channel: Option<usize>) -> Result<()> {
        self.rings.clear(channel)
    }

    /// Aggregate statistics snapshot: lifecycle, packet counters, rates,
    /// and per-channel buffer state.
    pub fn statistics(&self) -> AcquisitionStats {
        let elapsed_secs =
            self.start_time.map(|t| t.elapsed().as_secs_f64()).unwrap_or_default();
        let packets_received = self.counters.packets_received.load(Ordering::Relaxed);
        let packets_dropped = self.counters.packets_dropped.load(Ordering::Relaxed);
        let bytes_received = self.counters.bytes_received.load(Ordering::Relaxed);

        let packet_rate =
            if elapsed_secs > 0.0 { packets_received as f64 / elapsed_secs } else { 0.0 };
        let drop_rate_percent = if packets_received > 0 {
            100.0 * packets_dropped as f64 / packets_received as f64
        } else {
            0.0
        };
        let avg_packet_size = if packets_received > 0 {
            bytes_received as f64 / packets_received as f64
        } else {
            0.0
        };

        AcquisitionStats {
            running: self.is_running(),
            elapsed_secs,
            packets_received,
            packets_dropped,
            bytes_received,
            packet_rate,
            drop_rate_percent,
            avg_packet_size,
            channels: self.channel_statistics(),
        }
    }

    /// Per-channel buffer statistics only.
    pub fn channel_statistics(&self) -> Vec<ChannelRingStats> {
        self.rings.statistics()
    }

    /// The configuration this acquisition was built with.
    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        // Best-effort: let the capture task notice cancellation and wind
        // down on its own; there is no async join in Drop.
        if let Some(run) = &self.run {
            run.cancel.cancel();
        }
    }
}

fn to_complex((i_samples, q_samples): (Vec<i16>, Vec<i16>)) -> Vec<Complex<f32>> {
    i_samples
        .into_iter()
        .zip(q_samples)
        .map(|(i, q)| Complex::new(f32::from(i), f32::from(q)))
        .collect()
}

#[cfg(test)]
mod tests;
