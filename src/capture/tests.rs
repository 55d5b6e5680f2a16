//! Integration tests for the capture layer
//!
//! Drive the orchestrator with scripted packet sources so routing, loss
//! accounting, overflow behavior, and lifecycle can be verified
//! deterministically without a radio on the network.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::types::AcquisitionConfig;
use crate::vita::VitaPacket;

/// Source that yields a fixed script of datagrams, then waits forever.
struct ScriptedSource {
    datagrams: VecDeque<Vec<u8>>,
}

impl ScriptedSource {
    fn new(datagrams: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self { datagrams: datagrams.into_iter().collect() }
    }
}

#[async_trait::async_trait]
impl PacketSource for ScriptedSource {
    async fn recv(&mut self) -> crate::Result<Option<Vec<u8>>> {
        match self.datagrams.pop_front() {
            Some(datagram) => Ok(Some(datagram)),
            // Script exhausted: block until the capture task is cancelled
            None => std::future::pending().await,
        }
    }
}

fn test_config() -> AcquisitionConfig {
    AcquisitionConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        num_channels: 4,
        capacity_per_channel: 1000,
    }
}

fn sample_packet(stream_id: u32, sequence_count: u8, n_samples: usize) -> Vec<u8> {
    let i: Vec<i16> = (0..n_samples as i16).collect();
    let q: Vec<i16> = i.iter().map(|v| v + 1000).collect();
    VitaPacket::synthetic(stream_id, sequence_count, 0, i, q).encode()
}

/// Poll `condition` until it holds or two seconds elapse.
async fn wait_for(mut condition: impl FnMut() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "condition not reached within timeout");
}

#[tokio::test]
async fn test_packets_routed_by_stream_id() {
    let _ = tracing_subscriber::fmt::try_init();

    let packets: Vec<Vec<u8>> =
        (1..=4).map(|stream_id| sample_packet(stream_id, 0, 100)).collect();
    let mut acq = Acquisition::new(test_config());
    acq.start_with_source(ScriptedSource::new(packets));

    wait_for(|| acq.statistics().packets_received == 4).await;

    // Stream ID s lands on channel s - 1
    for channel in 0..4 {
        assert_eq!(acq.available(channel).unwrap(), 100, "channel {channel}");
    }

    let (i, q) = acq.read(0, 100).unwrap().expect("100 samples buffered");
    assert_eq!(i, (0..100).collect::<Vec<i16>>());
    assert_eq!(q[0], 1000);
    assert_eq!(acq.available(0).unwrap(), 0);

    acq.stop().await;
    assert!(!acq.is_running());
}

#[tokio::test]
async fn test_sequence_loss_detected_and_reported() {
    let _ = tracing_subscriber::fmt::try_init();

    let packets: Vec<Vec<u8>> =
        [0u8, 1, 2, 5].iter().map(|&seq| sample_packet(1, seq, 10)).collect();
    let mut acq = Acquisition::new(test_config());

    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let sink = Arc::clone(&errors);
    acq.on_error(move |msg| sink.lock().unwrap().push(msg.to_string()));

    acq.start_with_source(ScriptedSource::new(packets));
    wait_for(|| acq.statistics().packets_received == 4).await;

    let stats = acq.statistics();
    assert_eq!(stats.packets_dropped, 2);

    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("expected 3, got 5"), "unexpected message: {}", errors[0]);

    acq.stop().await;
}

#[tokio::test]
async fn test_malformed_datagram_absorbed() {
    let _ = tracing_subscriber::fmt::try_init();

    let packets = vec![vec![0xAB, 0xCD], sample_packet(1, 0, 10)];
    let mut acq = Acquisition::new(test_config());

    let error_count = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&error_count);
    acq.on_error(move |_| {
        sink.fetch_add(1, Ordering::Relaxed);
    });

    acq.start_with_source(ScriptedSource::new(packets));
    wait_for(|| acq.statistics().packets_received == 1).await;

    // The bad datagram cost one callback and nothing else
    assert_eq!(error_count.load(Ordering::Relaxed), 1);
    assert_eq!(acq.available(0).unwrap(), 10);
    // Both datagrams still count toward bytes_received
    assert!(acq.statistics().bytes_received > 2);

    acq.stop().await;
}

#[tokio::test]
async fn test_sustained_input_overflows_ring() {
    let _ = tracing_subscriber::fmt::try_init();

    // 15 packets x 100 samples against a 1000-sample ring
    let packets: Vec<Vec<u8>> =
        (0..15).map(|n| sample_packet(1, (n % 16) as u8, 100)).collect();
    let mut acq = Acquisition::new(test_config());
    acq.start_with_source(ScriptedSource::new(packets));

    wait_for(|| acq.statistics().packets_received == 15).await;

    let stats = acq.statistics();
    let ch0 = &stats.channels[0];
    assert_eq!(ch0.available, 1000);
    assert!(ch0.overflow_count >= 1);
    assert_eq!(ch0.total_written, 1500);
    assert_eq!(ch0.fill_percentage, 100.0);
    // Overflow is a statistic, never a drop
    assert_eq!(stats.packets_dropped, 0);

    acq.stop().await;
}

#[tokio::test]
async fn test_packet_callback_receives_resolved_channel() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut acq = Acquisition::new(test_config());
    let seen: Arc<Mutex<Vec<(u32, usize, usize)>>> = Arc::default();
    let sink = Arc::clone(&seen);
    acq.on_packet(move |packet, channel| {
        sink.lock().unwrap().push((packet.stream_id, channel, packet.sample_count()));
    });

    acq.start_with_source(ScriptedSource::new(vec![
        sample_packet(3, 0, 25),
        sample_packet(1, 0, 50),
    ]));
    wait_for(|| acq.statistics().packets_received == 2).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[(3, 2, 25), (1, 0, 50)]);

    acq.stop().await;
}

#[tokio::test]
async fn test_lifecycle_idempotence() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut acq = Acquisition::new(test_config());
    assert!(!acq.is_running());

    // Stop while idle is a no-op
    acq.stop().await;

    acq.start_with_source(ScriptedSource::new(vec![sample_packet(1, 0, 10)]));
    assert!(acq.is_running());

    // Second start is a warning, not an error; the running task survives
    acq.start_with_source(ScriptedSource::new(vec![sample_packet(2, 0, 10)]));
    wait_for(|| acq.statistics().packets_received >= 1).await;

    acq.stop().await;
    acq.stop().await;
    assert!(!acq.is_running());

    // Restartable after stop; buffers and counters carry over
    acq.start_with_source(ScriptedSource::new(vec![sample_packet(1, 1, 10)]));
    wait_for(|| acq.statistics().packets_received >= 2).await;
    acq.stop().await;
}

#[tokio::test]
async fn test_statistics_guard_division_by_zero() {
    let acq = Acquisition::new(test_config());
    let stats = acq.statistics();

    assert!(!stats.running);
    assert_eq!(stats.elapsed_secs, 0.0);
    assert_eq!(stats.packet_rate, 0.0);
    assert_eq!(stats.drop_rate_percent, 0.0);
    assert_eq!(stats.avg_packet_size, 0.0);
    assert_eq!(stats.channels.len(), 4);
}

#[tokio::test]
async fn test_clear_and_complex_read() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut acq = Acquisition::new(test_config());
    acq.start_with_source(ScriptedSource::new(vec![
        sample_packet(1, 0, 20),
        sample_packet(2, 0, 20),
    ]));
    wait_for(|| acq.statistics().packets_received == 2).await;

    let complex = acq.read_complex(0, 5).unwrap().expect("samples buffered");
    assert_eq!(complex[2], num_complex::Complex::new(2.0, 1002.0));
    assert_eq!(acq.available(0).unwrap(), 15);

    acq.clear(Some(0)).unwrap();
    assert_eq!(acq.available(0).unwrap(), 0);
    assert_eq!(acq.available(1).unwrap(), 20);

    acq.clear(None).unwrap();
    assert_eq!(acq.available(1).unwrap(), 0);

    // Insufficient data is Ok(None), bad channel is an error
    assert!(acq.read(0, 1).unwrap().is_none());
    assert!(acq.read(7, 1).is_err());

    acq.stop().await;
}
