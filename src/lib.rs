//! Real-time I/Q sample acquisition from VITA-49 SDR datagram streams.
//!
//! `iqflow` turns raw UDP datagrams from a software-defined-radio front end
//! (Crimson TNG PVAN-11 framing, a VITA-49 derivative) into correctly
//! ordered, loss-accounted, channel-separated sample streams ready for
//! signal processing and recording.
//!
//! # Architecture
//!
//! - [`vita`] - pure wire-format decoder: datagram bytes in, structured
//!   [`VitaPacket`] out
//! - [`buffer`] - one fixed-capacity ring per channel with
//!   overwrite-on-overflow semantics, each independently locked
//! - [`capture`] - the [`Acquisition`] orchestrator: owns the socket, runs
//!   the background receive task, tracks sequence loss, exposes
//!   start/stop/read/peek/statistics
//!
//! A dedicated capture task is the only writer; any number of application
//! threads consume through [`Acquisition::read`] and
//! [`Acquisition::peek`] concurrently. Producer overrun never blocks and
//! never fails a write — the oldest unread samples are sacrificed and
//! counted.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use iqflow::{Acquisition, AcquisitionConfig};
//!
//! #[tokio::main]
//! async fn main() -> iqflow::Result<()> {
//!     let mut acq = Acquisition::new(AcquisitionConfig::default());
//!     acq.on_error(|msg| eprintln!("acquisition: {msg}"));
//!     acq.start().await?;
//!
//!     loop {
//!         if let Some(samples) = acq.read_complex(0, 8192)? {
//!             // hand off to DSP ...
//!             let _ = samples;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!     }
//! }
//! ```

mod error;

pub mod buffer;
pub mod capture;
pub mod types;
pub mod vita;

pub use buffer::{ChannelRing, ChannelRingStats, RingBufferSet};
pub use capture::{Acquisition, LossTracker, PacketSource, SequenceGap, UdpSource};
pub use error::{AcquireError, DecodeError, Result};
pub use types::{AcquisitionConfig, AcquisitionStats};
pub use vita::VitaPacket;
