//! Error types for the acquisition pipeline.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. Steady-state, per-packet conditions (malformed datagrams, sequence
//! loss, buffer overflow) are deliberately *not* represented here: the capture
//! loop absorbs them and surfaces them through counters and callbacks. Only
//! conditions that prevent an operation from completing at all — a failed
//! socket bind, an out-of-range channel index, mismatched sample arrays —
//! propagate as hard errors.
//!
//! ## Helper Constructors
//!
//! Use helper methods for common error scenarios:
//!
//! ```rust
//! use iqflow::AcquireError;
//!
//! let error = AcquireError::channel_out_of_range(7, 4);
//! assert!(!error.is_retryable());
//! ```

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for acquisition operations.
pub type Result<T, E = AcquireError> = std::result::Result<T, E>;

/// Main error type for acquisition operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AcquireError {
    #[error("Failed to bind UDP socket to {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Socket receive failed")]
    Socket {
        #[source]
        source: std::io::Error,
    },

    #[error("Channel {channel} out of range (configured channels: {num_channels})")]
    ChannelOutOfRange { channel: usize, num_channels: usize },

    #[error("I/Q sample arrays differ in length ({i_len} vs {q_len})")]
    SampleLengthMismatch { i_len: usize, q_len: usize },

    #[error("Packet decode failed")]
    Decode {
        #[from]
        source: DecodeError,
    },

    #[error("Acquisition is not running")]
    NotRunning,
}

/// Failure modes of the wire-format decoder.
///
/// The decoder is intentionally permissive: a payload whose length is not a
/// multiple of four is truncated, not rejected, and the declared `size_words`
/// field is never cross-checked against the datagram length. Only structurally
/// unreadable datagrams fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("Datagram too short for a header ({len} bytes, need at least 4)")]
    TooShort { len: usize },

    #[error("Datagram truncated inside {field} field (need {needed} bytes, have {available})")]
    Truncated { field: &'static str, needed: usize, available: usize },
}

impl AcquireError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            AcquireError::Bind { .. } => true,
            AcquireError::Socket { .. } => true,
            AcquireError::ChannelOutOfRange { .. } => false,
            AcquireError::SampleLengthMismatch { .. } => false,
            AcquireError::Decode { .. } => false,
            AcquireError::NotRunning => true,
        }
    }

    /// Helper constructor for socket bind failures.
    pub fn bind_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        AcquireError::Bind { addr, source }
    }

    /// Helper constructor for out-of-range channel indices.
    pub fn channel_out_of_range(channel: usize, num_channels: usize) -> Self {
        AcquireError::ChannelOutOfRange { channel, num_channels }
    }

    /// Helper constructor for mismatched I/Q array lengths.
    pub fn sample_length_mismatch(i_len: usize, q_len: usize) -> Self {
        AcquireError::SampleLengthMismatch { i_len, q_len }
    }
}
