//! VITA-49 wire format (PVAN-11 profile)
//!
//! Decodes the datagram framing used by the Crimson TNG receive path and
//! provides an encoder for loopback simulation and testing.

mod format;

pub use format::{TRAILER_SIZE, TSF_FREE_RUNNING, VitaPacket};
