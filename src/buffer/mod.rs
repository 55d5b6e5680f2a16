//! Multi-channel circular sample storage
//!
//! One fixed-capacity ring per hardware channel decouples the arrival rate of
//! the receive task from the consumption rate of processing threads. Each
//! channel locks independently; operations on different channels never
//! contend.

mod ring;
mod set;

pub use ring::{ChannelRing, ChannelRingStats};
pub use set::RingBufferSet;
