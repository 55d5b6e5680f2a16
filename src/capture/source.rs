//! Datagram sources for the capture loop

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{info, trace};

use crate::{AcquireError, Result};

/// Maximum UDP datagram size; receive buffers are sized to this.
const MAX_DATAGRAM: usize = 65536;

/// Trait for datagram sources feeding the capture loop.
///
/// Sources abstract over where raw packets come from (a live UDP socket, a
/// scripted simulation) and handle their own waiting internally. `recv` is
/// the capture loop's sole suspension point.
#[async_trait::async_trait]
pub trait PacketSource: Send + 'static {
    /// Receive the next raw datagram.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - a datagram arrived
    /// - `Ok(None)` - nothing received this round (the loop just continues)
    /// - `Err(e)` - transient receive failure; the loop logs and continues
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Live UDP source bound to a local address.
#[derive(Debug)]
pub struct UdpSource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpSource {
    /// Bind a UDP socket for receiving sample datagrams.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Bind`] if the address cannot be bound
    /// (e.g., port already in use).
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket =
            UdpSocket::bind(addr).await.map_err(|source| AcquireError::Bind { addr, source })?;
        let local = socket.local_addr().map_err(|source| AcquireError::Socket { source })?;
        info!("UDP source listening on {local}");
        Ok(Self { socket, buf: vec![0u8; MAX_DATAGRAM] })
    }

    /// The local address this source is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}

#[async_trait::async_trait]
impl PacketSource for UdpSource {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        let (len, from) = self
            .socket
            .recv_from(&mut self.buf)
            .await
            .map_err(|source| AcquireError::Socket { source })?;
        trace!(len, %from, "Received datagram");
        Ok(Some(self.buf[..len].to_vec()))
    }
}
