//! Pacing strategies for outgoing datagrams: [`RateLimitedSender`] bounds the
//! send rate to a configured byte budget, [`UnlimitedSender`] sends as fast as
//! the socket allows. Both implement [`PacketSink`] so [`Sender`] in
//! `netvid-transport` is generic over the pacing strategy, mirroring the
//! original `sender<sender_impl>` template.
//!
//! [`Sender`]: https://docs.rs/netvid-transport (crate not a dependency here; see netvid-transport::sender)

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;

/// Default rate: 90 Mbps expressed in bytes/second.
pub const DEFAULT_MAX_RATE_BYTES_PER_SECOND: u64 = 90 * 1024 * 1024 / 8;

#[async_trait]
pub trait PacketSink: Send {
    async fn send(&mut self, datagram: &[u8], remote: SocketAddr) -> std::io::Result<usize>;
}

pub struct UnlimitedSender {
    socket: UdpSocket,
}

impl UnlimitedSender {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl PacketSink for UnlimitedSender {
    async fn send(&mut self, datagram: &[u8], remote: SocketAddr) -> std::io::Result<usize> {
        self.socket.send_to(datagram, remote).await
    }
}

pub struct RateLimitedSender {
    socket: UdpSocket,
    max_rate_bytes_per_second: u64,
}

impl RateLimitedSender {
    pub fn new(socket: UdpSocket) -> Self {
        Self::with_rate(socket, DEFAULT_MAX_RATE_BYTES_PER_SECOND)
    }

    pub fn with_rate(socket: UdpSocket, max_rate_bytes_per_second: u64) -> Self {
        Self { socket, max_rate_bytes_per_second }
    }

    fn delay_for(&self, bytes: usize) -> Duration {
        let micros = (bytes as u64).saturating_mul(1_000_000) / self.max_rate_bytes_per_second.max(1);
        Duration::from_micros(micros)
    }
}

#[async_trait]
impl PacketSink for RateLimitedSender {
    /// Starts the datagram send and a pacing timer together, completing only
    /// once both finish -- a send error returns immediately without waiting for
    /// the timer (mirrors `transfer_complete` in the original, which never waits
    /// on `expired` once an error is observed).
    async fn send(&mut self, datagram: &[u8], remote: SocketAddr) -> std::io::Result<usize> {
        let delay = self.delay_for(datagram.len());
        let send_fut = self.socket.send_to(datagram, remote);
        let sleep_fut = tokio::time::sleep(delay);
        tokio::pin!(send_fut, sleep_fut);

        let mut sent: Option<std::io::Result<usize>> = None;
        let mut elapsed = delay.is_zero();
        loop {
            tokio::select! {
                res = &mut send_fut, if sent.is_none() => {
                    match res {
                        Ok(n) => sent = Some(Ok(n)),
                        Err(e) => return Err(e),
                    }
                }
                _ = &mut sleep_fut, if !elapsed => {
                    elapsed = true;
                }
            }
            if sent.is_some() && elapsed {
                return sent.unwrap();
            }
        }
    }
}
