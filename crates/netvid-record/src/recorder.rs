//! Captures every datagram arriving on a bound endpoint to a recording file,
//! stamped with elapsed time since the recorder started -- a plain listener,
//! distinct from the batched/frame receiver used for display, matching the
//! original's separate `netvid::receiver`.

use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{interval, Instant};
use tracing::warn;

use crate::recording::RecordingWriter;

const MAX_DATAGRAM_BYTES: usize = 64 * 1024;

pub struct Recorder<W> {
    socket: UdpSocket,
    writer: RecordingWriter<W>,
}

impl<W: tokio::io::AsyncWrite + Unpin> Recorder<W> {
    pub fn new(socket: UdpSocket, writer: RecordingWriter<W>) -> Self {
        Self { socket, writer }
    }

    /// Runs until `shutdown` resolves (typically `tokio::signal::ctrl_c()`),
    /// then flushes and returns the total bytes written. A 1-second interval
    /// logs cumulative progress.
    pub async fn run(mut self, shutdown: impl std::future::Future<Output = ()>) -> std::io::Result<u64> {
        tokio::pin!(shutdown);
        let mut status = interval(Duration::from_secs(1));
        status.tick().await;
        let start = Instant::now();
        let mut buf = vec![0u8; MAX_DATAGRAM_BYTES];

        loop {
            tokio::select! {
                res = self.socket.recv_from(&mut buf) => {
                    let len = match res {
                        Ok((len, _remote)) => len,
                        Err(e) => {
                            warn!("UDP receive error: {e}");
                            continue;
                        }
                    };
                    let elapsed_ns = start.elapsed().as_nanos() as u64;
                    self.writer.write_packet(elapsed_ns, &buf[..len]).await?;
                }
                _ = status.tick() => {
                    self.writer.flush().await?;
                    tracing::info!(bytes_written = self.writer.bytes_written(), "recording status");
                }
                _ = &mut shutdown => break,
            }
        }

        self.writer.flush().await?;
        Ok(self.writer.bytes_written())
    }
}
