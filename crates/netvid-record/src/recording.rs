//! On-disk packet capture format: `{timestamp_ns: u64 LE, payload_len: u32 LE,
//! payload}` repeated until EOF.
//!
//! The original stores a native `steady_clock::duration` (16 bytes on most
//! 64-bit platforms, not portable across platforms or even compilers). This
//! normalizes the timestamp to a little-endian `u64` nanosecond count, a
//! strict superset of the precision any steady clock offers.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const RECORD_HEADER_LEN: usize = 8 + 4;

#[derive(Debug, Clone)]
pub struct RecordedPacket {
    pub timestamp_ns: u64,
    pub payload: Vec<u8>,
}

pub struct RecordingWriter<W> {
    inner: W,
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin> RecordingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, bytes_written: 0 }
    }

    pub async fn write_packet(&mut self, timestamp_ns: u64, payload: &[u8]) -> io::Result<()> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        header[0..8].copy_from_slice(&timestamp_ns.to_le_bytes());
        header[8..12].copy_from_slice(&(payload.len() as u32).to_le_bytes());
        self.inner.write_all(&header).await?;
        self.inner.write_all(payload).await?;
        self.bytes_written += (RECORD_HEADER_LEN + payload.len()) as u64;
        Ok(())
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

pub struct RecordingReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> RecordingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next packet, or `None` at a clean end-of-file -- the
    /// sentinel the player/slicer traversal uses instead of constructing
    /// `NetvidError::ReplayEof`.
    pub async fn read_packet(&mut self) -> io::Result<Option<RecordedPacket>> {
        let mut header = [0u8; RECORD_HEADER_LEN];
        match self.inner.read_exact(&mut header).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e),
        }
        let timestamp_ns = u64::from_le_bytes(header[0..8].try_into().unwrap());
        let len = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;
        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).await?;
        Ok(Some(RecordedPacket { timestamp_ns, payload }))
    }
}
