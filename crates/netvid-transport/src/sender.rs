//! Frame partitioning and chunked transmission.
//!
//! Owns a socket (via a generic [`PacketSink`]), a remote endpoint, and the
//! monotonic `seq_id`/`frame_id` counters. `seq_id` and `frame_id` both start at
//! `u32::MAX` so their first increment yields `0`, matching the original's
//! `~0` initialization.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use netvid_core::protocol::{
    calc_pitch, get_chunk, get_frame_divisions, RemoteChunkHeader, RemoteHeader, RemoteModeHeader,
    DEFAULT_MAX_CHUNK_BYTES, PKT_CHUNK, PKT_MODE,
};
use netvid_core::PixelFrame;
use netvid_net::PacketSink;

/// Cancels an in-flight [`Sender::send_frame`] call from another thread/task.
/// Checked once per chunk; the current frame still finishes its chunk in
/// flight before the abort takes effect, matching the original's boundary
/// where the promise resolves "the next time a chunk boundary is reached".
#[derive(Clone, Default)]
pub struct SenderHandle {
    abort: Arc<AtomicBool>,
}

impl SenderHandle {
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }
}

pub struct Sender<S: PacketSink> {
    sink: S,
    remote: SocketAddr,
    seq_id: u32,
    frame_id: u32,
    max_chunk_bytes: u32,
    scratch: PixelFrame,
    abort: Arc<AtomicBool>,
}

impl<S: PacketSink> Sender<S> {
    pub fn new(sink: S, remote: SocketAddr) -> Self {
        Self::with_max_chunk_bytes(sink, remote, DEFAULT_MAX_CHUNK_BYTES)
    }

    pub fn with_max_chunk_bytes(sink: S, remote: SocketAddr, max_chunk_bytes: u32) -> Self {
        Self {
            sink,
            remote,
            seq_id: u32::MAX,
            frame_id: u32::MAX,
            max_chunk_bytes,
            scratch: PixelFrame::default(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn handle(&self) -> SenderHandle {
        SenderHandle { abort: Arc::clone(&self.abort) }
    }

    /// Resets per-frame chunk progress; does not touch `seq_id`/`frame_id`.
    pub fn restart(&self) {
        self.abort.store(false, Ordering::Relaxed);
    }

    fn next_seq_id(&mut self) -> u32 {
        self.seq_id = self.seq_id.wrapping_add(1);
        self.seq_id
    }

    /// Emits a `MODE` packet announcing `frame`'s geometry, then chunks and
    /// emits the frame's pixels in row-major order, one `CHUNK` packet per
    /// chunk. Sends are sequential, so each is paced through the underlying
    /// [`PacketSink`] before the next is issued.
    pub async fn send_frame(&mut self, frame: &PixelFrame) -> std::io::Result<()> {
        self.abort.store(false, Ordering::Relaxed);

        let mode = RemoteModeHeader {
            header: RemoteHeader { pkt_id: PKT_MODE, seq_id: self.next_seq_id() },
            width: frame.width,
            height: frame.height,
            pitch: frame.pitch,
            bpp: frame.bpp,
            aspect_ratio: frame.aspect_ratio,
        };
        self.sink.send(&mode.to_bytes(), self.remote).await?;

        self.frame_id = self.frame_id.wrapping_add(1);
        let (w_div, h_div) = get_frame_divisions(frame.width, frame.height, frame.bpp, self.max_chunk_bytes);
        let frame_chunks = w_div * h_div;
        let mut chunk_id = u32::MAX;

        'rows: for row in 0..h_div {
            for col in 0..w_div {
                if self.abort.load(Ordering::Relaxed) {
                    break 'rows;
                }

                let (row_begin, col_begin, row_end, col_end) =
                    get_chunk(frame.width, frame.height, w_div, h_div, row, col);
                chunk_id = chunk_id.wrapping_add(1);

                let width = col_end - col_begin;
                let height = row_end - row_begin;
                let pitch = calc_pitch(width, frame.bpp);
                self.scratch.resize(width, height, pitch, frame.bpp);
                let row_bytes = pitch as usize;
                for y in 0..height {
                    let src = &frame.row(col_begin, row_begin + y)[..row_bytes];
                    self.scratch.row_mut(0, y)[..row_bytes].copy_from_slice(src);
                }

                let header = RemoteChunkHeader {
                    header: RemoteHeader { pkt_id: PKT_CHUNK, seq_id: self.next_seq_id() },
                    frame_id: self.frame_id,
                    frame_chunks,
                    chunk_id,
                    x: col_begin,
                    y: row_begin,
                    width,
                    height,
                    pitch,
                    bpp: frame.bpp,
                };

                let mut datagram = header.to_bytes();
                datagram.extend_from_slice(&self.scratch.as_bytes()[..row_bytes * height as usize]);

                if let Err(e) = self.sink.send(&datagram, self.remote).await {
                    tracing::warn!("chunk {chunk_id} send failed: {e}");
                }
            }
        }

        Ok(())
    }
}
