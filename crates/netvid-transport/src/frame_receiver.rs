//! Double-buffered frame assembly.
//!
//! Layers two [`ChunkValidator`]s over a [`BatchedReceiver`] (C6): a "live"
//! validator runs inside the batched receiver's own I/O task, hooked in via
//! [`BatchedReceiver::spawn_with_hook`], purely to notice frame completion as
//! early as possible and wake a waiting consumer through a `Mutex<bool>` +
//! `Condvar` pair -- no pixel assembly happens there. The consumer thread
//! (driven by [`FrameReceiver::process_packets`]) runs a second, "processed"
//! validator over the same packets, assembles pixels into a back buffer, and
//! flips it to the front once its own copy of the frame completes. Running
//! two validators over the same stream is deliberate: it decouples "wake up,
//! a frame is ready" latency from the heavier pixel-copying work.

use std::net::SocketAddr;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::debug;

use netvid_core::protocol::{calc_pitch, RemoteChunkHeader, RemoteModeHeader, PKT_MODE};
use netvid_core::PixelFrame;

use crate::batched_receiver::BatchedReceiver;
use crate::chunk_validator::{log_missing_chunks, ChunkEvent, ChunkValidator};

const SEQ_DIFF_OUT_OF_RANGE: u32 = 1 << 31;

/// Whether `seq_id` is strictly newer than `last_seen` under wraparound-safe
/// arithmetic: the unsigned distance from `last_seen` to `seq_id` must be
/// nonzero and less than half the sequence space.
pub fn check_new(last_seen: u32, seq_id: u32) -> bool {
    let diff = seq_id.wrapping_sub(last_seen);
    diff != 0 && diff < SEQ_DIFF_OUT_OF_RANGE
}

/// Advances `last_seen` to `seq_id` if it is newer; a no-op (the packet is a
/// duplicate or fell outside the reordering window) otherwise. Returns
/// whether it advanced.
pub fn expire(last_seen: &mut u32, seq_id: u32) -> bool {
    if check_new(*last_seen, seq_id) {
        *last_seen = seq_id;
        true
    } else {
        false
    }
}

/// Clears `stored` once the stream's `current` `seq_id` has drifted far
/// enough past it that `check_new`'s wraparound window can no longer be
/// trusted to decide "newer" -- `spec.md` §4.7's `expire(stored)`: clear
/// `stored` if `(current - stored) mod 2^32 >= 2^31`. A no-op once `stored`
/// is already `None`. Without this, a `last_mode_seq_id` set long before a
/// `seq_id` wraparound could permanently reject every later, genuinely newer
/// `MODE` packet once the unsigned distance between them exceeds the window.
fn expire_stale_mode(stored: &mut Option<u32>, current: u32) {
    if let Some(value) = *stored {
        if current.wrapping_sub(value) >= SEQ_DIFF_OUT_OF_RANGE {
            *stored = None;
        }
    }
}

struct PendingFrame {
    ready: Mutex<bool>,
    condvar: Condvar,
}

pub struct FrameReceiver {
    batched: BatchedReceiver,
    front_buffer: Arc<Mutex<PixelFrame>>,
    front_frame_id: Arc<Mutex<Option<u32>>>,
    pending: Arc<PendingFrame>,
    back_buffer: PixelFrame,
    processed_validator: ChunkValidator,
    /// `seq_id` of the last accepted `MODE` packet, per `spec.md` §4.7's
    /// sequence-window de-duplication. `None` until the first `MODE` packet
    /// of the stream arrives, so that first packet -- whatever `seq_id` it
    /// carries -- is unconditionally accepted rather than compared against a
    /// bogus default.
    last_mode_seq_id: Option<u32>,
    /// Highest `seq_id` observed across every packet of the stream, updated
    /// on every packet via [`expire`]. Used to decide when `last_mode_seq_id`
    /// has drifted stale enough to clear, per `spec.md` §4.7's `expire(stored)`.
    current_seq_id: u32,
}

impl FrameReceiver {
    pub fn spawn(socket: UdpSocket) -> (Self, JoinHandle<()>) {
        let pending = Arc::new(PendingFrame { ready: Mutex::new(false), condvar: Condvar::new() });
        let live_pending = Arc::clone(&pending);
        let mut live_validator = ChunkValidator::new();

        let (batched, handle) = BatchedReceiver::spawn_with_hook(socket, move |data: &[u8], _remote| {
            if let ChunkEvent::Chunk { completed: Some(_), .. } = live_validator.process(data) {
                *live_pending.ready.lock().unwrap() = true;
                live_pending.condvar.notify_one();
            }
        });

        let receiver = Self {
            batched,
            front_buffer: Arc::new(Mutex::new(PixelFrame::default())),
            front_frame_id: Arc::new(Mutex::new(None)),
            pending,
            back_buffer: PixelFrame::default(),
            processed_validator: ChunkValidator::new(),
            last_mode_seq_id: None,
            current_seq_id: 0,
        };
        (receiver, handle)
    }

    /// Blocks the calling (non-async) thread until the I/O task's live
    /// validator has observed a completed frame since the last call.
    pub fn wait_for_frame(&self) {
        let mut ready = self.pending.ready.lock().unwrap();
        while !*ready {
            ready = self.pending.condvar.wait(ready).unwrap();
        }
        *ready = false;
    }

    /// Drains the I/O task's pending batch and feeds every packet through the
    /// processed validator, assembling pixels and flipping buffers as frames
    /// complete. Blocks the calling thread until the I/O task responds.
    pub fn process_packets(&mut self) {
        let batch = self.batched.flip_buffer_packets_blocking();
        let packets: Vec<(Vec<u8>, SocketAddr)> =
            batch.iter().map(|(data, remote)| (data.to_vec(), remote)).collect();
        for (data, remote) in packets {
            self.handle_packet(&data, remote);
        }
    }

    fn handle_packet(&mut self, data: &[u8], remote: SocketAddr) {
        let _ = remote;
        let Some(header) = netvid_core::protocol::RemoteHeader::read(data) else {
            return;
        };

        expire(&mut self.current_seq_id, header.seq_id);
        expire_stale_mode(&mut self.last_mode_seq_id, self.current_seq_id);

        if header.pkt_id == PKT_MODE {
            if let Some(mode) = RemoteModeHeader::read(data) {
                let accepted = self.last_mode_seq_id.map_or(true, |last| check_new(last, mode.header.seq_id));
                if accepted {
                    self.last_mode_seq_id = Some(mode.header.seq_id);
                    if self.back_buffer.width != mode.width
                        || self.back_buffer.height != mode.height
                        || self.back_buffer.bpp != mode.bpp
                    {
                        self.back_buffer.resize(mode.width, mode.height, mode.pitch, mode.bpp);
                    }
                    self.back_buffer.aspect_ratio = mode.aspect_ratio;
                }
            }
            return;
        }

        match self.processed_validator.process(data) {
            ChunkEvent::Ignored => {}
            ChunkEvent::Rejected => debug!("rejected stale or far-future chunk"),
            ChunkEvent::Chunk { header, payload, preempted, completed } => {
                if let Some(summary) = preempted {
                    log_missing_chunks(summary.frame_id, &summary.chunks_received);
                }
                grow_and_copy(&mut self.back_buffer, &header, payload);
                if let Some(summary) = completed {
                    log_missing_chunks(summary.frame_id, &summary.chunks_received);
                    self.flip_buffers(summary.frame_id);
                }
            }
        }
    }

    fn flip_buffers(&mut self, frame_id: u32) {
        {
            let mut front = self.front_buffer.lock().unwrap();
            std::mem::swap(&mut *front, &mut self.back_buffer);
            self.back_buffer.resize(front.width, front.height, front.pitch, front.bpp);
            self.back_buffer.aspect_ratio = front.aspect_ratio;
            self.back_buffer.as_bytes_mut().copy_from_slice(front.as_bytes());
        }
        *self.front_frame_id.lock().unwrap() = Some(frame_id);
    }

    pub fn lock_front_buffer(&self) -> MutexGuard<'_, PixelFrame> {
        self.front_buffer.lock().unwrap()
    }

    pub fn front_frame_id(&self) -> Option<u32> {
        *self.front_frame_id.lock().unwrap()
    }

    pub fn front_buffer_handle(&self) -> Arc<Mutex<PixelFrame>> {
        Arc::clone(&self.front_buffer)
    }
}

/// Grows `frame` to at least cover `header`'s chunk rectangle, then copies the
/// chunk's payload into place at `(header.x, header.y)`, row by row. Growth is
/// driven purely by the chunk header -- never by a stored `MODE` packet -- so
/// chunks that arrive before the enclosing `MODE` header (or for a `MODE`
/// packet that was itself dropped or out of window) still land correctly,
/// per `spec.md` §4.7's back-buffer growth tolerance. Growing in place (rather
/// than reallocating exactly to each chunk) means a frame assembled from a
/// partial set of chunks still presents a consistently-shaped picture.
fn grow_and_copy(frame: &mut PixelFrame, header: &RemoteChunkHeader, payload: &[u8]) {
    let width = frame.width.max(header.x + header.width);
    let height = frame.height.max(header.y + header.height);
    if width != frame.width || height != frame.height || frame.bpp != header.bpp {
        // Never let a regrow shrink the pitch below whatever a prior MODE or
        // chunk growth already established -- a MODE packet is free to
        // declare a pitch padded beyond `ceil(width*bpp/8)` (spec.md §3), and
        // a later width-driven regrow must not silently narrow it back down.
        let pitch = frame.pitch.max(calc_pitch(width, header.bpp));
        frame.resize(width, height, pitch, header.bpp);
    }

    let row_bytes = calc_pitch(header.width, header.bpp) as usize;
    for y in 0..header.height {
        let src_start = y as usize * row_bytes;
        let src = &payload[src_start..src_start + row_bytes];
        let dst = &mut frame.row_mut(header.x, header.y + y)[..row_bytes];
        dst.copy_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netvid_core::protocol::{RemoteHeader, RemoteVsyncHeader, PKT_CHUNK, PKT_VSYNC};

    #[test]
    fn check_new_accepts_forward_progress_and_rejects_duplicates() {
        assert!(check_new(10, 11));
        assert!(!check_new(10, 10));
        assert!(!check_new(10, 9));
    }

    #[test]
    fn check_new_treats_wraparound_as_forward_progress() {
        assert!(check_new(u32::MAX, 0));
        assert!(!check_new(0, u32::MAX));
    }

    #[test]
    fn expire_advances_only_on_genuinely_new_sequence_ids() {
        let mut last = 5u32;
        assert!(expire(&mut last, 6));
        assert_eq!(last, 6);
        assert!(!expire(&mut last, 3));
        assert_eq!(last, 6);
    }

    #[test]
    fn expire_stale_mode_clears_once_past_the_half_range_window() {
        let mut stored = Some(100u32);
        expire_stale_mode(&mut stored, 100 + (SEQ_DIFF_OUT_OF_RANGE - 1));
        assert_eq!(stored, Some(100), "still within window, must not clear yet");
        expire_stale_mode(&mut stored, 100u32.wrapping_add(SEQ_DIFF_OUT_OF_RANGE));
        assert_eq!(stored, None, "distance reached 2^31, must clear");
        expire_stale_mode(&mut stored, 12345);
        assert_eq!(stored, None, "already-cleared stored stays cleared");
    }

    #[test]
    fn grow_and_copy_places_a_chunk_at_its_offset() {
        let header = RemoteChunkHeader {
            header: RemoteHeader { pkt_id: PKT_CHUNK, seq_id: 0 },
            frame_id: 0,
            frame_chunks: 1,
            chunk_id: 0,
            x: 2,
            y: 1,
            width: 2,
            height: 1,
            pitch: 2,
            bpp: 8,
        };
        let payload = [9u8, 9];

        let mut frame = PixelFrame::default();
        grow_and_copy(&mut frame, &header, &payload);

        // Grown purely from the chunk header: (x=2, y=1, w=2, h=1) needs a
        // frame at least 4 wide and 2 tall, with no mode packet involved.
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(&frame.row(2, 1)[..2], &[9, 9]);
        assert_eq!(&frame.row(0, 1)[..2], &[0, 0]);
    }

    #[test]
    fn grow_and_copy_never_shrinks_a_previously_established_pitch() {
        let mut frame = PixelFrame::default();
        // A MODE packet declared a pitch padded beyond ceil(width*bpp/8).
        frame.resize(4, 2, 16, 8);
        assert_eq!(frame.pitch, 16);

        // A chunk forces a width-driven regrow; ceil(6*8/8) = 6, well under
        // the pitch MODE already established, which must survive untouched.
        let header = RemoteChunkHeader {
            header: RemoteHeader { pkt_id: PKT_CHUNK, seq_id: 0 },
            frame_id: 0,
            frame_chunks: 1,
            chunk_id: 0,
            x: 4,
            y: 0,
            width: 2,
            height: 1,
            pitch: 2,
            bpp: 8,
        };
        let payload = [7u8, 7];
        grow_and_copy(&mut frame, &header, &payload);

        assert_eq!(frame.width, 6);
        assert_eq!(frame.pitch, 16, "regrow must not narrow the established pitch");
    }

    #[tokio::test]
    async fn first_mode_packet_is_accepted_even_with_seq_id_zero() {
        // Sender::seq_id starts at u32::MAX, so the very first packet ever
        // emitted (frame 0's MODE header) always carries seq_id == 0 -- the
        // same value an unset `u32` sentinel would start at. A bare-u32
        // sentinel would reject it as "not newer"; `Option<u32>` must not.
        let mode = RemoteModeHeader {
            header: RemoteHeader { pkt_id: PKT_MODE, seq_id: 0 },
            width: 4,
            height: 2,
            pitch: 4,
            bpp: 8,
            aspect_ratio: 2.0,
        };

        let recv_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let recv_addr = recv_socket.local_addr().unwrap();
        let (mut receiver, _handle) = FrameReceiver::spawn(recv_socket);

        let send_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        send_socket.send_to(&mode.to_bytes(), recv_addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        tokio::task::spawn_blocking(move || {
            receiver.process_packets();
            assert_eq!(receiver.last_mode_seq_id, Some(0));
            assert_eq!(receiver.back_buffer.width, 4);
            assert_eq!(receiver.back_buffer.height, 2);
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn last_mode_seq_id_expires_once_current_seq_id_drifts_past_the_window() {
        let recv_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let (mut receiver, _handle) = FrameReceiver::spawn(recv_socket);
        let remote: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let mode = |seq_id: u32, width: u32| RemoteModeHeader {
            header: RemoteHeader { pkt_id: PKT_MODE, seq_id },
            width,
            height: 2,
            pitch: width,
            bpp: 8,
            aspect_ratio: 2.0,
        };
        let vsync = |seq_id: u32| RemoteVsyncHeader { header: RemoteHeader { pkt_id: PKT_VSYNC, seq_id } };

        receiver.handle_packet(&mode(100, 4).to_bytes(), remote);
        assert_eq!(receiver.last_mode_seq_id, Some(100));
        assert_eq!(receiver.back_buffer.width, 4);

        // Advance current_seq_id in two hops, each within the half-range
        // window check_new allows, until its distance from last_mode_seq_id
        // reaches exactly 2^31.
        let midpoint = 100u32.wrapping_add(SEQ_DIFF_OUT_OF_RANGE - 1);
        receiver.handle_packet(&vsync(midpoint).to_bytes(), remote);
        assert_eq!(receiver.last_mode_seq_id, Some(100), "still inside the window");

        receiver.handle_packet(&vsync(midpoint.wrapping_add(1)).to_bytes(), remote);
        assert_eq!(receiver.last_mode_seq_id, None, "expired once distance hit 2^31");

        // A MODE packet carrying a far-older seq_id would normally be
        // rejected by check_new against the stale stored value; with it
        // expired, the next MODE packet is unconditionally accepted again.
        receiver.handle_packet(&mode(50, 6).to_bytes(), remote);
        assert_eq!(receiver.last_mode_seq_id, Some(50));
        assert_eq!(receiver.back_buffer.width, 6);
    }

    #[tokio::test]
    async fn chunk_arriving_before_any_mode_packet_still_assembles_and_flips() {
        let header = RemoteChunkHeader {
            header: RemoteHeader { pkt_id: PKT_CHUNK, seq_id: 0 },
            frame_id: 0,
            frame_chunks: 1,
            chunk_id: 0,
            x: 0,
            y: 0,
            width: 2,
            height: 2,
            pitch: 2,
            bpp: 8,
        };
        let mut datagram = header.to_bytes();
        datagram.extend_from_slice(&[1, 2, 3, 4]);

        let recv_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let recv_addr = recv_socket.local_addr().unwrap();
        let (mut receiver, _handle) = FrameReceiver::spawn(recv_socket);

        let send_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        send_socket.send_to(&datagram, recv_addr).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        tokio::task::spawn_blocking(move || {
            receiver.process_packets();
            assert_eq!(receiver.front_frame_id(), Some(0));
            let front = receiver.lock_front_buffer();
            assert_eq!(front.width, 2);
            assert_eq!(front.height, 2);
            assert_eq!(front.as_bytes(), &[1, 2, 3, 4]);
        })
        .await
        .unwrap();
    }
}
