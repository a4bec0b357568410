//! Per-frame reassembly state machine: tolerates loss, out-of-order delivery,
//! sequence-number wraparound, and stream discontinuities.
//!
//! The original drives this with `on_chunk`/`on_frame_completed` member
//! closures invoked synchronously from `process()`. A direct port via stored
//! boxed closures fights the borrow checker for no benefit once a caller (the
//! frame receiver) needs two closures simultaneously borrowing overlapping
//! `&mut` state. `process` instead returns a [`ChunkEvent`] describing what
//! happened; callers match on it. The state machine steps are unchanged.

use std::time::{Duration, Instant};

use netvid_core::protocol::{RemoteChunkHeader, CHUNK_HEADER_LEN, PKT_CHUNK};

const FRAME_SWITCH_WINDOW: u32 = 60;
const FRAME_IDLE_TIMEOUT: Duration = Duration::from_secs(3);

/// A frame's chunk-completion state at the moment it stopped being the active
/// frame (either because it completed, or because a newer frame preempted it).
/// Carried so callers can log missing chunks without re-borrowing the
/// validator.
#[derive(Debug, Clone)]
pub struct FrameSummary {
    pub frame_id: u32,
    pub chunks_received: Vec<bool>,
}

#[derive(Debug)]
pub enum ChunkEvent<'a> {
    /// Not a chunk packet (wrong `pkt_id`, or too short to parse).
    Ignored,
    /// A chunk packet for a frame that is no longer the active one (stale or
    /// far-future `frame_id`); consumed but not assembled.
    Rejected,
    Chunk {
        header: RemoteChunkHeader,
        payload: &'a [u8],
        /// The previously active frame, if this packet's frame switch forced
        /// it to end before every chunk arrived.
        preempted: Option<FrameSummary>,
        /// This packet's frame, if it was the last chunk needed to complete it.
        completed: Option<FrameSummary>,
    },
}

impl<'a> ChunkEvent<'a> {
    pub fn consumed(&self) -> bool {
        !matches!(self, ChunkEvent::Ignored)
    }
}

pub struct ChunkValidator {
    current_frame_id: Option<u32>,
    frame_id_assign_time: Instant,
    chunks_received: Vec<bool>,
}

impl Default for ChunkValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkValidator {
    pub fn new() -> Self {
        Self {
            current_frame_id: None,
            frame_id_assign_time: Instant::now(),
            chunks_received: Vec::new(),
        }
    }

    pub fn current_frame_id(&self) -> Option<u32> {
        self.current_frame_id
    }

    pub fn is_complete(&self) -> bool {
        !self.chunks_received.is_empty() && self.chunks_received.iter().all(|&b| b)
    }

    pub fn process<'a>(&mut self, packet: &'a [u8]) -> ChunkEvent<'a> {
        let Some(rch) = RemoteChunkHeader::read(packet) else {
            return ChunkEvent::Ignored;
        };
        if rch.header.pkt_id != PKT_CHUNK {
            return ChunkEvent::Ignored;
        }

        let now = Instant::now();
        let mut preempted = None;

        let switch = match self.current_frame_id {
            None => true,
            Some(cur) => {
                now.duration_since(self.frame_id_assign_time) > FRAME_IDLE_TIMEOUT || {
                    let diff = rch.frame_id.wrapping_sub(cur);
                    diff > 0 && diff < FRAME_SWITCH_WINDOW
                }
            }
        };

        if switch {
            if let Some(cur) = self.current_frame_id.take() {
                let threshold = cur.wrapping_add(1);
                if rch.frame_id > threshold {
                    tracing::debug!(
                        from = threshold,
                        to = rch.frame_id.wrapping_sub(1),
                        "missed frame(s)"
                    );
                }
                preempted = Some(FrameSummary {
                    frame_id: cur,
                    chunks_received: std::mem::take(&mut self.chunks_received),
                });
            }
            self.current_frame_id = Some(rch.frame_id);
            self.frame_id_assign_time = now;
            self.chunks_received.clear();
        }

        if self.current_frame_id != Some(rch.frame_id) {
            return ChunkEvent::Rejected;
        }

        if self.chunks_received.len() != rch.frame_chunks as usize {
            self.chunks_received = vec![false; rch.frame_chunks as usize];
        }
        if (rch.chunk_id as usize) < self.chunks_received.len() {
            self.chunks_received[rch.chunk_id as usize] = true;
        }

        let payload = &packet[CHUNK_HEADER_LEN..];

        let completed = if self.is_complete() {
            let frame_id = self.current_frame_id.take().unwrap();
            Some(FrameSummary {
                frame_id,
                chunks_received: std::mem::take(&mut self.chunks_received),
            })
        } else {
            None
        };

        ChunkEvent::Chunk { header: rch, payload, preempted, completed }
    }
}

/// Logs contiguous runs of missing (`false`) entries in a chunk-received
/// bitmap, e.g. `"missing chunks in frame 12: 3-7, 9 (6 total)"`.
pub fn log_missing_chunks(frame_id: u32, chunks_received: &[bool]) {
    if chunks_received.is_empty() || chunks_received.iter().all(|&b| b) {
        return;
    }

    let mut ranges = Vec::new();
    let mut missing = 0usize;
    let mut i = 0;
    while i < chunks_received.len() {
        if !chunks_received[i] {
            let start = i;
            while i < chunks_received.len() && !chunks_received[i] {
                i += 1;
            }
            missing += i - start;
            if i - start > 1 {
                ranges.push(format!("{start}-{}", i - 1));
            } else {
                ranges.push(format!("{start}"));
            }
        } else {
            i += 1;
        }
    }

    tracing::warn!(
        frame_id,
        missing,
        "missing chunks in frame {frame_id}: {} ({missing} total)",
        ranges.join(", ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use netvid_core::protocol::RemoteHeader;

    fn chunk_packet(frame_id: u32, frame_chunks: u32, chunk_id: u32, seq_id: u32) -> Vec<u8> {
        RemoteChunkHeader {
            header: RemoteHeader { pkt_id: PKT_CHUNK, seq_id },
            frame_id,
            frame_chunks,
            chunk_id,
            x: 0,
            y: 0,
            width: 4,
            height: 1,
            pitch: 4,
            bpp: 8,
        }
        .to_bytes()
        .into_iter()
        .chain([1, 2, 3, 4])
        .collect()
    }

    #[test]
    fn completes_frame_once_every_chunk_arrives() {
        let mut v = ChunkValidator::new();
        assert!(matches!(v.process(&chunk_packet(0, 3, 0, 0)), ChunkEvent::Chunk { completed: None, .. }));
        assert!(matches!(v.process(&chunk_packet(0, 3, 1, 1)), ChunkEvent::Chunk { completed: None, .. }));
        let ev = v.process(&chunk_packet(0, 3, 2, 2));
        let ChunkEvent::Chunk { completed: Some(summary), .. } = ev else {
            panic!("expected completion");
        };
        assert_eq!(summary.frame_id, 0);
        assert!(summary.chunks_received.iter().all(|&b| b));
        assert_eq!(v.current_frame_id(), None);
    }

    #[test]
    fn missing_chunk_is_tolerated_and_reported_on_switch() {
        let mut v = ChunkValidator::new();
        v.process(&chunk_packet(0, 3, 0, 0));
        // chunk_id 1 is dropped
        v.process(&chunk_packet(0, 3, 2, 1));
        // next frame preempts the incomplete one
        let ev = v.process(&chunk_packet(1, 2, 0, 2));
        let ChunkEvent::Chunk { preempted: Some(summary), .. } = ev else {
            panic!("expected preemption of frame 0");
        };
        assert_eq!(summary.frame_id, 0);
        assert_eq!(summary.chunks_received, vec![true, false, true]);
    }

    #[test]
    fn frame_id_wraparound_is_treated_as_advancement() {
        let mut v = ChunkValidator::new();
        v.process(&chunk_packet(u32::MAX, 1, 0, 0));
        assert_eq!(v.current_frame_id(), Some(u32::MAX));
        // u32::MAX -> 0 wraps to a diff of 1, within the switch window.
        let ev = v.process(&chunk_packet(0, 1, 0, 1));
        assert!(matches!(ev, ChunkEvent::Chunk { completed: Some(_), .. }));
    }

    #[test]
    fn stale_frame_is_rejected_not_reassembled() {
        let mut v = ChunkValidator::new();
        v.process(&chunk_packet(100, 2, 0, 0));
        v.process(&chunk_packet(100, 2, 1, 1));
        // already completed and cleared; a chunk for the now-stale id 100
        // switches are driven purely by window/timeout, so a far-past id
        // re-arriving looks like "not currently in-window" and is rejected
        // once a different frame has taken over.
        v.process(&chunk_packet(200, 2, 0, 2));
        let ev = v.process(&chunk_packet(100, 2, 1, 3));
        assert!(matches!(ev, ChunkEvent::Rejected));
    }

    #[test]
    fn non_chunk_packet_is_ignored() {
        let mut v = ChunkValidator::new();
        let mode = RemoteHeader { pkt_id: netvid_core::protocol::PKT_MODE, seq_id: 0 };
        let mut buf = Vec::new();
        buf.extend_from_slice(&mode.pkt_id.to_le_bytes());
        buf.extend_from_slice(&mode.seq_id.to_le_bytes());
        assert!(matches!(v.process(&buf), ChunkEvent::Ignored));
    }
}
