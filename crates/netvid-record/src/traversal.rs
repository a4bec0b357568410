//! Shared seek/stop traversal over a recording, reused verbatim by the player
//! (paced, sent over UDP) and the slicer (unpaced, rewritten to a file). Runs
//! a [`ChunkValidator`] purely to track `frame_id` progress; no pixels are
//! assembled.

use std::io;

use netvid_transport::ChunkValidator;
use tokio::io::AsyncRead;

use crate::recording::{RecordedPacket, RecordingReader};

pub struct Traversal<R> {
    reader: RecordingReader<R>,
    validator: ChunkValidator,
    seek: u32,
    stop: Option<u32>,
    held: Option<RecordedPacket>,
    seeked: bool,
    stopped: bool,
}

impl<R: AsyncRead + Unpin> Traversal<R> {
    pub fn new(reader: RecordingReader<R>, seek: u32, stop: Option<u32>) -> Self {
        Self {
            reader,
            validator: ChunkValidator::new(),
            seek,
            stop,
            held: None,
            seeked: false,
            stopped: false,
        }
    }

    pub fn current_frame_id(&self) -> Option<u32> {
        self.validator.current_frame_id()
    }

    /// Fast-forwards until the validator's in-progress frame id is at least
    /// `self.seek`; the packet that crossed that threshold is held, not
    /// discarded, and becomes the first packet `next()` returns.
    async fn seek_forward(&mut self) -> io::Result<()> {
        self.seeked = true;
        if self.seek == 0 {
            return Ok(());
        }
        loop {
            let Some(packet) = self.reader.read_packet().await? else {
                return Ok(());
            };
            let _ = self.validator.process(&packet.payload);
            if self.validator.current_frame_id().map_or(false, |id| id >= self.seek) {
                self.held = Some(packet);
                return Ok(());
            }
        }
    }

    fn past_stop_bound(&self) -> bool {
        match self.stop {
            Some(stop) => self.validator.current_frame_id().map_or(false, |id| id >= stop),
            None => false,
        }
    }

    /// Returns the next surviving packet, or `None` once the recording or the
    /// `--stop` bound is reached. A freshly-read packet that crosses the stop
    /// boundary is validated (and thus counted against the file position) but
    /// never returned; the one packet `seek_forward` already held to satisfy
    /// `--seek` is exempt from that check and always returned.
    pub async fn next(&mut self) -> io::Result<Option<RecordedPacket>> {
        if self.stopped {
            return Ok(None);
        }
        if !self.seeked {
            self.seek_forward().await?;
        }

        // The held packet is the one `seek_forward` already peeked past the
        // seek bound; it is returned unconditionally, matching the original's
        // `process_packet` short-circuit before its stop check. The stop
        // bound is only ever tested against freshly-read packets, below.
        if let Some(packet) = self.held.take() {
            return Ok(Some(packet));
        }

        let packet = match self.reader.read_packet().await? {
            Some(packet) => packet,
            None => {
                self.stopped = true;
                return Ok(None);
            }
        };

        let _ = self.validator.process(&packet.payload);
        if self.past_stop_bound() {
            self.stopped = true;
            return Ok(None);
        }
        Ok(Some(packet))
    }
}
