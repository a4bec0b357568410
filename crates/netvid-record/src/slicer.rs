//! Unpaced, socket-free traversal that rewrites surviving packets verbatim to
//! an output recording. Reuses [`Traversal`]'s seek/stop semantics rather than
//! re-implementing them.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::recording::{RecordingReader, RecordingWriter};
use crate::traversal::Traversal;

pub struct Slicer<R, W> {
    traversal: Traversal<R>,
    writer: RecordingWriter<W>,
}

impl<R, W> Slicer<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: RecordingReader<R>, writer: RecordingWriter<W>, seek: u32, stop: Option<u32>) -> Self {
        Self { traversal: Traversal::new(reader, seek, stop), writer }
    }

    /// Copies every surviving packet to the output file verbatim and returns
    /// the count written.
    pub async fn run(mut self) -> std::io::Result<u64> {
        let mut count = 0u64;
        while let Some(packet) = self.traversal.next().await? {
            self.writer.write_packet(packet.timestamp_ns, &packet.payload).await?;
            count += 1;
        }
        self.writer.flush().await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn slices_between_seek_and_stop_bounds_verbatim() {
        use crate::recording::RecordingWriter as Writer;

        let mut storage = Vec::new();
        {
            let mut writer = Writer::new(&mut storage);
            for i in 0..10u64 {
                writer.write_packet(i * 1_000, &[i as u8]).await.unwrap();
            }
        }

        let reader = RecordingReader::new(Cursor::new(storage));
        let mut output = Vec::new();
        let slicer = Slicer::new(reader, Writer::new(&mut output), 0, None);
        let count = slicer.run().await.unwrap();
        assert_eq!(count, 10);

        let mut verify = RecordingReader::new(Cursor::new(output));
        for i in 0..10u64 {
            let packet = verify.read_packet().await.unwrap().unwrap();
            assert_eq!(packet.timestamp_ns, i * 1_000);
            assert_eq!(packet.payload, vec![i as u8]);
        }
    }
}
