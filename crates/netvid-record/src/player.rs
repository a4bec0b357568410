//! Paced playback: replays a recording through a [`PacketSink`] at a
//! wall-clock pace derived from the recording's own timestamps scaled by
//! `speed`, with `--seek`/`--stop` delegated to [`Traversal`].

use std::net::SocketAddr;
use std::time::Duration;

use netvid_net::PacketSink;
use tokio::io::AsyncRead;
use tokio::time::{interval, sleep_until, Instant};

use crate::recording::RecordingReader;
use crate::traversal::Traversal;

pub struct Player<R, S> {
    traversal: Traversal<R>,
    sink: S,
    remote: SocketAddr,
    speed: f64,
}

impl<R, S> Player<R, S>
where
    R: AsyncRead + Unpin,
    S: PacketSink,
{
    pub fn new(
        reader: RecordingReader<R>,
        sink: S,
        remote: SocketAddr,
        speed: f64,
        seek: u32,
        stop: Option<u32>,
    ) -> Self {
        Self { traversal: Traversal::new(reader, seek, stop), sink, remote, speed: speed.max(f64::MIN_POSITIVE) }
    }

    /// Drives playback to completion and returns the number of bytes sent. A
    /// once-per-second status tick logs the current frame id and byte count
    /// while waiting out a packet's pacing delay.
    pub async fn play(&mut self) -> std::io::Result<u64> {
        let mut status = interval(Duration::from_secs(1));
        status.tick().await;

        let mut start: Option<Instant> = None;
        let mut first_timestamp_ns = 0u64;
        let mut bytes_sent = 0u64;

        while let Some(packet) = self.traversal.next().await? {
            let now = Instant::now();
            let target = match start {
                None => {
                    start = Some(now);
                    first_timestamp_ns = packet.timestamp_ns;
                    now
                }
                Some(start) => {
                    let delay_ns = packet.timestamp_ns.saturating_sub(first_timestamp_ns) as f64 / self.speed;
                    start + Duration::from_nanos(delay_ns as u64)
                }
            };

            loop {
                tokio::select! {
                    _ = sleep_until(target) => break,
                    _ = status.tick() => {
                        tracing::info!(
                            frame_id = self.traversal.current_frame_id(),
                            bytes_sent,
                            "playback status"
                        );
                    }
                }
            }

            self.sink.send(&packet.payload, self.remote).await?;
            bytes_sent += packet.payload.len() as u64;
        }

        Ok(bytes_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    struct ChannelSink {
        received: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    #[async_trait]
    impl PacketSink for ChannelSink {
        async fn send(&mut self, datagram: &[u8], _remote: SocketAddr) -> std::io::Result<usize> {
            self.received.lock().unwrap().push(datagram.to_vec());
            Ok(datagram.len())
        }
    }

    #[tokio::test]
    async fn replays_every_recorded_packet_at_high_speed() {
        use crate::recording::RecordingWriter;

        let mut storage = Vec::new();
        {
            let mut writer = RecordingWriter::new(&mut storage);
            for i in 0..100u64 {
                writer.write_packet(i * 1_000_000, &[i as u8; 4]).await.unwrap();
            }
        }

        let reader = RecordingReader::new(Cursor::new(storage));
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = ChannelSink { received: Arc::clone(&received) };
        let remote: SocketAddr = "127.0.0.1:9".parse().unwrap();
        let mut player = Player::new(reader, sink, remote, 1000.0, 0, None);

        let bytes_sent = player.play().await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 100);
        assert_eq!(bytes_sent, 400);
        for (i, datagram) in received.iter().enumerate() {
            assert_eq!(datagram, &vec![i as u8; 4]);
        }
    }
}
