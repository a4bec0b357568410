//! Contiguous storage for a batch of received datagrams: one growable byte
//! buffer plus a vector of `{begin, end, remote}` records, avoiding a
//! per-packet heap allocation.

use std::net::SocketAddr;

struct Entry {
    begin: usize,
    end: usize,
    remote: SocketAddr,
}

#[derive(Default)]
pub struct PacketBatch {
    buffer: Vec<u8>,
    entries: Vec<Entry>,
}

impl PacketBatch {
    pub fn push(&mut self, data: &[u8], remote: SocketAddr) {
        let begin = self.buffer.len();
        self.buffer.extend_from_slice(data);
        let end = self.buffer.len();
        self.entries.push(Entry { begin, end, remote });
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], SocketAddr)> {
        self.entries.iter().map(move |e| (&self.buffer[e.begin..e.end], e.remote))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
