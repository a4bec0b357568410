use thiserror::Error;

/// Error kinds shared by every layer of netvid that touches the wire or a pixel
/// buffer. Startup errors (`InvalidEndpoint`, bind failures surfaced through
/// `Socket`) are fatal to the calling binary; the rest are logged and the caller
/// keeps running, per the steady-state error policy.
#[derive(Debug, Error)]
pub enum NetvidError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),

    #[error("datagram truncated (larger than the receive buffer)")]
    Truncation,

    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    #[error("frame {frame_id} completed with missing chunks")]
    FrameLoss { frame_id: u32 },

    #[error("end of recording")]
    ReplayEof,
}

pub type Result<T> = std::result::Result<T, NetvidError>;
