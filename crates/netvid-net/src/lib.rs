pub mod rate_limiter;
pub mod socket;

pub use rate_limiter::{PacketSink, RateLimitedSender, UnlimitedSender, DEFAULT_MAX_RATE_BYTES_PER_SECOND};
pub use socket::{bind, parse_endpoint};
