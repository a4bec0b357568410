pub mod batched_receiver;
pub mod chunk_validator;
pub mod frame_receiver;
pub mod packet_batch;
pub mod sender;

pub use batched_receiver::BatchedReceiver;
pub use chunk_validator::{ChunkEvent, ChunkValidator, FrameSummary};
pub use frame_receiver::FrameReceiver;
pub use packet_batch::PacketBatch;
pub use sender::{Sender, SenderHandle};
