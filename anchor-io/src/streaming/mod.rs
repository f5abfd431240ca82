//! Network side of the anchor: TCP control channel and UDP sample stream

pub mod command_server;
pub mod fragment;
pub mod queue;
pub mod sender;

pub use command_server::{CommandServer, ServerExit};
pub use fragment::{DatagramSink, MAX_DATAGRAM_PAYLOAD};
pub use queue::{BackpressurePolicy, FrameConsumer, FrameProducer, frame_queue};
pub use sender::{SenderStats, StreamSender};
