//! Protocol module: wire message type, JSON codec, stream framer, and msg-id sources.

pub mod codec;
pub mod framer;
pub mod messages;
pub mod msg_id;

pub use codec::{decode_frame, encode_message, FrameError, WireFraming};
pub use framer::{Framer, DEFAULT_MAX_FRAME_LEN};
pub use messages::{Message, MessageType, Topology};
pub use msg_id::{MessageIdSource, SequentialIds, UuidIds};
