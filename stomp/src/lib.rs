pub mod codec;
pub mod error;
pub mod frame;
pub mod header;
pub mod heartbeat;
pub mod logging;

pub use codec::{encode_frame, encode_frame_for, encode_heartbeat, FrameDecoder, MAX_FRAME_SIZE};
pub use error::DecodeError;
pub use frame::{AckMode, Command, Frame, Transmission};
pub use header::{Header, HeaderList, StompVersion};
pub use heartbeat::{HeartBeat, NegotiatedHeartBeat};
pub use logging::{init_logging, init_logging_with};
