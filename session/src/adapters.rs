pub mod mock;
pub mod tcp;

pub use mock::{mock_error, mock_message, MockCall, MockEngine, MockProbe, MockReadiness};
pub use tcp::TcpStompEngine;
