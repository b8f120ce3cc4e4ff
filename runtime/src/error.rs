use std::fmt::{Display, Formatter};

use config::ConfigError;
use session::{EngineError, SessionError};

/// What a feed run can fail with.
#[derive(Debug)]
pub enum ClientError {
	Config(ConfigError),
	InvalidCredentials(String),
	Fatal(String),
	Store(std::io::Error),
	Spawn(std::io::Error),
}

impl Display for ClientError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Config(e) => write!(f, "configuration error: {e}"),
			Self::InvalidCredentials(v) => write!(f, "invalid credentials: {v}"),
			Self::Fatal(v) => write!(f, "fatal error: {v}"),
			Self::Store(e) => write!(f, "frame store error: {e}"),
			Self::Spawn(e) => write!(f, "failed to start worker thread: {e}"),
		}
	}
}

impl std::error::Error for ClientError {}

impl From<ConfigError> for ClientError {
	fn from(value: ConfigError) -> Self {
		Self::Config(value)
	}
}

impl From<SessionError> for ClientError {
	fn from(value: SessionError) -> Self {
		match value {
			SessionError::InvalidCredentials(reason) => Self::InvalidCredentials(reason),
			other => Self::Fatal(other.to_string()),
		}
	}
}

impl From<EngineError> for ClientError {
	fn from(value: EngineError) -> Self {
		Self::Fatal(value.to_string())
	}
}
