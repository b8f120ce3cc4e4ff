/// Failure kinds a protocol engine can raise; the connection manager maps
/// them onto retry / fatal decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    Transport(String),
    Timeout(String),
    Protocol(String),
    Other(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Transport(_) | EngineError::Timeout(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Transport(msg) => write!(f, "transport failure: {}", msg),
            EngineError::Timeout(msg) => write!(f, "timed out: {}", msg),
            EngineError::Protocol(msg) => write!(f, "protocol rejection: {}", msg),
            EngineError::Other(msg) => write!(f, "unexpected failure: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                EngineError::Timeout(error.to_string())
            }
            _ => EngineError::Transport(error.to_string()),
        }
    }
}

impl From<stomp::DecodeError> for EngineError {
    fn from(error: stomp::DecodeError) -> Self {
        EngineError::Protocol(error.to_string())
    }
}

/// Terminal outcome of a connect loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    InvalidCredentials(String),
    Unrecoverable(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidCredentials(msg) => write!(f, "invalid credentials: {}", msg),
            SessionError::Unrecoverable(msg) => write!(f, "unrecoverable connection failure: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}
