#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    UnknownCommand(String),
    MalformedHeader(String),
    InvalidEscape(String),
    InvalidContentLength(String),
    MissingTerminator,
    InvalidUtf8,
    FrameTooLarge(usize),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnknownCommand(v) => write!(f, "unknown command: {v}"),
            DecodeError::MalformedHeader(v) => write!(f, "malformed header: {v}"),
            DecodeError::InvalidEscape(v) => write!(f, "invalid header escape: {v}"),
            DecodeError::InvalidContentLength(v) => write!(f, "invalid content-length: {v}"),
            DecodeError::MissingTerminator => write!(f, "frame body is not NUL terminated"),
            DecodeError::InvalidUtf8 => write!(f, "frame command or header is not utf8"),
            DecodeError::FrameTooLarge(size) => write!(f, "frame of {size} bytes exceeds the size limit"),
        }
    }
}

impl std::error::Error for DecodeError {}
