use tracing::trace;

use crate::error::DecodeError;
use crate::frame::{Command, Frame, Transmission};
use crate::header::{Header, HeaderList, StompVersion};

/// Upper bound on one buffered frame, headers and body included.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const NUL: u8 = 0;
const LF: u8 = b'\n';
const CR: u8 = b'\r';

pub fn encode_frame(frame: &Frame, out: &mut Vec<u8>) {
    encode_frame_for(frame, StompVersion::V1_2, out);
}

pub fn encode_frame_for(frame: &Frame, version: StompVersion, out: &mut Vec<u8>) {
    let escape = frame.command.escapes_headers() && version.escapes_headers();
    out.extend_from_slice(frame.command.as_str().as_bytes());
    out.push(LF);

    for header in &frame.headers {
        if escape {
            out.extend_from_slice(Header::escape(header.key()).as_bytes());
            out.push(b':');
            out.extend_from_slice(Header::escape(header.value()).as_bytes());
        } else {
            out.extend_from_slice(header.key().as_bytes());
            out.push(b':');
            out.extend_from_slice(header.value().as_bytes());
        }
        out.push(LF);
    }
    if !frame.body.is_empty() && !frame.headers.contains("content-length") {
        out.extend_from_slice(format!("content-length:{}", frame.body.len()).as_bytes());
        out.push(LF);
    }

    out.push(LF);
    out.extend_from_slice(&frame.body);
    out.push(NUL);
}

pub fn encode_heartbeat(out: &mut Vec<u8>) {
    out.push(LF);
}

/// Incremental decoder: bytes are appended as they arrive and complete
/// transmissions are taken off the front of the buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    escape_headers: bool,
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            escape_headers: true,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Header unescaping follows the negotiated protocol version.
    pub fn set_version(&mut self, version: StompVersion) {
        self.escape_headers = version.escapes_headers();
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn decode(&mut self) -> Result<Option<Transmission>, DecodeError> {
        match self.buffer.as_slice() {
            [] | [CR] => return Ok(None),
            [LF, ..] => {
                self.buffer.drain(..1);
                return Ok(Some(Transmission::HeartBeat));
            }
            [CR, LF, ..] => {
                self.buffer.drain(..2);
                return Ok(Some(Transmission::HeartBeat));
            }
            _ => {}
        }

        let Some((frame, consumed)) =
            parse_frame(&self.buffer, self.escape_headers, self.max_frame_size)?
        else {
            if self.buffer.len() > self.max_frame_size {
                return Err(DecodeError::FrameTooLarge(self.buffer.len()));
            }
            return Ok(None);
        };
        self.buffer.drain(..consumed);
        trace!(command = %frame.command, consumed, "decoded frame");
        Ok(Some(Transmission::CompleteFrame(frame)))
    }
}

/// Returns the parsed frame and the number of bytes it occupied, or `None`
/// when the buffer does not yet hold a complete frame.
fn parse_frame(
    buffer: &[u8],
    escape_headers: bool,
    max_frame_size: usize,
) -> Result<Option<(Frame, usize)>, DecodeError> {
    let Some((command_line, mut offset)) = read_line(buffer, 0) else {
        return Ok(None);
    };
    let command_text = std::str::from_utf8(command_line).map_err(|_| DecodeError::InvalidUtf8)?;
    let command = Command::parse(command_text)
        .ok_or_else(|| DecodeError::UnknownCommand(command_text.to_string()))?;

    let mut headers = HeaderList::new();
    loop {
        let Some((line, next)) = read_line(buffer, offset) else {
            return Ok(None);
        };
        offset = next;
        if line.is_empty() {
            break;
        }
        headers.push(parse_header(line, escape_headers && command.escapes_headers())?);
    }

    let (body_end, frame_end) = match headers.content_length() {
        Some(length) => {
            let length = length?;
            let body_end = offset
                .checked_add(length)
                .ok_or_else(|| DecodeError::InvalidContentLength(length.to_string()))?;
            if body_end >= max_frame_size {
                return Err(DecodeError::FrameTooLarge(body_end.saturating_add(1)));
            }
            if buffer.len() <= body_end {
                return Ok(None);
            }
            if buffer[body_end] != NUL {
                return Err(DecodeError::MissingTerminator);
            }
            (body_end, body_end + 1)
        }
        None => match buffer[offset..].iter().position(|byte| *byte == NUL) {
            Some(position) => (offset + position, offset + position + 1),
            None => return Ok(None),
        },
    };

    let frame = Frame {
        command,
        headers,
        body: buffer[offset..body_end].to_vec(),
    };
    Ok(Some((frame, frame_end)))
}

fn read_line(buffer: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let position = buffer[offset..].iter().position(|byte| *byte == LF)?;
    let mut line = &buffer[offset..offset + position];
    if let [rest @ .., CR] = line {
        line = rest;
    }
    Some((line, offset + position + 1))
}

fn parse_header(line: &[u8], escaped: bool) -> Result<Header, DecodeError> {
    let text = std::str::from_utf8(line).map_err(|_| DecodeError::InvalidUtf8)?;
    let (key, value) = text
        .split_once(':')
        .ok_or_else(|| DecodeError::MalformedHeader(text.to_string()))?;
    if escaped {
        Ok(Header::new(Header::unescape(key)?, Header::unescape(value)?))
    } else {
        Ok(Header::new(key, value))
    }
}
