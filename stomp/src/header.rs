use std::fmt;
use std::slice::Iter;

use crate::error::DecodeError;
use crate::heartbeat::HeartBeat;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header(pub String, pub String);

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Header(key.into(), value.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> &str {
        &self.1
    }

    /// Escapes a header key or value for transmission (STOMP 1.1+).
    pub fn escape(raw: &str) -> String {
        let mut escaped = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '\\' => escaped.push_str(r"\\"),
                '\r' => escaped.push_str(r"\r"),
                '\n' => escaped.push_str(r"\n"),
                ':' => escaped.push_str(r"\c"),
                other => escaped.push(other),
            }
        }
        escaped
    }

    pub fn unescape(encoded: &str) -> Result<String, DecodeError> {
        let mut decoded = String::with_capacity(encoded.len());
        let mut chars = encoded.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                decoded.push(ch);
                continue;
            }
            match chars.next() {
                Some('\\') => decoded.push('\\'),
                Some('r') => decoded.push('\r'),
                Some('n') => decoded.push('\n'),
                Some('c') => decoded.push(':'),
                _ => return Err(DecodeError::InvalidEscape(encoded.to_string())),
            }
        }
        Ok(decoded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StompVersion {
    V1_0,
    V1_1,
    V1_2,
}

impl StompVersion {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1.0" => Some(Self::V1_0),
            "1.1" => Some(Self::V1_1),
            "1.2" => Some(Self::V1_2),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V1_2 => "1.2",
        }
    }

    /// 1.0 predates header escaping; a backslash there is a literal.
    pub fn escapes_headers(&self) -> bool {
        !matches!(self, Self::V1_0)
    }
}

// Repeated keys are kept in arrival order; lookups return the first entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    headers: Vec<Header>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            headers: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, header: Header) {
        self.headers.push(header);
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        self.push(Header::new(key, value));
    }

    pub fn extend(&mut self, other: HeaderList) {
        self.headers.extend(other.headers);
    }

    pub fn retain<F>(&mut self, test: F)
    where
        F: Fn(&Header) -> bool,
    {
        self.headers.retain(test)
    }

    pub fn iter(&self) -> Iter<'_, Header> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.key() == key)
            .map(Header::value)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn ack(&self) -> Option<&str> {
        self.get("ack")
    }

    pub fn destination(&self) -> Option<&str> {
        self.get("destination")
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    pub fn message(&self) -> Option<&str> {
        self.get("message")
    }

    pub fn message_id(&self) -> Option<&str> {
        self.get("message-id")
    }

    pub fn receipt_id(&self) -> Option<&str> {
        self.get("receipt-id")
    }

    pub fn subscription(&self) -> Option<&str> {
        self.get("subscription")
    }

    pub fn session(&self) -> Option<&str> {
        self.get("session")
    }

    pub fn content_length(&self) -> Option<Result<usize, DecodeError>> {
        self.get("content-length").map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|_| DecodeError::InvalidContentLength(raw.to_string()))
        })
    }

    pub fn heart_beat(&self) -> Option<HeartBeat> {
        self.get("heart-beat").and_then(HeartBeat::parse)
    }

    pub fn version(&self) -> Option<StompVersion> {
        self.get("version").and_then(StompVersion::parse)
    }
}

impl fmt::Display for HeaderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for header in &self.headers {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", header.key(), header.value())?;
            first = false;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a Header;
    type IntoIter = Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

#[macro_export]
macro_rules! header_list [
    () => ({
        $crate::header::HeaderList::new()
    });
    ($($key:expr => $value:expr),+ $(,)?) => ({
        let mut header_list = $crate::header::HeaderList::new();
        $(header_list.push($crate::header::Header::new($key, $value));)+
        header_list
    });
];
