use std::borrow::Cow;
use std::fmt;

use crate::header::{HeaderList, StompVersion};
use crate::header_list;
use crate::heartbeat::HeartBeat;

const INFO_BODY_PREVIEW: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Send,
    Subscribe,
    Unsubscribe,
    Begin,
    Commit,
    Abort,
    Ack,
    Nack,
    Disconnect,
    Connect,
    Stomp,
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        use self::Command::*;

        match *self {
            Send => "SEND",
            Subscribe => "SUBSCRIBE",
            Unsubscribe => "UNSUBSCRIBE",
            Begin => "BEGIN",
            Commit => "COMMIT",
            Abort => "ABORT",
            Ack => "ACK",
            Nack => "NACK",
            Disconnect => "DISCONNECT",
            Connect => "CONNECT",
            Stomp => "STOMP",
            Connected => "CONNECTED",
            Message => "MESSAGE",
            Receipt => "RECEIPT",
            Error => "ERROR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        use self::Command::*;

        let command = match value {
            "SEND" => Send,
            "SUBSCRIBE" => Subscribe,
            "UNSUBSCRIBE" => Unsubscribe,
            "BEGIN" => Begin,
            "COMMIT" => Commit,
            "ABORT" => Abort,
            "ACK" => Ack,
            "NACK" => Nack,
            "DISCONNECT" => Disconnect,
            "CONNECT" => Connect,
            "STOMP" => Stomp,
            "CONNECTED" => Connected,
            "MESSAGE" => Message,
            "RECEIPT" => Receipt,
            "ERROR" => Error,
            _ => return None,
        };
        Some(command)
    }

    /// Header values of these frames travel without escaping.
    pub fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_text(&self) -> &'static str {
        match *self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transmission {
    HeartBeat,
    CompleteFrame(Frame),
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: HeaderList::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_message(&self) -> bool {
        self.command == Command::Message
    }

    pub fn is_error(&self) -> bool {
        self.command == Command::Error
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// One-line summary used by diagnostics and the logging store.
    pub fn info(&self) -> String {
        let body = self.body_text();
        let preview: String = body.chars().take(INFO_BODY_PREVIEW).collect();
        let ellipsis = if body.chars().count() > INFO_BODY_PREVIEW { "..." } else { "" };
        format!(
            "{} frame [headers={{{}}}, body={:?}{} ({} bytes)]",
            self.command,
            self.headers,
            preview,
            ellipsis,
            self.body.len()
        )
    }

    pub fn connect(host: &str, heartbeat: HeartBeat) -> Frame {
        Frame {
            command: Command::Connect,
            headers: header_list![
                "accept-version" => "1.1,1.2",
                "host" => host,
                "heart-beat" => heartbeat.to_header_value()
            ],
            body: Vec::new(),
        }
    }

    pub fn disconnect(receipt: &str) -> Frame {
        Frame {
            command: Command::Disconnect,
            headers: header_list![
                "receipt" => receipt
            ],
            body: Vec::new(),
        }
    }

    pub fn subscribe(subscription_id: &str, destination: &str, ack_mode: AckMode) -> Frame {
        Frame {
            command: Command::Subscribe,
            headers: header_list![
                "destination" => destination,
                "id" => subscription_id,
                "ack" => ack_mode.as_text()
            ],
            body: Vec::new(),
        }
    }

    pub fn unsubscribe(subscription_id: &str) -> Frame {
        Frame {
            command: Command::Unsubscribe,
            headers: header_list![
                "id" => subscription_id
            ],
            body: Vec::new(),
        }
    }

    /// Builds the `ACK` for a received `MESSAGE`, in the shape the negotiated
    /// protocol version expects. Returns `None` when the message lacks the
    /// headers required to identify it.
    pub fn ack_for(message: &Frame, version: StompVersion) -> Option<Frame> {
        let headers = match version {
            StompVersion::V1_2 => {
                let ack_id = message.headers.ack()?;
                header_list!["id" => ack_id]
            }
            StompVersion::V1_0 | StompVersion::V1_1 => {
                let message_id = message.headers.message_id()?;
                let subscription = message.headers.subscription()?;
                header_list![
                    "message-id" => message_id,
                    "subscription" => subscription
                ]
            }
        };
        Some(Frame {
            command: Command::Ack,
            headers,
            body: Vec::new(),
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.command)?;
        for header in &self.headers {
            writeln!(f, "{}:{}", header.key(), header.value())?;
        }
        writeln!(f)?;
        match std::str::from_utf8(&self.body) {
            Ok(text) => write!(f, "{}", text),
            Err(_) => write!(f, "<Binary content>"),
        }
    }
}
