use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use stomp::{Command, Frame, HeaderList};

use crate::error::EngineError;
use crate::protocol::{ConnectRequest, ProtocolEngine, SubscriptionToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReadiness {
    Ready,
    Idle,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Connect,
    Subscribe(String),
    Unsubscribe(String),
    Beat,
    CanRead,
    Receive,
    Ack(String),
    Disconnect,
}

#[derive(Debug, Default)]
struct MockJournal {
    calls: Vec<MockCall>,
}

/// Read side of a `MockEngine`, usable after the engine has been moved
/// into a connection manager or onto another thread.
#[derive(Debug, Clone)]
pub struct MockProbe {
    journal: Arc<Mutex<MockJournal>>,
}

impl MockProbe {
    fn lock(&self) -> MutexGuard<'_, MockJournal> {
        self.journal.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Connect))
    }

    pub fn disconnect_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Disconnect))
    }

    pub fn subscribe_calls(&self) -> usize {
        self.count(|call| matches!(call, MockCall::Subscribe(_)))
    }

    pub fn subscribed_destinations(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Subscribe(destination) => Some(destination.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn acked(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Ack(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, test: impl Fn(&MockCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| test(call)).count()
    }
}

/// Scripted in-memory engine. Unscripted connects succeed, and readiness
/// defaults to "ready while frames remain".
pub struct MockEngine {
    endpoint: String,
    connected: bool,
    connect_results: VecDeque<Result<(), EngineError>>,
    readiness: VecDeque<MockReadiness>,
    frames: VecDeque<Frame>,
    rejected_destinations: HashSet<String>,
    failing_acks: HashSet<String>,
    failing_receives: usize,
    fail_disconnect: bool,
    journal: Arc<Mutex<MockJournal>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            endpoint: "mock://feed".to_string(),
            connected: false,
            connect_results: VecDeque::new(),
            readiness: VecDeque::new(),
            frames: VecDeque::new(),
            rejected_destinations: HashSet::new(),
            failing_acks: HashSet::new(),
            failing_receives: 0,
            fail_disconnect: false,
            journal: Arc::new(Mutex::new(MockJournal::default())),
        }
    }

    pub fn with_connect_results(mut self, results: Vec<Result<(), EngineError>>) -> Self {
        self.connect_results.extend(results);
        self
    }

    pub fn with_readiness(mut self, readiness: Vec<MockReadiness>) -> Self {
        self.readiness.extend(readiness);
        self
    }

    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames.extend(frames);
        self
    }

    pub fn with_messages(self, destination: &str, count: usize) -> Self {
        let start = self.frames.len();
        let frames = (start..start + count)
            .map(|index| mock_message(destination, &format!("msg-{}", index + 1), "{}"))
            .collect();
        self.with_frames(frames)
    }

    pub fn rejecting(mut self, destination: &str) -> Self {
        self.rejected_destinations.insert(destination.to_string());
        self
    }

    /// The first ack of `message_id` drops the connection.
    pub fn failing_ack(mut self, message_id: &str) -> Self {
        self.failing_acks.insert(message_id.to_string());
        self
    }

    /// The next `count` receives drop the connection; frames stay queued.
    pub fn failing_receives(mut self, count: usize) -> Self {
        self.failing_receives = count;
        self
    }

    pub fn failing_disconnect(mut self) -> Self {
        self.fail_disconnect = true;
        self
    }

    pub fn probe(&self) -> MockProbe {
        MockProbe {
            journal: Arc::clone(&self.journal),
        }
    }

    fn record(&self, call: MockCall) {
        self.journal
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .calls
            .push(call);
    }

    fn ensure_connected(&self) -> Result<(), EngineError> {
        if self.connected {
            Ok(())
        } else {
            Err(EngineError::Transport("mock engine not connected".to_string()))
        }
    }
}

impl ProtocolEngine for MockEngine {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connect(&mut self, _request: &ConnectRequest) -> Result<(), EngineError> {
        self.record(MockCall::Connect);
        let result = self.connect_results.pop_front().unwrap_or(Ok(()));
        self.connected = result.is_ok();
        result
    }

    fn subscribe(
        &mut self,
        destination: &str,
        headers: HeaderList,
    ) -> Result<SubscriptionToken, EngineError> {
        self.record(MockCall::Subscribe(destination.to_string()));
        self.ensure_connected()?;
        if self.rejected_destinations.contains(destination) {
            return Err(EngineError::Protocol(format!("invalid destination {}", destination)));
        }
        let id = headers.id().unwrap_or(destination).to_string();
        Ok(SubscriptionToken(id))
    }

    fn unsubscribe(&mut self, token: &SubscriptionToken) -> Result<(), EngineError> {
        self.record(MockCall::Unsubscribe(token.id().to_string()));
        self.ensure_connected()
    }

    fn beat(&mut self) -> Result<(), EngineError> {
        self.record(MockCall::Beat);
        self.ensure_connected()
    }

    fn can_read(&mut self, _timeout: Duration) -> Result<bool, EngineError> {
        self.record(MockCall::CanRead);
        self.ensure_connected()?;
        match self.readiness.pop_front() {
            Some(MockReadiness::Idle) => Ok(false),
            Some(MockReadiness::Drop) => {
                self.connected = false;
                Err(EngineError::Transport("mock connection dropped".to_string()))
            }
            Some(MockReadiness::Ready) | None => Ok(!self.frames.is_empty()),
        }
    }

    fn receive_frame(&mut self) -> Result<Frame, EngineError> {
        self.record(MockCall::Receive);
        self.ensure_connected()?;
        if self.failing_receives > 0 {
            self.failing_receives -= 1;
            self.connected = false;
            return Err(EngineError::Transport("mock receive failed".to_string()));
        }
        self.frames
            .pop_front()
            .ok_or_else(|| EngineError::Transport("no frame available".to_string()))
    }

    fn ack(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let id = frame.headers.message_id().unwrap_or("<none>").to_string();
        self.record(MockCall::Ack(id.clone()));
        self.ensure_connected()?;
        if self.failing_acks.remove(&id) {
            self.connected = false;
            return Err(EngineError::Transport(format!("mock ack of {} failed", id)));
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), EngineError> {
        self.record(MockCall::Disconnect);
        self.connected = false;
        if self.fail_disconnect {
            return Err(EngineError::Transport("mock disconnect failed".to_string()));
        }
        Ok(())
    }
}

pub fn mock_message(destination: &str, message_id: &str, body: &str) -> Frame {
    Frame::new(Command::Message)
        .with_header("destination", destination)
        .with_header("message-id", message_id)
        .with_header("subscription", destination)
        .with_header("ack", message_id)
        .with_body(body)
}

pub fn mock_error(message: &str) -> Frame {
    Frame::new(Command::Error)
        .with_header("message", message)
        .with_body(message)
}
