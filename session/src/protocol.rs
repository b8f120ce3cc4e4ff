use std::time::Duration;

use stomp::{Frame, HeaderList, HeartBeat};

use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login: String,
    pub passcode: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, passcode: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            passcode: passcode.into(),
        }
    }

    /// Local part of the login, used to prefix subscription ids.
    pub fn identity(&self) -> &str {
        self.login
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or(&self.login)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub credentials: Credentials,
    pub heartbeat: HeartBeat,
    pub connect_timeout: Duration,
    pub connected_timeout: Duration,
    pub headers: HeaderList,
}

/// Protocol-assigned handle for an active subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(pub String);

impl SubscriptionToken {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Synchronous STOMP engine the connection manager drives. Every call
/// reports failures as one of the distinguishable `EngineError` kinds.
pub trait ProtocolEngine {
    fn endpoint(&self) -> &str;
    fn connect(&mut self, request: &ConnectRequest) -> Result<(), EngineError>;
    fn subscribe(
        &mut self,
        destination: &str,
        headers: HeaderList,
    ) -> Result<SubscriptionToken, EngineError>;
    fn unsubscribe(&mut self, token: &SubscriptionToken) -> Result<(), EngineError>;
    fn beat(&mut self) -> Result<(), EngineError>;
    fn can_read(&mut self, timeout: Duration) -> Result<bool, EngineError>;
    fn receive_frame(&mut self) -> Result<Frame, EngineError>;
    fn ack(&mut self, frame: &Frame) -> Result<(), EngineError>;
    fn disconnect(&mut self) -> Result<(), EngineError>;
}
