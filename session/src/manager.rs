use std::time::Duration;

use stomp::{Frame, HeaderList, HeartBeat};
use tracing::{debug, error, info, warn};

use crate::backoff::{thread_sleeper, BackoffState, ReconnectPolicy, Sleeper};
use crate::error::{EngineError, SessionError};
use crate::protocol::{ConnectRequest, Credentials, ProtocolEngine, SubscriptionToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    Retry(EngineError),
    Fatal(SessionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub credentials: Credentials,
    pub heartbeat: HeartBeat,
    pub timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            heartbeat: HeartBeat::new(1000, 1000),
            timeout: Duration::from_millis(800),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub connect_attempts: u64,
    pub connect_failures: u64,
    pub reconnect_total: u64,
    pub disconnects_detected: u64,
    pub frames_received: u64,
    pub frames_acknowledged: u64,
}

/// Owns one feed session and keeps it alive for the feed client.
pub struct ConnectionManager<E: ProtocolEngine> {
    engine: E,
    config: SessionConfig,
    state: ConnectionState,
    backoff: BackoffState,
    ever_connected: bool,
    sleeper: Sleeper,
    stats: SessionStats,
}

impl<E: ProtocolEngine> ConnectionManager<E> {
    pub fn new(engine: E, config: SessionConfig) -> Self {
        let backoff = BackoffState::new(&config.reconnect);
        Self {
            engine,
            config,
            state: ConnectionState::Disconnected,
            backoff,
            ever_connected: false,
            sleeper: thread_sleeper(),
            stats: SessionStats::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn backoff(&self) -> BackoffState {
        self.backoff
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// One connect attempt, classified into retry or fatal.
    pub fn connect(&mut self) -> ConnectOutcome {
        if self.state == ConnectionState::Failed {
            return ConnectOutcome::Fatal(SessionError::Unrecoverable(
                "session already failed".to_string(),
            ));
        }

        self.state = ConnectionState::Connecting;
        self.stats.connect_attempts += 1;
        let request = self.connect_request();
        debug!(
            endpoint = self.engine.endpoint(),
            login = %self.config.credentials.login,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "attempting to connect"
        );

        match self.engine.connect(&request) {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                self.backoff.reset(&self.config.reconnect);
                if self.ever_connected {
                    self.stats.reconnect_total += 1;
                }
                self.ever_connected = true;
                info!(endpoint = self.engine.endpoint(), "connection made");
                ConnectOutcome::Connected
            }
            Err(error) if error.is_transient() => {
                self.state = ConnectionState::Disconnected;
                self.stats.connect_failures += 1;
                ConnectOutcome::Retry(error)
            }
            Err(EngineError::Protocol(reason)) => {
                self.state = ConnectionState::Failed;
                self.stats.connect_failures += 1;
                error!(%reason, "connection rejected by server");
                ConnectOutcome::Fatal(SessionError::InvalidCredentials(reason))
            }
            Err(other) => {
                self.state = ConnectionState::Failed;
                self.stats.connect_failures += 1;
                error!(error = %other, "unexpected failure while connecting");
                ConnectOutcome::Fatal(SessionError::Unrecoverable(other.to_string()))
            }
        }
    }

    /// Connects, sleeping with exponential backoff between transient
    /// failures, until connected or a fatal outcome.
    pub fn connect_with_backoff(&mut self) -> Result<(), SessionError> {
        loop {
            match self.connect() {
                ConnectOutcome::Connected => return Ok(()),
                ConnectOutcome::Fatal(error) => return Err(error),
                ConnectOutcome::Retry(error) => {
                    let wait = self.backoff.advance(&self.config.reconnect);
                    warn!(
                        error = %error,
                        attempt = self.backoff.attempt,
                        wait_secs = wait.as_secs_f64(),
                        "connection unavailable, waiting"
                    );
                    (self.sleeper)(wait);
                }
            }
        }
    }

    /// Sends a heartbeat pulse, then waits up to `timeout` for data.
    pub fn await_readiness(&mut self, timeout: Duration) -> Readiness {
        if !self.is_connected() {
            return Readiness::Disconnected;
        }

        if let Err(error) = self.engine.beat() {
            self.mark_disconnected(&error);
            return Readiness::Disconnected;
        }

        match self.engine.can_read(timeout) {
            Ok(true) => Readiness::Ready,
            Ok(false) => Readiness::NotReady,
            Err(EngineError::Timeout(_)) => Readiness::NotReady,
            Err(error) => {
                self.mark_disconnected(&error);
                Readiness::Disconnected
            }
        }
    }

    pub fn receive(&mut self) -> Result<Frame, EngineError> {
        if !self.is_connected() {
            return Err(EngineError::Transport("receive on a closed session".to_string()));
        }
        match self.engine.receive_frame() {
            Ok(frame) => {
                self.stats.frames_received += 1;
                Ok(frame)
            }
            Err(error) => {
                self.mark_disconnected(&error);
                Err(error)
            }
        }
    }

    pub fn acknowledge(&mut self, frame: &Frame) -> Result<(), EngineError> {
        match self.engine.ack(frame) {
            Ok(()) => {
                self.stats.frames_acknowledged += 1;
                Ok(())
            }
            Err(error) => {
                if error.is_transient() {
                    self.mark_disconnected(&error);
                }
                Err(error)
            }
        }
    }

    pub fn subscribe(
        &mut self,
        destination: &str,
        headers: HeaderList,
    ) -> Result<SubscriptionToken, EngineError> {
        if !self.is_connected() {
            return Err(EngineError::Transport("subscribe on a closed session".to_string()));
        }
        self.engine.subscribe(destination, headers)
    }

    pub fn unsubscribe(&mut self, token: &SubscriptionToken) -> Result<(), EngineError> {
        if !self.is_connected() {
            return Err(EngineError::Transport("unsubscribe on a closed session".to_string()));
        }
        self.engine.unsubscribe(token)
    }

    /// Best-effort close; failures are logged and swallowed.
    pub fn disconnect(&mut self) {
        if let Err(error) = self.engine.disconnect() {
            debug!(error = %error, "ignoring failure during disconnect");
        }
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Disconnected;
        }
        info!(endpoint = self.engine.endpoint(), "disconnected");
    }

    fn mark_disconnected(&mut self, error: &EngineError) {
        if self.state == ConnectionState::Connected {
            self.stats.disconnects_detected += 1;
            warn!(error = %error, "connection lost");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn connect_request(&self) -> ConnectRequest {
        let mut headers = HeaderList::new();
        headers.insert("client-id", self.config.credentials.login.clone());
        ConnectRequest {
            credentials: self.config.credentials.clone(),
            heartbeat: self.config.heartbeat,
            connect_timeout: self.config.timeout,
            connected_timeout: self.config.timeout,
            headers,
        }
    }
}
