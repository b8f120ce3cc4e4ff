use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use stomp::{
    encode_frame_for, encode_heartbeat, AckMode, Command, Frame, FrameDecoder, HeaderList,
    NegotiatedHeartBeat, StompVersion, Transmission,
};
use tracing::{debug, trace, warn};

use crate::error::EngineError;
use crate::protocol::{ConnectRequest, ProtocolEngine, SubscriptionToken};

const READ_CHUNK: usize = 8192;
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);
const RECEIPT_WAIT: Duration = Duration::from_secs(1);
const RECEIVE_POLL: Duration = Duration::from_millis(250);

/// Blocking STOMP engine over a plain TCP socket.
pub struct TcpStompEngine {
    endpoint: String,
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
    pending: VecDeque<Frame>,
    version: StompVersion,
    heartbeat: NegotiatedHeartBeat,
    last_sent: Instant,
    last_received: Instant,
    receipt_seq: u64,
}

impl TcpStompEngine {
    /// Accepts `tcp://host:port`; the scheme may be omitted.
    pub fn new(endpoint: &str) -> Result<Self, EngineError> {
        let (host, port) = parse_endpoint(endpoint)?;
        let now = Instant::now();
        Ok(Self {
            endpoint: endpoint.to_string(),
            host,
            port,
            stream: None,
            decoder: FrameDecoder::new(),
            pending: VecDeque::new(),
            version: StompVersion::V1_1,
            heartbeat: NegotiatedHeartBeat::default(),
            last_sent: now,
            last_received: now,
            receipt_seq: 0,
        })
    }

    pub fn version(&self) -> StompVersion {
        self.version
    }

    pub fn negotiated_heartbeat(&self) -> NegotiatedHeartBeat {
        self.heartbeat
    }

    fn resolve(&self) -> Result<SocketAddr, EngineError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| EngineError::Transport(format!("no address for {}", self.host)))
    }

    fn stream(&mut self) -> Result<&mut TcpStream, EngineError> {
        self.stream
            .as_mut()
            .ok_or_else(|| EngineError::Transport("socket not connected".to_string()))
    }

    fn send(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let mut bytes = Vec::with_capacity(256 + frame.body.len());
        encode_frame_for(frame, self.version, &mut bytes);
        self.write_bytes(&bytes)?;
        trace!(command = %frame.command, "sent frame");
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        let stream = self.stream()?;
        stream.write_all(bytes)?;
        stream.flush()?;
        self.last_sent = Instant::now();
        Ok(())
    }

    /// One read with the given timeout. `Ok(false)` means nothing arrived.
    fn fill(&mut self, timeout: Duration) -> Result<bool, EngineError> {
        let mut chunk = [0u8; READ_CHUNK];
        let stream = self.stream()?;
        stream.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
        match stream.read(&mut chunk) {
            Ok(0) => {
                self.stream = None;
                Err(EngineError::Transport("connection closed by server".to_string()))
            }
            Ok(read) => {
                self.decoder.append(&chunk[..read]);
                self.last_received = Instant::now();
                Ok(true)
            }
            Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(false)
            }
            Err(error) if error.kind() == ErrorKind::Interrupted => Ok(false),
            Err(error) => {
                self.stream = None;
                Err(error.into())
            }
        }
    }

    /// Moves every complete frame out of the decoder; heartbeats are dropped.
    fn drain_decoder(&mut self) -> Result<(), EngineError> {
        while let Some(transmission) = self.decoder.decode()? {
            match transmission {
                Transmission::HeartBeat => trace!("server heartbeat"),
                Transmission::CompleteFrame(frame) => self.pending.push_back(frame),
            }
        }
        Ok(())
    }

    fn check_server_alive(&mut self) -> Result<(), EngineError> {
        if let Some(interval) = self.heartbeat.receive_interval() {
            let silence = self.last_received.elapsed();
            if silence > interval * 2 {
                warn!(silence_ms = silence.as_millis() as u64, "server heartbeat missed");
                self.close();
                return Err(EngineError::Transport("server heartbeat timed out".to_string()));
            }
        }
        Ok(())
    }

    /// Next complete frame in the decoder, leaving later bytes undecoded.
    fn decode_next(&mut self) -> Result<Option<Frame>, EngineError> {
        while let Some(transmission) = self.decoder.decode()? {
            match transmission {
                Transmission::HeartBeat => trace!("server heartbeat"),
                Transmission::CompleteFrame(frame) => return Ok(Some(frame)),
            }
        }
        Ok(None)
    }

    /// Waits for the next frame until `deadline`. Frames are decoded one at
    /// a time so the CONNECTED reply can switch the header rules before
    /// anything behind it is parsed.
    fn next_frame_until(&mut self, deadline: Instant) -> Result<Frame, EngineError> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }
            if let Some(frame) = self.decode_next()? {
                return Ok(frame);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EngineError::Timeout("no frame before deadline".to_string()));
            }
            self.fill(remaining)?;
        }
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.decoder.clear();
        self.pending.clear();
    }
}

impl ProtocolEngine for TcpStompEngine {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connect(&mut self, request: &ConnectRequest) -> Result<(), EngineError> {
        self.close();
        let address = self.resolve()?;
        let stream = if request.connect_timeout.is_zero() {
            TcpStream::connect(address)?
        } else {
            TcpStream::connect_timeout(&address, request.connect_timeout)?
        };
        stream.set_nodelay(true)?;
        self.stream = Some(stream);

        let mut frame = Frame::connect(&self.host, request.heartbeat)
            .with_header("login", request.credentials.login.clone())
            .with_header("passcode", request.credentials.passcode.clone());
        frame.headers.extend(request.headers.clone());
        self.send(&frame)?;

        let wait = if request.connected_timeout.is_zero() {
            RECEIPT_WAIT
        } else {
            request.connected_timeout
        };
        let reply = match self.next_frame_until(Instant::now() + wait) {
            Ok(reply) => reply,
            Err(error) => {
                self.close();
                return Err(error);
            }
        };
        match reply.command {
            Command::Connected => {}
            Command::Error => {
                self.close();
                let reason = reply
                    .headers
                    .message()
                    .map(str::to_string)
                    .unwrap_or_else(|| reply.body_text().into_owned());
                return Err(EngineError::Protocol(reason));
            }
            other => {
                self.close();
                return Err(EngineError::Protocol(format!("expected CONNECTED, got {}", other)));
            }
        }

        self.version = reply.headers.version().unwrap_or(StompVersion::V1_0);
        self.decoder.set_version(self.version);
        let server_beat = reply.headers.heart_beat().unwrap_or_default();
        self.heartbeat = request.heartbeat.negotiate(server_beat);
        self.last_received = Instant::now();
        debug!(
            version = self.version.as_str(),
            session = reply.headers.session().unwrap_or(""),
            send_ms = self.heartbeat.send_ms,
            receive_ms = self.heartbeat.receive_ms,
            "stomp session established"
        );
        Ok(())
    }

    fn subscribe(
        &mut self,
        destination: &str,
        headers: HeaderList,
    ) -> Result<SubscriptionToken, EngineError> {
        if !(destination.starts_with("/topic/") || destination.starts_with("/queue/")) {
            return Err(EngineError::Protocol(format!("invalid destination {}", destination)));
        }
        let id = headers.id().unwrap_or(destination).to_string();
        let mut frame = Frame::subscribe(&id, destination, AckMode::ClientIndividual);
        let mut extra = headers;
        extra.retain(|header| !matches!(header.key(), "id" | "destination" | "ack"));
        frame.headers.extend(extra);
        self.send(&frame)?;
        Ok(SubscriptionToken(id))
    }

    fn unsubscribe(&mut self, token: &SubscriptionToken) -> Result<(), EngineError> {
        self.send(&Frame::unsubscribe(token.id()))
    }

    fn beat(&mut self) -> Result<(), EngineError> {
        self.stream()?;
        if let Some(interval) = self.heartbeat.send_interval() {
            if self.last_sent.elapsed() >= interval {
                let mut bytes = Vec::with_capacity(1);
                encode_heartbeat(&mut bytes);
                self.write_bytes(&bytes)?;
                trace!("client heartbeat");
            }
        }
        Ok(())
    }

    fn can_read(&mut self, timeout: Duration) -> Result<bool, EngineError> {
        self.drain_decoder()?;
        if !self.pending.is_empty() {
            return Ok(true);
        }
        if self.fill(timeout)? {
            self.drain_decoder()?;
            if !self.pending.is_empty() {
                return Ok(true);
            }
        }
        self.check_server_alive()?;
        Ok(false)
    }

    fn receive_frame(&mut self) -> Result<Frame, EngineError> {
        loop {
            self.drain_decoder()?;
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }
            if !self.fill(RECEIVE_POLL)? {
                self.check_server_alive()?;
            }
        }
    }

    fn ack(&mut self, frame: &Frame) -> Result<(), EngineError> {
        let ack = Frame::ack_for(frame, self.version).ok_or_else(|| {
            EngineError::Protocol("message lacks the headers needed to acknowledge it".to_string())
        })?;
        self.send(&ack)
    }

    fn disconnect(&mut self) -> Result<(), EngineError> {
        if self.stream.is_none() {
            return Ok(());
        }
        self.receipt_seq += 1;
        let receipt = format!("disconnect-{}", self.receipt_seq);
        let sent = self.send(&Frame::disconnect(&receipt));

        if sent.is_ok() {
            let deadline = Instant::now() + RECEIPT_WAIT;
            loop {
                match self.next_frame_until(deadline) {
                    Ok(frame) if frame.command == Command::Receipt => {
                        if frame.headers.receipt_id() == Some(receipt.as_str()) {
                            break;
                        }
                    }
                    Ok(frame) => trace!(command = %frame.command, "discarding frame during disconnect"),
                    Err(error) => {
                        debug!(error = %error, "no disconnect receipt");
                        break;
                    }
                }
            }
        }
        self.close();
        sent
    }
}

fn parse_endpoint(endpoint: &str) -> Result<(String, u16), EngineError> {
    let address = endpoint.strip_prefix("tcp://").unwrap_or(endpoint);
    let address = address.trim_end_matches('/');
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| EngineError::Other(format!("endpoint {} has no port", endpoint)))?;
    if host.is_empty() || host.contains("://") {
        return Err(EngineError::Other(format!("unsupported endpoint {}", endpoint)));
    }
    let port = port
        .parse::<u16>()
        .map_err(|_| EngineError::Other(format!("invalid port in endpoint {}", endpoint)))?;
    Ok((host.to_string(), port))
}
