use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Local;
use config::{ClientConfig, ConfigError};
use handoff::FrameQueue;
use session::{
	ConnectionManager, Credentials, Destination, ProtocolEngine, Readiness, SessionConfig,
	SubscriptionRegistry,
};
use stomp::{Command, Frame, HeartBeat};
use tracing::{debug, info, warn};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBudget {
	Limited(u64),
	Unbounded,
}

impl FrameBudget {
	/// `None` and `0` both mean unbounded.
	pub fn from_count(count: Option<u64>) -> Self {
		match count {
			Some(count) if count > 0 => Self::Limited(count),
			_ => Self::Unbounded,
		}
	}

	pub fn is_exhausted(&self, enqueued: u64) -> bool {
		match *self {
			Self::Limited(limit) => enqueued >= limit,
			Self::Unbounded => false,
		}
	}
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
	pub topics: Vec<String>,
	pub queues: Vec<String>,
	pub budget: FrameBudget,
	pub timeout: Duration,
	pub progress_interval: u64,
}

impl FeedSettings {
	pub fn new(topics: Vec<String>) -> Self {
		Self {
			topics,
			queues: Vec::new(),
			budget: FrameBudget::Limited(config::DEFAULT_FRAME_COUNT),
			timeout: Duration::from_millis(800),
			progress_interval: config::DEFAULT_PROGRESS_INTERVAL,
		}
	}

	pub fn from_config(config: &ClientConfig) -> Self {
		Self {
			topics: config.topics.clone(),
			queues: config.queues.clone(),
			budget: FrameBudget::from_count(config.frame_count),
			timeout: config.timeout(),
			progress_interval: config.progress_interval,
		}
	}

	fn destinations(&self) -> Vec<Destination> {
		self.topics
			.iter()
			.cloned()
			.map(Destination::Topic)
			.chain(self.queues.iter().cloned().map(Destination::Queue))
			.collect()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEnd {
	BudgetExhausted,
	ErrorFrame(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
	pub frames_enqueued: u64,
	pub reconnects: u64,
	pub subscribed: Vec<String>,
	pub skipped: Vec<String>,
	pub end: RunEnd,
}

/// Producer side: keeps a session alive, acknowledges every message and
/// hands it to the queue.
pub struct FeedClient<E: ProtocolEngine> {
	manager: ConnectionManager<E>,
	registry: SubscriptionRegistry,
	settings: FeedSettings,
	queue: FrameQueue,
}

impl<E: ProtocolEngine> FeedClient<E> {
	pub fn new(
		manager: ConnectionManager<E>,
		settings: FeedSettings,
		queue: FrameQueue,
	) -> Result<Self, ClientError> {
		let destinations = settings.destinations();
		if destinations.is_empty() {
			return Err(ConfigError::Invalid("no valid subscriptions".to_string()).into());
		}

		let mut registry =
			SubscriptionRegistry::new(manager.config().credentials.identity().to_string());
		for destination in destinations {
			registry.request(destination);
		}
		Ok(Self {
			manager,
			registry,
			settings,
			queue,
		})
	}

	pub fn manager(&self) -> &ConnectionManager<E> {
		&self.manager
	}

	pub fn registry(&self) -> &SubscriptionRegistry {
		&self.registry
	}

	pub fn run(&mut self) -> Result<RunReport, ClientError> {
		info!(
			login = %self.manager.config().credentials.login,
			timeout_ms = self.settings.timeout.as_millis() as u64,
			"attempting to connect"
		);
		self.reconnect()?;
		info!("monitoring");

		let mut enqueued = 0u64;
		let end = loop {
			if self.settings.budget.is_exhausted(enqueued) {
				break RunEnd::BudgetExhausted;
			}

			match self.manager.await_readiness(self.settings.timeout) {
				Readiness::Ready => {}
				Readiness::NotReady => continue,
				Readiness::Disconnected => {
					self.reconnect()?;
					continue;
				}
			}

			let frame = match self.manager.receive() {
				Ok(frame) => frame,
				Err(error) => {
					warn!(error = %error, "receive failed");
					self.reconnect()?;
					continue;
				}
			};

			match frame.command {
				Command::Message => {}
				Command::Error => {
					let summary = frame.info();
					warn!(frame = %summary, "error frame received, ending run");
					break RunEnd::ErrorFrame(summary);
				}
				other => {
					debug!(command = %other, "skipping non-message frame");
					continue;
				}
			}

			if let Err(error) = self.manager.acknowledge(&frame) {
				if error.is_transient() {
					warn!(error = %error, "acknowledge failed, frame left for redelivery");
					self.reconnect()?;
				} else {
					warn!(error = %error, "frame could not be acknowledged, skipped");
				}
				continue;
			}

			enqueued += 1;
			self.log_frame(enqueued, &frame);
			self.queue.push(frame);
			if self.settings.progress_interval > 0 && enqueued % self.settings.progress_interval == 0 {
				info!(
					frames = enqueued,
					queued = self.queue.len(),
					reconnects = self.manager.stats().reconnect_total,
					"progress"
				);
			}
		};

		self.manager.disconnect();
		Ok(RunReport {
			frames_enqueued: enqueued,
			reconnects: self.manager.stats().reconnect_total,
			subscribed: self.registry.subscribed_topics(),
			skipped: self.registry.skipped(),
			end,
		})
	}

	/// Connects with backoff and subscribes every requested destination,
	/// starting over if the session drops while subscribing.
	fn reconnect(&mut self) -> Result<(), ClientError> {
		self.registry.clear();
		loop {
			self.manager.connect_with_backoff()?;
			match self.registry.replay(&mut self.manager) {
				Ok(summary) => {
					info!(
						registered = summary.registered,
						skipped = summary.skipped,
						"subscriptions active"
					);
					return Ok(());
				}
				Err(error) => warn!(error = %error, "session lost while subscribing"),
			}
		}
	}

	fn log_frame(&self, number: u64, frame: &Frame) {
		debug!(
			number,
			time = %Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
			info = %frame.info(),
			"frame received"
		);
	}
}

impl<E: ProtocolEngine + Send + 'static> FeedClient<E> {
	/// Runs the client on its own thread.
	pub fn spawn(mut self) -> io::Result<ProducerHandle> {
		let worker = thread::Builder::new()
			.name("feed-client".to_string())
			.spawn(move || self.run())?;
		Ok(ProducerHandle { worker })
	}
}

pub fn session_config(config: &ClientConfig) -> SessionConfig {
	let mut session = SessionConfig::new(Credentials::new(
		config.username.clone(),
		config.resolved_password(),
	));
	session.heartbeat = HeartBeat::new(config.beat[0], config.beat[1]);
	session.timeout = config.timeout();
	session.reconnect.max_delay_ms = config
		.max_backoff()
		.map(|cap| u64::try_from(cap.as_millis()).unwrap_or(u64::MAX));
	session
}

#[derive(Debug)]
pub struct ProducerHandle {
	worker: JoinHandle<Result<RunReport, ClientError>>,
}

impl ProducerHandle {
	pub fn is_running(&self) -> bool {
		!self.worker.is_finished()
	}

	pub fn join(self) -> Result<RunReport, ClientError> {
		self.worker
			.join()
			.map_err(|_| ClientError::Fatal("feed client thread panicked".to_string()))?
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use config::{ClientConfig, StoreConfig};

	use super::{session_config, FeedSettings, FrameBudget};

	#[test]
	fn budget_from_count() {
		assert_eq!(FrameBudget::from_count(Some(3)), FrameBudget::Limited(3));
		assert_eq!(FrameBudget::from_count(Some(0)), FrameBudget::Unbounded);
		assert_eq!(FrameBudget::from_count(None), FrameBudget::Unbounded);
		assert!(FrameBudget::Limited(2).is_exhausted(2));
		assert!(!FrameBudget::Unbounded.is_exhausted(u64::MAX));
	}

	#[test]
	fn settings_and_session_follow_client_config() {
		let mut config = ClientConfig::new("alice@example.com", vec!["A".to_string()]);
		config.password = "secret".to_string();
		config.queues = vec!["Q".to_string()];
		config.beat = [5000, 2000];
		config.frame_count = None;
		config.max_backoff_secs = Some(30);
		config.store = StoreConfig::Log;

		let settings = FeedSettings::from_config(&config);
		assert_eq!(settings.budget, FrameBudget::Unbounded);
		assert_eq!(settings.timeout, Duration::from_millis(4000));
		assert_eq!(settings.destinations().len(), 2);

		let session = session_config(&config);
		assert_eq!(session.credentials.passcode, "secret");
		assert_eq!(session.heartbeat.client_ms, 5000);
		assert_eq!(session.reconnect.max_delay_ms, Some(30_000));
	}
}
