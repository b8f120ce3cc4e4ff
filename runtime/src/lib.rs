pub mod client;
pub mod error;
pub mod orchestrator;

use std::time::Duration;

use config::{ClientConfig, StoreConfig};
use handoff::{CsvFrameStore, FrameConsumer, FrameStore, LogFrameStore, DEFAULT_POLL_INTERVAL};
use session::adapters::mock_message;
use session::{
	ConnectionManager, MockEngine, MockReadiness, ProtocolEngine, SessionConfig, TcpStompEngine,
};
use tracing::{info, warn};

pub use client::{session_config, FeedClient, FeedSettings, FrameBudget, ProducerHandle, RunEnd, RunReport};
pub use error::ClientError;
pub use orchestrator::{Orchestrator, ProcessReport};

pub fn init() {
	stomp::init_logging();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
	Tcp,
	Demo,
}

impl RuntimeMode {
	pub fn from_env() -> Self {
		let mode = std::env::var("NRFEED_MODE")
			.unwrap_or_else(|_| "tcp".to_string())
			.to_ascii_lowercase();
		match mode.as_str() {
			"demo" | "mock" => Self::Demo,
			_ => Self::Tcp,
		}
	}
}

/// Validates `config` and runs one feed process against its endpoint.
pub fn run_with_config(config: &ClientConfig) -> Result<ProcessReport, ClientError> {
	config.validate()?;
	if config.missing_password() {
		warn!(
			username = %config.username,
			"no password in the config file or NRFEED_PASSWORD, connecting with an empty passcode"
		);
	}
	let engine = TcpStompEngine::new(&config.endpoint)?;
	info!(endpoint = %config.endpoint, mode = ?RuntimeMode::Tcp, "runtime configured");
	run_process(engine, session_config(config), config, build_store(&config.store)?)
}

/// Runs the full pipeline against a scripted in-memory feed, including one
/// dropped connection.
pub fn run_demo(config: &ClientConfig) -> Result<ProcessReport, ClientError> {
	config.validate()?;
	let frames = config.frame_budget().unwrap_or(10);
	let destination = config
		.topics
		.first()
		.map(|topic| format!("/topic/{}", topic))
		.unwrap_or_else(|| "/topic/TRAIN_MVT_ALL_TOC".to_string());

	let half = frames / 2;
	let mut readiness = vec![MockReadiness::Ready; half as usize];
	readiness.push(MockReadiness::Drop);
	let engine = MockEngine::new()
		.with_readiness(readiness)
		.with_frames(
			(1..=frames)
				.map(|index| {
					mock_message(
						&destination,
						&format!("demo-{}", index),
						&format!("[{{\"header\":{{\"msg_type\":\"0003\"}},\"seq\":{}}}]", index),
					)
				})
				.collect(),
		);

	let mut config = config.clone();
	config.frame_count = Some(frames);
	info!(frames, mode = ?RuntimeMode::Demo, "runtime configured");
	run_process(engine, session_config(&config), &config, build_store(&config.store)?)
}

pub fn run_process<E>(
	engine: E,
	session: SessionConfig,
	config: &ClientConfig,
	store: Box<dyn FrameStore>,
) -> Result<ProcessReport, ClientError>
where
	E: ProtocolEngine + Send + 'static,
{
	let orchestrator = Orchestrator::new();
	let producer = FeedClient::new(
		ConnectionManager::new(engine, session),
		FeedSettings::from_config(config),
		orchestrator.queue(),
	)?;
	let consumer = FrameConsumer::new(store, orchestrator.queue()).with_poll_interval(
		env_millis("NRFEED_CONSUMER_POLL_MS").unwrap_or(DEFAULT_POLL_INTERVAL),
	);
	orchestrator.run(producer, consumer)
}

pub fn build_store(store: &StoreConfig) -> Result<Box<dyn FrameStore>, ClientError> {
	match store {
		StoreConfig::Log => Ok(Box::new(LogFrameStore::new())),
		StoreConfig::Csv { path } => {
			let store = CsvFrameStore::open(path).map_err(ClientError::Store)?;
			Ok(Box::new(store))
		}
	}
}

fn env_millis(key: &str) -> Option<Duration> {
	std::env::var(key)
		.ok()
		.and_then(|value| value.parse::<u64>().ok())
		.filter(|value| *value > 0)
		.map(Duration::from_millis)
}
