use std::thread;
use std::time::Duration;

use handoff::{FrameConsumer, FrameQueue, FrameStore};
use session::ProtocolEngine;
use tracing::{info, warn};

use crate::client::{FeedClient, RunReport};
use crate::error::ClientError;

pub const DEFAULT_DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
	pub run: RunReport,
	pub stored: u64,
	pub failed: u64,
}

/// Owns the handoff queue and runs one producer / consumer pair over it.
#[derive(Debug, Clone)]
pub struct Orchestrator {
	queue: FrameQueue,
	drain_poll: Duration,
}

impl Default for Orchestrator {
	fn default() -> Self {
		Self::new()
	}
}

impl Orchestrator {
	pub fn new() -> Self {
		Self {
			queue: FrameQueue::new(),
			drain_poll: DEFAULT_DRAIN_POLL,
		}
	}

	pub fn with_drain_poll(mut self, drain_poll: Duration) -> Self {
		self.drain_poll = drain_poll.max(Duration::from_millis(1));
		self
	}

	/// Handle to inject into the producer and the consumer.
	pub fn queue(&self) -> FrameQueue {
		self.queue.clone()
	}

	/// Joins the producer, waits for the consumer to drain the queue, then
	/// stops the consumer.
	pub fn run<E, S>(
		&self,
		producer: FeedClient<E>,
		consumer: FrameConsumer<S>,
	) -> Result<ProcessReport, ClientError>
	where
		E: ProtocolEngine + Send + 'static,
		S: FrameStore + 'static,
	{
		info!("starting process");
		let consumer = consumer.spawn().map_err(ClientError::Spawn)?;
		let producer = producer.spawn().map_err(ClientError::Spawn)?;

		let run = producer.join();

		while !self.queue.is_empty() && consumer.is_running() {
			thread::sleep(self.drain_poll);
		}
		if !self.queue.is_empty() {
			warn!(remaining = self.queue.len(), "consumer exited before the queue drained");
		}

		consumer.stop();
		let consumer_report = consumer.join().map_err(ClientError::Spawn)?;
		let run = run?;

		let metrics = self.queue.metrics();
		info!(
			enqueued = run.frames_enqueued,
			stored = consumer_report.stored,
			failed = consumer_report.failed,
			pushed = metrics.pushed,
			popped = metrics.popped,
			"process complete"
		);
		Ok(ProcessReport {
			run,
			stored: consumer_report.stored,
			failed: consumer_report.failed,
		})
	}
}
