//! 消费者模块。
//!
//! 在独立线程上运行任意 `FrameStore`，按到达顺序出队并逐帧交付。
//! 停止是协作式的：置位标志后，当前 `store` 调用完成、下一次带超时的
//! 出队返回时循环退出，退出前 flush 一次 store。

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{ConsumerReport, FrameQueue, FrameStore};

/// 默认单次出队等待时间。
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 协作式停止信号，可跨线程克隆。
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
	flag: Arc<AtomicBool>,
}

impl StopSignal {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stop(&self) {
		self.flag.store(true, Ordering::Release);
	}

	pub fn is_stopped(&self) -> bool {
		self.flag.load(Ordering::Acquire)
	}
}

/// 队列消费者。
pub struct FrameConsumer<S: FrameStore> {
	store: S,
	queue: FrameQueue,
	stop: StopSignal,
	poll_interval: Duration,
}

impl<S: FrameStore> FrameConsumer<S> {
	pub fn new(store: S, queue: FrameQueue) -> Self {
		Self {
			store,
			queue,
			stop: StopSignal::new(),
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	/// 调整单次出队等待时间（决定 stop 的响应延迟上限）。
	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval.max(Duration::from_millis(1));
		self
	}

	pub fn stop_signal(&self) -> StopSignal {
		self.stop.clone()
	}

	/// 在当前线程运行，直到收到停止信号。
	pub fn run(mut self) -> ConsumerReport {
		let mut report = ConsumerReport::default();
		info!("frame consumer started");
		while !self.stop.is_stopped() {
			let Some(frame) = self.queue.pop_timeout(self.poll_interval) else {
				continue;
			};
			let command = frame.command;
			match self.store.store(frame) {
				Ok(()) => report.stored += 1,
				Err(error) => {
					report.failed += 1;
					warn!(%command, error = %error, "frame store failed");
				}
			}
		}
		if let Err(error) = self.store.flush() {
			warn!(error = %error, "frame store flush failed");
		}
		info!(stored = report.stored, failed = report.failed, "frame consumer stopped");
		report
	}
}

impl<S: FrameStore + 'static> FrameConsumer<S> {
	/// 在独立线程启动消费者。
	pub fn spawn(self) -> io::Result<ConsumerHandle> {
		let stop = self.stop_signal();
		let worker = thread::Builder::new()
			.name("frame-consumer".to_string())
			.spawn(move || self.run())?;
		Ok(ConsumerHandle {
			stop,
			worker: Some(worker),
		})
	}
}

/// 已启动消费者的句柄。
#[derive(Debug)]
pub struct ConsumerHandle {
	stop: StopSignal,
	worker: Option<JoinHandle<ConsumerReport>>,
}

impl ConsumerHandle {
	/// 请求停止，不打断进行中的 `store`。
	pub fn stop(&self) {
		self.stop.stop();
	}

	pub fn is_running(&self) -> bool {
		self.worker
			.as_ref()
			.map(|worker| !worker.is_finished())
			.unwrap_or(false)
	}

	/// 等待线程退出并取回统计。
	pub fn join(mut self) -> io::Result<ConsumerReport> {
		self.join_worker()
	}

	fn join_worker(&mut self) -> io::Result<ConsumerReport> {
		match self.worker.take() {
			Some(worker) => worker
				.join()
				.map_err(|_| io::Error::other("frame consumer thread panicked")),
			None => Ok(ConsumerReport::default()),
		}
	}
}

impl Drop for ConsumerHandle {
	fn drop(&mut self) {
		if self.worker.is_some() {
			self.stop();
			if let Err(error) = self.join_worker() {
				debug!(error = %error, "frame consumer ended abnormally");
			}
		}
	}
}
