//! 帧交接队列模块。
//!
//! 单生产者 / 单消费者之间唯一的共享资源：生产者非阻塞入队，
//! 消费者带超时出队，调用方无需额外加锁。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use stomp::Frame;

use crate::QueueMetrics;

#[derive(Debug, Default)]
struct QueueCounters {
	pushed: AtomicU64,
	popped: AtomicU64,
}

/// 帧交接队列（无界 FIFO）。
///
/// 克隆得到的是同一队列的句柄，由编排器创建后分别注入生产者与消费者。
#[derive(Debug, Clone)]
pub struct FrameQueue {
	sender: Sender<Frame>,
	receiver: Receiver<Frame>,
	counters: Arc<QueueCounters>,
}

impl Default for FrameQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl FrameQueue {
	/// 创建空队列。
	pub fn new() -> Self {
		let (sender, receiver) = channel::unbounded();
		Self {
			sender,
			receiver,
			counters: Arc::new(QueueCounters::default()),
		}
	}

	/// 非阻塞入队。
	pub fn push(&self, frame: Frame) {
		// 队列自身持有 receiver，send 不会因断开而失败。
		if self.sender.send(frame).is_ok() {
			self.counters.pushed.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// 最多等待 `timeout` 出队一帧。
	pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
		match self.receiver.recv_timeout(timeout) {
			Ok(frame) => {
				self.counters.popped.fetch_add(1, Ordering::Relaxed);
				Some(frame)
			}
			Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
		}
	}

	/// 立即尝试出队一帧。
	pub fn try_pop(&self) -> Option<Frame> {
		let frame = self.receiver.try_recv().ok()?;
		self.counters.popped.fetch_add(1, Ordering::Relaxed);
		Some(frame)
	}

	pub fn len(&self) -> usize {
		self.receiver.len()
	}

	pub fn is_empty(&self) -> bool {
		self.receiver.is_empty()
	}

	/// 当前指标快照。
	pub fn metrics(&self) -> QueueMetrics {
		QueueMetrics {
			pushed: self.counters.pushed.load(Ordering::Relaxed),
			popped: self.counters.popped.load(Ordering::Relaxed),
			len: self.len(),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::thread;
	use std::time::Duration;

	use stomp::{Command, Frame};

	use super::FrameQueue;

	fn numbered(index: usize) -> Frame {
		Frame::new(Command::Message).with_header("message-id", index.to_string())
	}

	#[test]
	fn pop_times_out_on_empty_queue() {
		let queue = FrameQueue::new();
		assert!(queue.pop_timeout(Duration::from_millis(5)).is_none());
		assert!(queue.try_pop().is_none());
	}

	#[test]
	fn frames_cross_threads_in_fifo_order() {
		let queue = FrameQueue::new();
		let producer_queue = queue.clone();
		let producer = thread::spawn(move || {
			for index in 0..200 {
				producer_queue.push(numbered(index));
			}
		});

		let mut received = Vec::new();
		while received.len() < 200 {
			if let Some(frame) = queue.pop_timeout(Duration::from_millis(100)) {
				received.push(frame.headers.message_id().unwrap_or_default().to_string());
			}
		}
		producer.join().expect("producer thread");

		let expected = (0..200).map(|index| index.to_string()).collect::<Vec<_>>();
		assert_eq!(received, expected);

		let metrics = queue.metrics();
		assert_eq!(metrics.pushed, 200);
		assert_eq!(metrics.popped, 200);
		assert_eq!(metrics.len, 0);
	}
}
