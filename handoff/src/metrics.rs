//! 指标快照模块。
//!
//! 提供交接队列与消费者的只读运行指标。

/// 交接队列运行指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueMetrics {
	/// 生产者累计入队的帧数量。
	pub pushed: u64,
	/// 消费者累计出队的帧数量。
	pub popped: u64,
	/// 队列当前长度。
	pub len: usize,
}

/// 消费者退出时的处理统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerReport {
	/// 成功交给 store 的帧数量。
	pub stored: u64,
	/// store 返回错误的帧数量。
	pub failed: u64,
}
