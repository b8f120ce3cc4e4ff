//! `handoff` crate 入口。
//!
//! 职责：生产者（feed client）与消费者（frame store）之间的帧交接。
//!
//! 模块分工：
//! - `queue`：无界 FIFO 交接队列。
//! - `store`：`FrameStore` 能力接口与内置实现。
//! - `consumer`：独立线程上的消费循环与句柄。
//! - `metrics`：运行指标快照。
//!
//! 快速示例：
//! ```rust
//! use std::time::Duration;
//! use handoff::{FrameConsumer, FrameQueue, MemoryFrameStore};
//! use stomp::{Command, Frame};
//!
//! let queue = FrameQueue::new();
//! let store = MemoryFrameStore::new();
//! let handle = FrameConsumer::new(store.clone(), queue.clone())
//!     .with_poll_interval(Duration::from_millis(10))
//!     .spawn()
//!     .unwrap();
//!
//! queue.push(Frame::new(Command::Message).with_body("payload"));
//! while !queue.is_empty() {
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! handle.stop();
//! let report = handle.join().unwrap();
//! assert_eq!(report.stored, 1);
//! ```

mod consumer;
mod metrics;
mod queue;
mod store;

pub use consumer::{ConsumerHandle, FrameConsumer, StopSignal, DEFAULT_POLL_INTERVAL};
pub use metrics::{ConsumerReport, QueueMetrics};
pub use queue::FrameQueue;
pub use store::{CsvFrameStore, FrameStore, LogFrameStore, MemoryFrameStore, StoredFrame};
