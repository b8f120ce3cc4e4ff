//! 帧落地模块。
//!
//! `FrameStore` 是消费者侧的处置能力接口，核心只保证每个出队帧
//! 按到达顺序恰好交给一次 `store`。内置三种实现：
//! - `LogFrameStore`：仅输出帧摘要。
//! - `CsvFrameStore`：append-only 写入 CSV 文件。
//! - `MemoryFrameStore`：收集到共享内存（转发 / 测试）。

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use stomp::Frame;
use tracing::info;

const CSV_HEADER: [&str; 6] = [
	"received_at",
	"command",
	"destination",
	"message_id",
	"subscription",
	"body",
];

/// 帧处置能力。
pub trait FrameStore: Send {
	fn store(&mut self, frame: Frame) -> io::Result<()>;

	/// 消费者退出前调用一次。
	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl<S: FrameStore + ?Sized> FrameStore for Box<S> {
	fn store(&mut self, frame: Frame) -> io::Result<()> {
		(**self).store(frame)
	}

	fn flush(&mut self) -> io::Result<()> {
		(**self).flush()
	}
}

/// 只记录帧摘要的 store。
#[derive(Debug, Default)]
pub struct LogFrameStore {
	stored: u64,
}

impl LogFrameStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn stored(&self) -> u64 {
		self.stored
	}
}

impl FrameStore for LogFrameStore {
	fn store(&mut self, frame: Frame) -> io::Result<()> {
		self.stored = self.stored.saturating_add(1);
		info!(number = self.stored, "{}", frame.info());
		Ok(())
	}
}

/// CSV 中读回的一条帧记录。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFrame {
	pub received_at: String,
	pub command: String,
	pub destination: String,
	pub message_id: String,
	pub subscription: String,
	pub body: String,
}

/// CSV 帧存储（append-only，同步写盘）。
pub struct CsvFrameStore {
	path: PathBuf,
	writer: csv::Writer<File>,
	written_records: u64,
}

impl CsvFrameStore {
	/// 以 append 模式打开（不存在则创建并写表头）。
	pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
		let path = path.as_ref().to_path_buf();
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)?;
			}
		}

		let file = OpenOptions::new().create(true).append(true).open(&path)?;
		let is_new = file.metadata()?.len() == 0;
		let mut writer = csv::WriterBuilder::new()
			.has_headers(false)
			.from_writer(file);
		if is_new {
			writer.write_record(CSV_HEADER)?;
			writer.flush()?;
		}

		Ok(Self {
			path,
			writer,
			written_records: 0,
		})
	}

	/// 以指定接收时间写入一帧。
	pub fn append(&mut self, frame: &Frame, received_at: DateTime<Utc>) -> io::Result<()> {
		let body = frame.body_text();
		self.writer.write_record([
			received_at.to_rfc3339_opts(SecondsFormat::Millis, true).as_str(),
			frame.command.as_str(),
			frame.headers.destination().unwrap_or(""),
			frame.headers.message_id().unwrap_or(""),
			frame.headers.subscription().unwrap_or(""),
			&*body,
		])?;
		self.written_records = self.written_records.saturating_add(1);
		Ok(())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn written_records(&self) -> u64 {
		self.written_records
	}

	/// 顺序读取全部记录（用于校验）。
	pub fn read_all(path: impl AsRef<Path>) -> io::Result<Vec<StoredFrame>> {
		let mut reader = csv::ReaderBuilder::new()
			.has_headers(true)
			.from_path(path)?;
		let mut out = Vec::new();
		for record in reader.records() {
			let record = record?;
			let field = |index: usize| record.get(index).unwrap_or("").to_string();
			out.push(StoredFrame {
				received_at: field(0),
				command: field(1),
				destination: field(2),
				message_id: field(3),
				subscription: field(4),
				body: field(5),
			});
		}
		Ok(out)
	}
}

impl FrameStore for CsvFrameStore {
	fn store(&mut self, frame: Frame) -> io::Result<()> {
		self.append(&frame, Utc::now())
	}

	fn flush(&mut self) -> io::Result<()> {
		self.writer.flush()
	}
}

/// 内存帧存储，克隆共享同一缓冲区。
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameStore {
	frames: Arc<Mutex<Vec<Frame>>>,
}

impl MemoryFrameStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn frames(&self) -> Vec<Frame> {
		self.lock().clone()
	}

	pub fn len(&self) -> usize {
		self.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().is_empty()
	}

	fn lock(&self) -> MutexGuard<'_, Vec<Frame>> {
		self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

impl FrameStore for MemoryFrameStore {
	fn store(&mut self, frame: Frame) -> io::Result<()> {
		self.lock().push(frame);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use stomp::{Command, Frame};

	use super::{FrameStore, LogFrameStore, MemoryFrameStore};

	#[test]
	fn memory_store_clones_share_frames() {
		let store = MemoryFrameStore::new();
		let mut writer = store.clone();
		writer
			.store(Frame::new(Command::Message).with_body("a"))
			.expect("store");
		assert_eq!(store.len(), 1);
		assert_eq!(store.frames()[0].body, b"a");
	}

	#[test]
	fn log_store_counts_frames() {
		let mut store = LogFrameStore::new();
		store.store(Frame::new(Command::Message)).expect("store");
		store.store(Frame::new(Command::Message)).expect("store");
		assert_eq!(store.stored(), 2);
	}
}
