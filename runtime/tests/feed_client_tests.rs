use std::sync::{Arc, Mutex};
use std::time::Duration;

use config::ClientConfig;
use handoff::{FrameConsumer, FrameQueue, MemoryFrameStore};
use runtime::{
	run_demo, ClientError, FeedClient, FeedSettings, FrameBudget, Orchestrator, RunEnd,
};
use session::adapters::{mock_error, mock_message, MockCall};
use session::{
	ConnectRequest, ConnectionManager, Credentials, EngineError, MockEngine,
	MockReadiness, ProtocolEngine, SessionConfig, Sleeper, SubscriptionToken,
};
use stomp::{Command, Frame, HeaderList};

fn manager(engine: MockEngine) -> ConnectionManager<MockEngine> {
	manager_with_sleeper(engine, Arc::new(|_: Duration| {}))
}

fn manager_with_sleeper(engine: MockEngine, sleeper: Sleeper) -> ConnectionManager<MockEngine> {
	let config = SessionConfig::new(Credentials::new("alice@example.com", "secret"));
	ConnectionManager::new(engine, config).with_sleeper(sleeper)
}

fn settings(topics: &[&str], budget: FrameBudget) -> FeedSettings {
	let mut settings = FeedSettings::new(topics.iter().map(|topic| topic.to_string()).collect());
	settings.budget = budget;
	settings.timeout = Duration::from_millis(1);
	settings
}

fn message_ids(frames: &[Frame]) -> Vec<String> {
	frames
		.iter()
		.map(|frame| frame.headers.message_id().unwrap_or_default().to_string())
		.collect()
}

#[test]
fn budget_enqueues_exactly_n_frames_then_disconnects() {
	let engine = MockEngine::new().with_messages("/topic/TRAIN_MVT_ALL_TOC", 8);
	let probe = engine.probe();
	let queue = FrameQueue::new();
	let mut client = FeedClient::new(
		manager(engine),
		settings(&["TRAIN_MVT_ALL_TOC"], FrameBudget::Limited(5)),
		queue.clone(),
	)
	.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.frames_enqueued, 5);
	assert_eq!(report.end, RunEnd::BudgetExhausted);
	assert_eq!(queue.len(), 5);
	assert_eq!(probe.acked().len(), 5);
	assert_eq!(probe.disconnect_calls(), 1);
	assert_eq!(report.subscribed, vec!["TRAIN_MVT_ALL_TOC".to_string()]);
}

#[test]
fn error_frame_ends_unbounded_run_cleanly() {
	let mut frames = (1..=3)
		.map(|index| mock_message("/topic/A", &format!("m-{}", index), "{}"))
		.collect::<Vec<_>>();
	frames.push(mock_error("session expired"));
	frames.push(mock_message("/topic/A", "m-4", "{}"));
	let engine = MockEngine::new().with_frames(frames);
	let probe = engine.probe();
	let queue = FrameQueue::new();
	let mut client =
		FeedClient::new(manager(engine), settings(&["A"], FrameBudget::Unbounded), queue.clone())
			.expect("client");

	let report = client.run().expect("error frame is not a failure");
	assert_eq!(report.frames_enqueued, 3);
	assert!(matches!(report.end, RunEnd::ErrorFrame(ref summary) if summary.starts_with("ERROR")));
	assert_eq!(queue.len(), 3);
	assert_eq!(probe.acked(), vec!["m-1", "m-2", "m-3"]);
	assert_eq!(probe.disconnect_calls(), 1);
}

#[test]
fn rejected_credentials_connect_once_and_never_subscribe() {
	let engine = MockEngine::new().with_connect_results(vec![Err(EngineError::Protocol(
		"login refused".to_string(),
	))]);
	let probe = engine.probe();
	let mut client = FeedClient::new(
		manager(engine),
		settings(&["A"], FrameBudget::Limited(1)),
		FrameQueue::new(),
	)
	.expect("client");

	let result = client.run();
	assert!(matches!(result, Err(ClientError::InvalidCredentials(_))));
	assert_eq!(probe.connect_calls(), 1);
	assert_eq!(probe.subscribe_calls(), 0);
}

#[test]
fn empty_topics_fail_before_connecting() {
	let engine = MockEngine::new();
	let probe = engine.probe();
	let result = FeedClient::new(
		manager(engine),
		settings(&[], FrameBudget::Limited(1)),
		FrameQueue::new(),
	);
	assert!(matches!(result, Err(ClientError::Config(_))));
	assert_eq!(probe.connect_calls(), 0);
}

#[test]
fn dropped_session_backs_off_and_resubscribes() {
	let engine = MockEngine::new()
		.with_connect_results(vec![
			Ok(()),
			Err(EngineError::Transport("refused".to_string())),
			Err(EngineError::Timeout("connect".to_string())),
			Ok(()),
		])
		.with_readiness(vec![
			MockReadiness::Ready,
			MockReadiness::Idle,
			MockReadiness::Ready,
			MockReadiness::Drop,
		])
		.with_messages("/topic/A", 5);
	let probe = engine.probe();
	let waits = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&waits);
	let sleeper: Sleeper = Arc::new(move |wait: Duration| {
		sink.lock().expect("wait log").push(wait);
	});
	let queue = FrameQueue::new();
	let mut client = FeedClient::new(
		manager_with_sleeper(engine, sleeper),
		settings(&["A"], FrameBudget::Limited(5)),
		queue.clone(),
	)
	.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.frames_enqueued, 5);
	assert_eq!(report.reconnects, 1);
	assert_eq!(probe.connect_calls(), 4);
	assert_eq!(
		*waits.lock().expect("wait log"),
		vec![Duration::from_secs(1), Duration::from_secs(2)]
	);
	assert_eq!(probe.subscribed_destinations(), vec!["/topic/A", "/topic/A"]);
	assert_eq!(client.manager().backoff().wait, Duration::from_secs(1));
}

#[test]
fn non_message_frames_are_skipped_without_ack() {
	let frames = vec![
		Frame::new(Command::Receipt).with_header("receipt-id", "r-1"),
		mock_message("/topic/A", "m-1", "{}"),
		mock_message("/topic/A", "m-2", "{}"),
	];
	let engine = MockEngine::new().with_frames(frames);
	let probe = engine.probe();
	let queue = FrameQueue::new();
	let mut client =
		FeedClient::new(manager(engine), settings(&["A"], FrameBudget::Limited(2)), queue.clone())
			.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.frames_enqueued, 2);
	assert_eq!(probe.acked(), vec!["m-1", "m-2"]);
	assert!(queue.try_pop().expect("first frame").is_message());
}

#[test]
fn rejected_topic_is_reported_as_skipped() {
	let engine = MockEngine::new()
		.rejecting("/topic/NOT_ENTITLED")
		.with_messages("/topic/RTPPM_ALL", 1);
	let mut client = FeedClient::new(
		manager(engine),
		settings(&["NOT_ENTITLED", "RTPPM_ALL"], FrameBudget::Limited(1)),
		FrameQueue::new(),
	)
	.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.subscribed, vec!["RTPPM_ALL".to_string()]);
	assert_eq!(report.skipped, vec!["NOT_ENTITLED".to_string()]);
}

/// Delegates to a `MockEngine` and records the handoff queue length at the
/// moment each acknowledgment is sent.
struct QueueWatchingEngine {
	inner: MockEngine,
	queue: FrameQueue,
	queued_at_ack: Arc<Mutex<Vec<usize>>>,
}

impl ProtocolEngine for QueueWatchingEngine {
	fn endpoint(&self) -> &str {
		self.inner.endpoint()
	}

	fn connect(&mut self, request: &ConnectRequest) -> Result<(), EngineError> {
		self.inner.connect(request)
	}

	fn subscribe(
		&mut self,
		destination: &str,
		headers: HeaderList,
	) -> Result<SubscriptionToken, EngineError> {
		self.inner.subscribe(destination, headers)
	}

	fn unsubscribe(&mut self, token: &SubscriptionToken) -> Result<(), EngineError> {
		self.inner.unsubscribe(token)
	}

	fn beat(&mut self) -> Result<(), EngineError> {
		self.inner.beat()
	}

	fn can_read(&mut self, timeout: Duration) -> Result<bool, EngineError> {
		self.inner.can_read(timeout)
	}

	fn receive_frame(&mut self) -> Result<Frame, EngineError> {
		self.inner.receive_frame()
	}

	fn ack(&mut self, frame: &Frame) -> Result<(), EngineError> {
		self.queued_at_ack.lock().expect("ack log").push(self.queue.len());
		self.inner.ack(frame)
	}

	fn disconnect(&mut self) -> Result<(), EngineError> {
		self.inner.disconnect()
	}
}

fn drain(queue: &FrameQueue) -> Vec<Frame> {
	std::iter::from_fn(|| queue.try_pop()).collect()
}

#[test]
fn every_frame_is_acknowledged_before_it_is_queued() {
	let inner = MockEngine::new().with_messages("/topic/A", 5);
	let probe = inner.probe();
	let queue = FrameQueue::new();
	let queued_at_ack = Arc::new(Mutex::new(Vec::new()));
	let engine = QueueWatchingEngine {
		inner,
		queue: queue.clone(),
		queued_at_ack: Arc::clone(&queued_at_ack),
	};
	let config = SessionConfig::new(Credentials::new("alice@example.com", "secret"));
	let manager = ConnectionManager::new(engine, config).with_sleeper(Arc::new(|_: Duration| {}));
	let mut client =
		FeedClient::new(manager, settings(&["A"], FrameBudget::Limited(5)), queue.clone())
			.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.frames_enqueued, 5);
	// The k-th ack must see only the k-1 frames queued before it.
	assert_eq!(*queued_at_ack.lock().expect("ack log"), vec![0, 1, 2, 3, 4]);
	assert_eq!(probe.acked(), vec!["msg-1", "msg-2", "msg-3", "msg-4", "msg-5"]);
	assert_eq!(message_ids(&drain(&queue)), probe.acked());
}

#[test]
fn failed_ack_drops_the_frame_and_reconnects() {
	let engine = MockEngine::new()
		.with_messages("/topic/A", 4)
		.failing_ack("msg-2");
	let probe = engine.probe();
	let queue = FrameQueue::new();
	let mut client =
		FeedClient::new(manager(engine), settings(&["A"], FrameBudget::Limited(3)), queue.clone())
			.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.frames_enqueued, 3);
	assert_eq!(report.reconnects, 1);
	assert_eq!(probe.connect_calls(), 2);
	assert_eq!(probe.subscribed_destinations(), vec!["/topic/A", "/topic/A"]);
	assert_eq!(probe.acked(), vec!["msg-1", "msg-2", "msg-3", "msg-4"]);
	assert_eq!(message_ids(&drain(&queue)), vec!["msg-1", "msg-3", "msg-4"]);
}

#[test]
fn failed_receive_reconnects_and_resumes() {
	let engine = MockEngine::new()
		.with_messages("/topic/A", 3)
		.failing_receives(1);
	let probe = engine.probe();
	let queue = FrameQueue::new();
	let mut client =
		FeedClient::new(manager(engine), settings(&["A"], FrameBudget::Limited(3)), queue.clone())
			.expect("client");

	let report = client.run().expect("run");
	assert_eq!(report.frames_enqueued, 3);
	assert_eq!(report.reconnects, 1);
	assert_eq!(probe.connect_calls(), 2);
	let receives = probe
		.calls()
		.iter()
		.filter(|call| matches!(call, MockCall::Receive))
		.count();
	assert_eq!(receives, 4);
	assert_eq!(message_ids(&drain(&queue)), vec!["msg-1", "msg-2", "msg-3"]);
}

#[test]
fn orchestrator_preserves_feed_order_end_to_end() {
	let engine = MockEngine::new().with_messages("/topic/A", 20);
	let orchestrator = Orchestrator::new().with_drain_poll(Duration::from_millis(1));
	let producer = FeedClient::new(
		manager(engine),
		settings(&["A"], FrameBudget::Limited(20)),
		orchestrator.queue(),
	)
	.expect("client");
	let store = MemoryFrameStore::new();
	let consumer = FrameConsumer::new(store.clone(), orchestrator.queue())
		.with_poll_interval(Duration::from_millis(5));

	let report = orchestrator.run(producer, consumer).expect("process");
	assert_eq!(report.run.frames_enqueued, 20);
	assert_eq!(report.stored, 20);
	assert_eq!(report.failed, 0);

	let expected = (1..=20).map(|index| format!("msg-{}", index)).collect::<Vec<_>>();
	assert_eq!(message_ids(&store.frames()), expected);
	assert!(orchestrator.queue().is_empty());
}

#[test]
fn orchestrator_surfaces_invalid_credentials() {
	let engine = MockEngine::new().with_connect_results(vec![Err(EngineError::Protocol(
		"bad login".to_string(),
	))]);
	let orchestrator = Orchestrator::new();
	let producer = FeedClient::new(
		manager(engine),
		settings(&["A"], FrameBudget::Limited(1)),
		orchestrator.queue(),
	)
	.expect("client");
	let consumer = FrameConsumer::new(MemoryFrameStore::new(), orchestrator.queue())
		.with_poll_interval(Duration::from_millis(5));

	let result = orchestrator.run(producer, consumer);
	assert!(matches!(result, Err(ClientError::InvalidCredentials(_))));
}

#[test]
fn demo_runs_through_a_dropped_connection() {
	let config = ClientConfig::new("demo@example.com", vec!["TRAIN_MVT_ALL_TOC".to_string()]);
	let report = run_demo(&config).expect("demo run");
	assert_eq!(report.run.frames_enqueued, 10);
	assert_eq!(report.run.reconnects, 1);
	assert_eq!(report.stored, 10);
}
