pub mod adapters;
pub mod backoff;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod subscription;

pub use adapters::{MockEngine, MockProbe, MockReadiness, TcpStompEngine};
pub use backoff::{thread_sleeper, BackoffState, ReconnectPolicy, Sleeper};
pub use error::{EngineError, SessionError};
pub use manager::{
    ConnectOutcome, ConnectionManager, ConnectionState, Readiness, SessionConfig, SessionStats,
};
pub use protocol::{ConnectRequest, Credentials, ProtocolEngine, SubscriptionToken};
pub use subscription::{
    Destination, ReplaySummary, SubscribeOutcome, Subscription, SubscriptionRegistry,
};
