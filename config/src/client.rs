use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "tcp://datafeeds.networkrail.co.uk:61618";
pub const PASSWORD_ENV: &str = "NRFEED_PASSWORD";
pub const DEFAULT_FRAME_COUNT: u64 = 10;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 600;
const FALLBACK_TIMEOUT_MS: u64 = 800;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    #[default]
    Log,
    Csv { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub topics: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub queues: Vec<String>,
    #[serde(default = "default_beat")]
    pub beat: [u32; 2],
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_frame_count")]
    pub frame_count: Option<u64>,
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: Option<u64>,
    #[serde(default)]
    pub store: StoreConfig,
}

impl ClientConfig {
    pub fn new(username: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            username: username.into(),
            password: String::new(),
            endpoint: default_endpoint(),
            topics,
            queues: Vec::new(),
            beat: default_beat(),
            timeout_ms: None,
            frame_count: default_frame_count(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_backoff_secs: default_max_backoff_secs(),
            store: StoreConfig::Log,
        }
    }

    /// Connect / readiness timeout: explicit value, else 80% of the client
    /// heartbeat interval.
    pub fn timeout(&self) -> Duration {
        let millis = self
            .timeout_ms
            .unwrap_or(u64::from(self.beat[0]) * 8 / 10);
        if millis == 0 {
            Duration::from_millis(FALLBACK_TIMEOUT_MS)
        } else {
            Duration::from_millis(millis)
        }
    }

    /// `None` means run until an error frame.
    pub fn frame_budget(&self) -> Option<u64> {
        self.frame_count.filter(|count| *count > 0)
    }

    pub fn max_backoff(&self) -> Option<Duration> {
        self.max_backoff_secs.map(Duration::from_secs)
    }

    /// Configured password, falling back to the environment when blank.
    pub fn resolved_password(&self) -> String {
        if !self.password.is_empty() {
            return self.password.clone();
        }
        std::env::var(PASSWORD_ENV).unwrap_or_default()
    }

    /// True when neither the file nor `NRFEED_PASSWORD` supplies a password.
    pub fn missing_password(&self) -> bool {
        self.resolved_password().is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("username is required".to_string()));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint is required".to_string()));
        }
        if self.topics.is_empty() && self.queues.is_empty() {
            return Err(ConfigError::Invalid("no valid subscriptions".to_string()));
        }
        if let Some(blank) = self
            .topics
            .iter()
            .chain(self.queues.iter())
            .find(|name| name.trim().is_empty() || name.contains('/'))
        {
            return Err(ConfigError::Invalid(format!(
                "destination name {blank:?} must be a bare topic or queue name"
            )));
        }
        if let StoreConfig::Csv { path } = &self.store {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid("csv store needs a path".to_string()));
            }
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_beat() -> [u32; 2] {
    [1000, 1000]
}

fn default_frame_count() -> Option<u64> {
    Some(DEFAULT_FRAME_COUNT)
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

fn default_max_backoff_secs() -> Option<u64> {
    Some(DEFAULT_MAX_BACKOFF_SECS)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

/// Accepts `topics: NAME` as shorthand for a one-element list.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
        None => Vec::new(),
    })
}
