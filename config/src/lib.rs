pub mod client;
pub mod error;
pub mod loader;

pub use client::{
    ClientConfig, StoreConfig, DEFAULT_ENDPOINT, DEFAULT_FRAME_COUNT, DEFAULT_MAX_BACKOFF_SECS,
    DEFAULT_PROGRESS_INTERVAL, PASSWORD_ENV,
};
pub use error::ConfigError;
pub use loader::{write_template, ConfigLoader, TEMPLATE};
