use std::fs;
use std::path::Path;

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use tracing::info;

use crate::client::ClientConfig;
use crate::error::ConfigError;

pub const TEMPLATE: &str = r#"# nrfeed client configuration
username: ""
# leave blank to read the NRFEED_PASSWORD environment variable
password: ""
endpoint: "tcp://datafeeds.networkrail.co.uk:61618"

# the account must be subscribed to these feeds on the data feeds portal
topics:
  - TRAIN_MVT_ALL_TOC
#  - RTPPM_ALL
queues: []

# heart-beat [client_ms, server_ms]
beat: [1000, 1000]
# connect / readiness timeout, defaults to 80% of the client heart-beat
# timeout_ms: 800

# number of frames to collect, null for unlimited
frame_count: 10
progress_interval: 500
# upper bound on the reconnect wait, null to let it keep doubling
max_backoff_secs: 600

store:
  kind: log
#  kind: csv
#  path: frames.csv
"#;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Parses a YAML or JSON file, chosen by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;

        match path.extension().and_then(|x| x.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    pub fn from_json(text: &str) -> Result<ClientConfig, ConfigError> {
        let value: JsonValue = serde_json::from_str(text)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_yaml(text: &str) -> Result<ClientConfig, ConfigError> {
        let value: YamlValue = serde_yaml::from_str(text)?;
        Ok(serde_yaml::from_value(value)?)
    }
}

/// Writes the starter configuration; an existing file is left untouched.
pub fn write_template(path: impl AsRef<Path>) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return Err(ConfigError::Invalid(format!(
            "{} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, TEMPLATE)?;
    info!(path = %path.display(), "configuration template written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{ConfigLoader, TEMPLATE};
    use crate::client::StoreConfig;
    use crate::error::ConfigError;

    #[test]
    fn template_parses_with_defaults() {
        let config = ConfigLoader::from_yaml(TEMPLATE).expect("template should parse");
        assert_eq!(config.topics, vec!["TRAIN_MVT_ALL_TOC".to_string()]);
        assert_eq!(config.frame_count, Some(10));
        assert_eq!(config.store, StoreConfig::Log);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn yaml_accepts_single_topic_and_null_budget() {
        let config = ConfigLoader::from_yaml(
            "username: alice\ntopics: RTPPM_ALL\nframe_count: null\nmax_backoff_secs: null\n",
        )
        .expect("parse");
        assert_eq!(config.topics, vec!["RTPPM_ALL".to_string()]);
        assert_eq!(config.frame_budget(), None);
        assert_eq!(config.max_backoff(), None);
        assert_eq!(config.beat, [1000, 1000]);
    }

    #[test]
    fn json_reads_csv_store() {
        let config = ConfigLoader::from_json(
            r#"{"username": "alice", "topics": ["A", "B"], "beat": [5000, 0],
                "store": {"kind": "csv", "path": "out/frames.csv"}}"#,
        )
        .expect("parse");
        assert_eq!(config.topics.len(), 2);
        assert_eq!(config.beat, [5000, 0]);
        assert_eq!(
            config.store,
            StoreConfig::Csv {
                path: "out/frames.csv".into()
            }
        );
        assert_eq!(config.frame_count, Some(10));
    }

    #[test]
    fn missing_username_is_a_parse_error() {
        assert!(matches!(
            ConfigLoader::from_json(r#"{"topics": ["A"]}"#),
            Err(ConfigError::Json(_))
        ));
    }
}
