//! Configuration loading and typed config structures.
//!
//! The configuration lives in a YAML file (by default `quakewatch.yaml`
//! next to the binary). Every section and field has a default, so an
//! empty file, or no file at all, yields a working configuration that
//! watches the Horn of Africa for magnitude 5.0+ events once a minute.
//!
//! A few values can be overridden from the environment:
//!
//! - `QUAKEWATCH_FEED_URL` overrides `feed.endpoint_url`
//! - `QUAKEWATCH_POLL_INTERVAL_MS` overrides `poll.interval_ms`
//! - `QUAKEWATCH_THRESHOLD` overrides `notifier.threshold`

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use quakewatch_types::{BoundingBox, FeedQuery, TimeWindow};
use serde::Deserialize;

use crate::feed::{DEFAULT_FORMAT, validate_query};
use crate::notifier::NotifierConfig;
use crate::selection::SelectionConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuakewatchConfig {
    /// Upstream feed and query.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Poll cadence.
    #[serde(default)]
    pub poll: PollConfig,

    /// Alert threshold and dedup window.
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Stale-selection policy.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Permission flow.
    #[serde(default)]
    pub permissions: PermissionsConfig,

    /// Where notifications are delivered.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Log level and output format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QuakewatchConfig {
    /// Load configuration from a YAML file, apply environment overrides,
    /// and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("QUAKEWATCH_FEED_URL") {
            self.feed.endpoint_url = url;
        }
        if let Some(raw) = lookup("QUAKEWATCH_POLL_INTERVAL_MS") {
            self.poll.interval_ms = raw.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("invalid QUAKEWATCH_POLL_INTERVAL_MS: {e}"),
            })?;
        }
        if let Some(raw) = lookup("QUAKEWATCH_THRESHOLD") {
            self.notifier.threshold = raw.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("invalid QUAKEWATCH_THRESHOLD: {e}"),
            })?;
        }
        Ok(())
    }

    /// Reject values that would make the poller misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "poll.interval_ms must be at least 1".to_owned(),
            });
        }
        if !self.notifier.threshold.is_finite() {
            return Err(ConfigError::Invalid {
                reason: "notifier.threshold must be a finite number".to_owned(),
            });
        }
        if self.feed.endpoint_url.is_empty() {
            return Err(ConfigError::Invalid {
                reason: "feed.endpoint_url must not be empty".to_owned(),
            });
        }
        validate_query(&self.feed.query).map_err(|e| ConfigError::Invalid {
            reason: format!("feed.query: {e}"),
        })
    }
}

/// Upstream feed configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedConfig {
    /// Query endpoint URL.
    #[serde(default = "default_endpoint_url")]
    pub endpoint_url: String,

    /// Value of the `format` query parameter.
    #[serde(default = "default_format")]
    pub format: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Time window and bounding box to request.
    #[serde(default = "default_query")]
    pub query: FeedQuery,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint_url: default_endpoint_url(),
            format: default_format(),
            request_timeout_ms: default_request_timeout_ms(),
            query: default_query(),
        }
    }
}

impl FeedConfig {
    /// Per-request timeout as a [`Duration`].
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_endpoint_url() -> String {
    "https://earthquake.usgs.gov/fdsnws/event/1/query".to_owned()
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

/// 2025-01-01T00:00:00Z in epoch milliseconds.
const DEFAULT_WINDOW_START_MS: i64 = 1_735_689_600_000;

/// 2025-01-08T00:00:00Z in epoch milliseconds.
const DEFAULT_WINDOW_END_MS: i64 = 1_736_294_400_000;

fn default_query() -> FeedQuery {
    FeedQuery {
        window: TimeWindow {
            start: DateTime::<Utc>::from_timestamp_millis(DEFAULT_WINDOW_START_MS)
                .unwrap_or_default(),
            end: DateTime::<Utc>::from_timestamp_millis(DEFAULT_WINDOW_END_MS).unwrap_or_default(),
        },
        bbox: BoundingBox {
            min_latitude: 3.4,
            max_latitude: 15.0,
            min_longitude: 33.0,
            max_longitude: 48.0,
        },
    }
}

/// Poll cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PollConfig {
    /// Milliseconds between the start of consecutive polls.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

impl PollConfig {
    /// Interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

const fn default_interval_ms() -> u64 {
    60_000
}

/// Permission flow settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PermissionsConfig {
    /// Send a confirmation notification right after permission is first
    /// granted.
    #[serde(default = "default_true")]
    pub send_test_notification: bool,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            send_test_notification: true,
        }
    }
}

const fn default_true() -> bool {
    true
}

/// Which notification sink the runner wires up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// Write notifications to the log.
    #[default]
    Log,
    /// Deliver notifications through a push service using the push token.
    Push,
}

/// Notification sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SinkConfig {
    /// Sink implementation.
    #[serde(default)]
    pub kind: SinkKind,

    /// Push service endpoint, used when `kind` is `push`.
    #[serde(default = "default_push_url")]
    pub push_url: String,

    /// Per-request timeout in milliseconds for the push service.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::default(),
            push_url: default_push_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_push_url() -> String {
    "https://exp.host/--/api/v2/push/send".to_owned()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use chrono::TimeZone;

    use crate::selection::StalePolicy;

    use super::*;

    fn parse_without_env(yaml: &str) -> Result<QuakewatchConfig, ConfigError> {
        let config: QuakewatchConfig = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = QuakewatchConfig::default();
        assert_eq!(config.poll.interval_ms, 60_000);
        assert!((config.notifier.threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.notifier.dedup_window_size, 256);
        assert_eq!(config.selection.stale_policy, StalePolicy::Clear);
        assert!(config.permissions.send_test_notification);
        assert_eq!(config.sink.kind, SinkKind::Log);
        assert_eq!(
            config.feed.query.window.start,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            config.feed.query.window.end,
            Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap()
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = parse_without_env("{}").unwrap();
        assert_eq!(config, QuakewatchConfig::default());
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let yaml = r#"
poll:
  interval_ms: 30000
notifier:
  threshold: 4.5
  dedup_window_size: 0
selection:
  stale_policy: keep_stale
sink:
  kind: push
logging:
  format: json
feed:
  query:
    window:
      start: "2024-06-01T00:00:00Z"
      end: "2024-06-02T00:00:00Z"
    bbox:
      min_latitude: -10.0
      max_latitude: 10.0
      min_longitude: 100.0
      max_longitude: 120.0
"#;
        let config = parse_without_env(yaml).unwrap();
        assert_eq!(config.poll.interval(), Duration::from_secs(30));
        assert!((config.notifier.threshold - 4.5).abs() < f64::EPSILON);
        assert_eq!(config.notifier.dedup_window_size, 0);
        assert_eq!(config.selection.stale_policy, StalePolicy::KeepStale);
        assert_eq!(config.sink.kind, SinkKind::Push);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!((config.feed.query.bbox.min_latitude + 10.0).abs() < f64::EPSILON);
        assert_eq!(config.feed.endpoint_url, default_endpoint_url());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = parse_without_env("poll:\n  interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn inverted_bbox_is_rejected() {
        let yaml = r#"
feed:
  query:
    window:
      start: "2025-01-01T00:00:00Z"
      end: "2025-01-08T00:00:00Z"
    bbox:
      min_latitude: 15.0
      max_latitude: 3.4
      min_longitude: 33.0
      max_longitude: 48.0
"#;
        let err = parse_without_env(yaml).unwrap_err();
        assert!(err.to_string().contains("feed.query"));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = parse_without_env("poll: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("QUAKEWATCH_FEED_URL", "http://localhost:9000/query"),
            ("QUAKEWATCH_POLL_INTERVAL_MS", "1500"),
            ("QUAKEWATCH_THRESHOLD", "6.5"),
        ]);
        let mut config = QuakewatchConfig::default();

        config
            .apply_overrides(|key| env.get(key).map(|v| (*v).to_owned()))
            .unwrap();

        assert_eq!(config.feed.endpoint_url, "http://localhost:9000/query");
        assert_eq!(config.poll.interval_ms, 1500);
        assert!((config.notifier.threshold - 6.5).abs() < f64::EPSILON);
    }

    #[test]
    fn unparsable_override_is_invalid() {
        let mut config = QuakewatchConfig::default();
        let err = config
            .apply_overrides(|key| (key == "QUAKEWATCH_THRESHOLD").then(|| "high".to_owned()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn non_finite_threshold_is_invalid() {
        for raw in ["NaN", "inf", "-inf"] {
            let mut config = QuakewatchConfig::default();
            config
                .apply_overrides(|key| (key == "QUAKEWATCH_THRESHOLD").then(|| raw.to_owned()))
                .unwrap();

            let err = config.validate().unwrap_err();

            assert!(
                matches!(&err, ConfigError::Invalid { reason } if reason.contains("threshold")),
                "{raw}: {err}"
            );
        }
    }
}
