//! Threshold evaluation and notification dispatch.
//!
//! [`evaluate`] is a pure filter: a record qualifies when its magnitude is
//! present and at least the threshold. [`ThresholdNotifier`] adds the
//! side effects on top: it suppresses ids already notified inside a
//! bounded [`DedupWindow`], builds the alert content, and hands each
//! remaining record to a [`NotificationSink`].
//!
//! Dispatches within one batch run concurrently and independently. A
//! failing dispatch is logged and reported but never stops its siblings.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use quakewatch_types::{EarthquakeRecord, EventId, NotificationId};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::view::format_magnitude;

/// Title of every threshold alert.
pub const ALERT_TITLE: &str = "Earthquake Alert!";

/// Title of the one-off notification sent after permission is granted.
pub const TEST_NOTIFICATION_TITLE: &str = "Test Notification";

/// Body of the one-off notification sent after permission is granted.
pub const TEST_NOTIFICATION_BODY: &str = "This is a test notification";

/// Errors returned by a [`NotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The platform notification service could not be reached or refused
    /// the request.
    #[error("notification sink unavailable: {detail}")]
    SinkUnavailable {
        /// What went wrong.
        detail: String,
    },

    /// The notification content could not be encoded or was rejected.
    #[error("invalid notification payload: {detail}")]
    InvalidPayload {
        /// What went wrong.
        detail: String,
    },
}

/// Capability to schedule a local or push notification.
///
/// The core never talks to a platform notification API directly; it only
/// calls [`schedule`](Self::schedule).
pub trait NotificationSink: Send + Sync {
    /// Schedule a notification for immediate delivery.
    fn schedule(
        &self,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<NotificationId, DispatchError>> + Send;
}

impl<T: NotificationSink> NotificationSink for Arc<T> {
    fn schedule(
        &self,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> impl Future<Output = Result<NotificationId, DispatchError>> + Send {
        (**self).schedule(title, body, payload)
    }
}

/// Notifier settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NotifierConfig {
    /// Minimum magnitude that triggers an alert (inclusive).
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// How many recently notified ids to remember. `0` disables
    /// suppression, so every qualifying record is dispatched on every tick.
    #[serde(default = "default_dedup_window_size")]
    pub dedup_window_size: usize,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            dedup_window_size: default_dedup_window_size(),
        }
    }
}

const fn default_threshold() -> f64 {
    5.0
}

const fn default_dedup_window_size() -> usize {
    256
}

/// Return the records that cross `threshold`, preserving input order.
///
/// Records with an absent magnitude are always excluded.
pub fn evaluate(records: &[EarthquakeRecord], threshold: f64) -> Vec<&EarthquakeRecord> {
    records
        .iter()
        .filter(|record| record.meets_threshold(threshold))
        .collect()
}

/// Alert body for a record, e.g. `Magnitude: 5.6 at Afar region`.
pub fn alert_body(record: &EarthquakeRecord) -> String {
    format!(
        "Magnitude: {} at {}",
        format_magnitude(record.magnitude),
        record.place
    )
}

/// Alert payload carrying the full record under `quake`.
pub fn alert_payload(record: &EarthquakeRecord) -> Result<serde_json::Value, DispatchError> {
    let quake = serde_json::to_value(record).map_err(|e| DispatchError::InvalidPayload {
        detail: format!("failed to encode record {}: {e}", record.id),
    })?;
    let mut payload = serde_json::Map::new();
    payload.insert(String::from("quake"), quake);
    Ok(serde_json::Value::Object(payload))
}

// ---------------------------------------------------------------------------
// Dedup window
// ---------------------------------------------------------------------------

/// Most ids a new [`DedupWindow`] reserves space for.
const DEDUP_PREALLOC_LIMIT: usize = 1024;

/// Bounded FIFO set of recently notified ids.
///
/// Holds at most `capacity` ids; inserting beyond that evicts the oldest.
/// A capacity of zero disables the window entirely.
#[derive(Debug, Clone, Default)]
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<EventId>,
    members: HashSet<EventId>,
}

impl DedupWindow {
    /// Create a window remembering up to `capacity` ids.
    ///
    /// Storage grows on demand; only a small prefix is reserved up front.
    pub fn new(capacity: usize) -> Self {
        let reserve = capacity.min(DEDUP_PREALLOC_LIMIT);
        Self {
            capacity,
            order: VecDeque::with_capacity(reserve),
            members: HashSet::with_capacity(reserve),
        }
    }

    /// Whether suppression is active.
    pub const fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    /// Whether `id` was notified recently.
    pub fn contains(&self, id: &EventId) -> bool {
        self.members.contains(id)
    }

    /// Remember `id`, evicting the oldest entry when full.
    pub fn insert(&mut self, id: EventId) {
        if !self.is_enabled() || self.members.contains(&id) {
            return;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        self.members.insert(id.clone());
        self.order.push_back(id);
    }

    /// Number of remembered ids.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no ids are remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Outcome of one [`ThresholdNotifier::notify`] batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Records that crossed the threshold.
    pub qualifying: usize,
    /// Successfully scheduled notifications.
    pub dispatched: Vec<(EventId, NotificationId)>,
    /// Qualifying ids skipped because they were notified recently.
    pub suppressed: Vec<EventId>,
    /// Dispatches that the sink rejected.
    pub failed: Vec<(EventId, DispatchError)>,
}

impl DispatchReport {
    /// Number of dispatches attempted against the sink.
    pub fn attempted(&self) -> usize {
        self.dispatched.len().saturating_add(self.failed.len())
    }
}

/// Filters records by magnitude and dispatches alerts through a sink.
#[derive(Debug)]
pub struct ThresholdNotifier<S> {
    sink: S,
    threshold: f64,
    dedup: DedupWindow,
}

impl<S: NotificationSink> ThresholdNotifier<S> {
    /// Create a notifier that dispatches through `sink`.
    pub fn new(sink: S, config: &NotifierConfig) -> Self {
        Self {
            sink,
            threshold: config.threshold,
            dedup: DedupWindow::new(config.dedup_window_size),
        }
    }

    /// The configured threshold.
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The underlying sink.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// The dedup window.
    pub const fn dedup(&self) -> &DedupWindow {
        &self.dedup
    }

    /// Records in `records` that cross this notifier's threshold.
    pub fn evaluate<'a>(&self, records: &'a [EarthquakeRecord]) -> Vec<&'a EarthquakeRecord> {
        evaluate(records, self.threshold)
    }

    /// Dispatch one alert for `record`, bypassing threshold and dedup.
    pub async fn dispatch(&self, record: &EarthquakeRecord) -> Result<NotificationId, DispatchError> {
        let payload = alert_payload(record)?;
        self.sink
            .schedule(ALERT_TITLE, &alert_body(record), &payload)
            .await
    }

    /// Send the one-off confirmation notification.
    pub async fn send_test_notification(&self) -> Result<NotificationId, DispatchError> {
        self.sink
            .schedule(
                TEST_NOTIFICATION_TITLE,
                TEST_NOTIFICATION_BODY,
                &serde_json::Value::Null,
            )
            .await
    }

    /// Evaluate `records` and dispatch every qualifying record not
    /// notified within the dedup window.
    ///
    /// An id enters the window only after its dispatch succeeds, so a
    /// rejected dispatch is attempted again on the next batch.
    pub async fn notify(&mut self, records: &[EarthquakeRecord]) -> DispatchReport {
        let qualifying = self.evaluate(records);
        let mut report = DispatchReport {
            qualifying: qualifying.len(),
            ..DispatchReport::default()
        };

        let mut batch: HashSet<&EventId> = HashSet::with_capacity(qualifying.len());
        let mut pending = Vec::with_capacity(qualifying.len());
        for record in qualifying {
            let repeated = self.dedup.is_enabled()
                && (self.dedup.contains(&record.id) || !batch.insert(&record.id));
            if repeated {
                debug!(event_id = %record.id, "alert suppressed by dedup window");
                report.suppressed.push(record.id.clone());
            } else {
                pending.push(record);
            }
        }

        let this: &Self = self;
        let outcomes = join_all(
            pending
                .into_iter()
                .map(|record| async move { (record, this.dispatch(record).await) }),
        )
        .await;

        for (record, outcome) in outcomes {
            match outcome {
                Ok(notification_id) => {
                    debug!(
                        event_id = %record.id,
                        notification_id = %notification_id,
                        magnitude = ?record.magnitude,
                        "alert dispatched"
                    );
                    self.dedup.insert(record.id.clone());
                    report.dispatched.push((record.id.clone(), notification_id));
                }
                Err(error) => {
                    warn!(event_id = %record.id, error = %error, "alert dispatch failed");
                    report.failed.push((record.id.clone(), error));
                }
            }
        }

        report
    }
}
