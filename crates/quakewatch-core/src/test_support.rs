//! Shared fakes for unit tests.

#![allow(clippy::unwrap_used, clippy::missing_const_for_fn)]

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use quakewatch_types::{Coordinates, EarthquakeRecord, EventId, FeedQuery, NotificationId};

use crate::feed::{FeedClient, FetchError};
use crate::notifier::{DispatchError, NotificationSink};

/// Build a record with a fixed place and position.
pub fn quake(id: &str, magnitude: Option<f64>) -> EarthquakeRecord {
    EarthquakeRecord {
        id: EventId::new(id),
        magnitude,
        place: format!("Place {id}"),
        occurred_at: DateTime::<Utc>::from_timestamp_millis(1_735_776_000_000).unwrap(),
        coordinates: Coordinates {
            longitude: 40.0,
            latitude: 10.0,
            depth_km: 10.0,
        },
    }
}

/// One notification captured by [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

/// Sink that records every notification and can reject chosen ids.
#[derive(Debug, Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<SentNotification>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn failing_for<const N: usize>(ids: [&str; N]) -> Self {
        Self {
            sent: Mutex::default(),
            failing: Mutex::new(ids.iter().map(|id| (*id).to_owned()).collect()),
        }
    }

    pub fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    async fn schedule(
        &self,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> Result<NotificationId, DispatchError> {
        let event_id = payload
            .get("quake")
            .and_then(|quake| quake.get("id"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_owned();
        if self.failing.lock().unwrap().contains(&event_id) {
            return Err(DispatchError::SinkUnavailable {
                detail: format!("rejected {event_id}"),
            });
        }
        self.sent.lock().unwrap().push(SentNotification {
            title: title.to_owned(),
            body: body.to_owned(),
            payload: payload.clone(),
        });
        Ok(NotificationId::new())
    }
}

/// Feed that replays scripted responses, then returns an empty list.
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    responses: Mutex<VecDeque<Result<Vec<EarthquakeRecord>, FetchError>>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Option<Duration>,
}

impl ScriptedFeed {
    pub fn new(responses: Vec<Result<Vec<EarthquakeRecord>, FetchError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl FeedClient for ScriptedFeed {
    async fn fetch(&self, _query: &FeedQuery) -> Result<Vec<EarthquakeRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(Vec::new()))
    }
}
