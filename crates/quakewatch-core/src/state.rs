//! Poll state owned by the scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use quakewatch_types::EarthquakeRecord;

use crate::feed::FetchError;

/// Results of the most recent polls.
///
/// Created fresh each time polling starts. `records` is replaced
/// wholesale on every successful poll and left untouched by a failed one,
/// so the presentation layer keeps showing the last good data.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Records from the last successful poll, in upstream order.
    pub records: Arc<[EarthquakeRecord]>,
    /// Error from the latest poll, cleared by the next success.
    pub last_poll_error: Option<FetchError>,
    /// Whether the poll loop is active.
    pub is_running: bool,
    /// Wall-clock time of the last successful poll.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Number of successful polls since start.
    pub successful_polls: u64,
    /// Number of failed polls since start.
    pub failed_polls: u64,
}

impl PollState {
    /// State for a freshly started poll loop.
    pub fn running() -> Self {
        Self {
            is_running: true,
            ..Self::default()
        }
    }

    /// Apply a successful poll.
    pub fn record_success(&mut self, records: Arc<[EarthquakeRecord]>) {
        self.records = records;
        self.last_poll_error = None;
        self.last_success_at = Some(Utc::now());
        self.successful_polls = self.successful_polls.saturating_add(1);
    }

    /// Apply a failed poll. Records are kept as they were.
    pub fn record_failure(&mut self, error: FetchError) {
        self.last_poll_error = Some(error);
        self.failed_polls = self.failed_polls.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::quake;

    use super::*;

    #[test]
    fn failure_keeps_previous_records() {
        let mut state = PollState::running();
        state.record_success(vec![quake("a", Some(3.0))].into());

        state.record_failure(FetchError::Network {
            detail: String::from("timeout"),
        });

        assert_eq!(state.records.len(), 1);
        assert!(state.last_poll_error.is_some());
        assert_eq!(state.successful_polls, 1);
        assert_eq!(state.failed_polls, 1);
    }

    #[test]
    fn success_replaces_records_and_clears_error() {
        let mut state = PollState::running();
        state.record_failure(FetchError::Parse {
            detail: String::from("bad json"),
        });

        state.record_success(vec![quake("b", None), quake("c", Some(1.0))].into());

        assert!(state.last_poll_error.is_none());
        assert_eq!(state.records.len(), 2);
        assert!(state.last_success_at.is_some());
    }
}
