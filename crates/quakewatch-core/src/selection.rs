//! Record list and selected-record pointer for the presentation layer.
//!
//! The scheduler pushes each successful poll's records in through
//! [`SelectionStore::replace_records`]; the presentation layer reads
//! [`current`](SelectionStore::current) and calls
//! [`select`](SelectionStore::select) / [`clear`](SelectionStore::clear) on
//! user interaction.
//!
//! When a poll drops the selected id, [`StalePolicy`] decides whether the
//! selection is cleared (default) or keeps showing the last copy. When the
//! id is still present, the selection follows the newest copy of it.

use std::sync::Arc;

use quakewatch_types::{EarthquakeRecord, EventId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// What happens to a selection whose id vanished from the latest poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Drop the selection.
    #[default]
    Clear,
    /// Keep showing the record as it was last seen.
    KeepStale,
}

/// Selection settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SelectionConfig {
    /// Policy for selections that disappear upstream.
    #[serde(default)]
    pub stale_policy: StalePolicy,
}

/// Records visible to the presentation layer plus the selected one.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    /// Records from the latest successful poll.
    pub records: Arc<[EarthquakeRecord]>,
    /// The record shown in detail, if any.
    pub selected: Option<EarthquakeRecord>,
}

/// Shared, lock-guarded [`SelectionState`].
#[derive(Debug, Default)]
pub struct SelectionStore {
    state: RwLock<SelectionState>,
    policy: StalePolicy,
}

impl SelectionStore {
    /// Create an empty store with the given stale-selection policy.
    pub fn new(policy: StalePolicy) -> Self {
        Self {
            state: RwLock::new(SelectionState::default()),
            policy,
        }
    }

    /// The configured policy.
    pub const fn policy(&self) -> StalePolicy {
        self.policy
    }

    /// Select the record with `id`.
    ///
    /// Returns `false` and leaves the selection untouched if no current
    /// record has that id.
    pub async fn select(&self, id: &EventId) -> bool {
        let mut state = self.state.write().await;
        let found = state.records.iter().find(|record| &record.id == id).cloned();
        match found {
            Some(record) => {
                state.selected = Some(record);
                true
            }
            None => {
                debug!(event_id = %id, "select ignored, id not in current records");
                false
            }
        }
    }

    /// Clear the selection.
    pub async fn clear(&self) {
        self.state.write().await.selected = None;
    }

    /// The selected record, if any.
    pub async fn current(&self) -> Option<EarthquakeRecord> {
        self.state.read().await.selected.clone()
    }

    /// The records from the latest successful poll.
    pub async fn records(&self) -> Arc<[EarthquakeRecord]> {
        Arc::clone(&self.state.read().await.records)
    }

    /// Snapshot of records and selection taken under one lock.
    pub async fn snapshot(&self) -> SelectionState {
        self.state.read().await.clone()
    }

    /// Replace the record list and reconcile the selection against it.
    pub async fn replace_records(&self, records: Arc<[EarthquakeRecord]>) {
        let mut state = self.state.write().await;

        if let Some(selected_id) = state.selected.as_ref().map(|record| record.id.clone()) {
            match records.iter().find(|record| record.id == selected_id) {
                Some(latest) => state.selected = Some(latest.clone()),
                None if self.policy == StalePolicy::Clear => {
                    debug!(event_id = %selected_id, "selected record left the feed, clearing");
                    state.selected = None;
                }
                None => {
                    debug!(event_id = %selected_id, "selected record left the feed, keeping stale copy");
                }
            }
        }

        state.records = records;
    }
}
