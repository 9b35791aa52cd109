//! Earthquake records as parsed from the upstream feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::EventId;

/// Epicentre position and hypocentre depth.
///
/// Field order follows the feed's `[longitude, latitude, depth]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinates {
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Depth below the surface in kilometres.
    pub depth_km: f64,
}

/// One event from the feed.
///
/// Records are immutable. A poll replaces the whole list rather than
/// patching individual records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EarthquakeRecord {
    /// Feed-assigned identifier, unique within one poll.
    pub id: EventId,
    /// Magnitude, if the feed reported one.
    ///
    /// Absent is not the same as zero: an absent magnitude never crosses
    /// a notification threshold.
    pub magnitude: Option<f64>,
    /// Human-readable location, e.g. `"10 km N of Asmara, Eritrea"`.
    pub place: String,
    /// Origin time of the event.
    pub occurred_at: DateTime<Utc>,
    /// Epicentre and depth.
    pub coordinates: Coordinates,
}

impl EarthquakeRecord {
    /// Whether this record's magnitude is present and at least `threshold`.
    pub fn meets_threshold(&self, threshold: f64) -> bool {
        self.magnitude.is_some_and(|magnitude| magnitude >= threshold)
    }
}
