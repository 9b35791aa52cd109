//! Feed query parameters.
//!
//! A [`FeedQuery`] has no optional fields. The caller always supplies a
//! bounded time window and a bounding box; an unbounded query would pull
//! the entire catalogue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Half-open interval of origin times to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TimeWindow {
    /// Earliest origin time (inclusive).
    pub start: DateTime<Utc>,
    /// Latest origin time.
    pub end: DateTime<Utc>,
}

/// Geographic rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BoundingBox {
    /// Southern edge.
    pub min_latitude: f64,
    /// Northern edge.
    pub max_latitude: f64,
    /// Western edge.
    pub min_longitude: f64,
    /// Eastern edge.
    pub max_longitude: f64,
}

/// Everything the feed client needs to issue one request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FeedQuery {
    /// Origin-time window.
    pub window: TimeWindow,
    /// Geographic filter.
    pub bbox: BoundingBox,
}
