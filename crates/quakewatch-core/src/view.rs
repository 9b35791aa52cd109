//! Display-ready projections of records for the presentation layer.
//!
//! Nothing here renders. These are plain values a list screen or a map
//! screen can bind to directly, so every front end words and formats
//! records the same way.

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};
use quakewatch_types::{EarthquakeRecord, EventId};
use serde::Serialize;

/// Shown when the latest poll returned no records.
pub const EMPTY_LIST_MESSAGE: &str = "No recent earthquakes detected.";

/// Span in degrees of the map region around a selected record.
pub const MAP_REGION_DELTA: f64 = 1.0;

/// Layout used for event times, e.g. `Wed, Jan 1, 2025 9:30 PM`.
const TIME_FORMAT: &str = "%a, %b %-d, %Y %-I:%M %p";

/// Render a magnitude, or `unknown` when the feed did not report one.
pub fn format_magnitude(magnitude: Option<f64>) -> String {
    magnitude.map_or_else(|| String::from("unknown"), |value| value.to_string())
}

/// Render an event time in `tz`.
pub fn format_time<Tz>(at: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(tz).format(TIME_FORMAT).to_string()
}

/// One row of the record list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRow {
    /// Record id, used as the row key.
    pub id: EventId,
    /// `Magnitude: 5.6 - Location: Afar region`.
    pub headline: String,
    /// Formatted event time.
    pub time_label: String,
}

/// Placeholder text for the list screen, or `None` when there are rows.
pub const fn empty_list_message(records: &[EarthquakeRecord]) -> Option<&'static str> {
    if records.is_empty() {
        Some(EMPTY_LIST_MESSAGE)
    } else {
        None
    }
}

/// Rows for every record, in feed order.
pub fn list_rows<Tz>(records: &[EarthquakeRecord], tz: &Tz) -> Vec<ListRow>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    records
        .iter()
        .map(|record| ListRow {
            id: record.id.clone(),
            headline: format!(
                "Magnitude: {} - Location: {}",
                format_magnitude(record.magnitude),
                record.place
            ),
            time_label: format_time(&record.occurred_at, tz),
        })
        .collect()
}

/// Visible map area centred on a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapRegion {
    /// Centre latitude.
    pub latitude: f64,
    /// Centre longitude.
    pub longitude: f64,
    /// Vertical span in degrees.
    pub latitude_delta: f64,
    /// Horizontal span in degrees.
    pub longitude_delta: f64,
}

/// Pin placed on the epicentre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    /// Pin latitude.
    pub latitude: f64,
    /// Pin longitude.
    pub longitude: f64,
    /// `Magnitude: 5.6`.
    pub title: String,
    /// The record's place.
    pub description: String,
}

/// Detail screen for the selected record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    /// Map area to show.
    pub region: MapRegion,
    /// Epicentre pin.
    pub marker: MapMarker,
    /// `Magnitude: 5.6`.
    pub magnitude_label: String,
    /// `Location: Afar region`.
    pub location_label: String,
    /// `Time: Fri, Jan 3, 2025 12:00 AM`.
    pub time_label: String,
    /// `Depth: 8.5 km`.
    pub depth_label: String,
}

/// Build the detail view for `record`.
pub fn detail_view<Tz>(record: &EarthquakeRecord, tz: &Tz) -> DetailView
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let magnitude_label = format!("Magnitude: {}", format_magnitude(record.magnitude));
    let coordinates = record.coordinates;

    DetailView {
        region: MapRegion {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            latitude_delta: MAP_REGION_DELTA,
            longitude_delta: MAP_REGION_DELTA,
        },
        marker: MapMarker {
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
            title: magnitude_label.clone(),
            description: record.place.clone(),
        },
        magnitude_label,
        location_label: format!("Location: {}", record.place),
        time_label: format!("Time: {}", format_time(&record.occurred_at, tz)),
        depth_label: format!("Depth: {} km", coordinates.depth_km),
    }
}
