//! Feed client seam and feed document parsing.
//!
//! The [`FeedClient`] trait abstracts how a poll obtains records: the
//! runner implements it over HTTP, tests implement it with scripted
//! fakes. Everything that does not need a socket lives here so it can be
//! exercised without one: query validation, query-string construction,
//! and parsing of the `GeoJSON` event document.
//!
//! # Parsing rules
//!
//! - `properties.mag` may be `null` or missing. It maps to `None`, never
//!   to `0.0`.
//! - `properties.place` may be `null`. It maps to an empty string.
//! - `properties.time` is epoch milliseconds.
//! - `geometry.coordinates` must hold at least `[lon, lat, depth]`.
//! - A repeated feature id keeps its first occurrence; later copies are
//!   dropped so ids stay unique within one poll.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::DateTime;
use quakewatch_types::{Coordinates, EarthquakeRecord, EventId, FeedQuery};
use serde::Deserialize;
use tracing::warn;

/// Upstream format parameter for `GeoJSON` documents.
pub const DEFAULT_FORMAT: &str = "geojson";

/// Timestamp layout accepted by the upstream `starttime`/`endtime` parameters.
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Transport failure or non-2xx status.
    Network,
    /// The body was received but is not a valid feed document.
    Parse,
}

/// Errors returned by [`FeedClient::fetch`].
///
/// Cloneable so the scheduler can keep the last one in
/// [`PollState::last_poll_error`](crate::state::PollState::last_poll_error).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request failed or the server answered with a non-2xx status.
    #[error("network error: {detail}")]
    Network {
        /// What went wrong.
        detail: String,
    },

    /// The response body could not be parsed into records.
    #[error("parse error: {detail}")]
    Parse {
        /// What went wrong.
        detail: String,
    },
}

impl FetchError {
    /// Return the coarse error kind.
    pub const fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Network { .. } => FetchErrorKind::Network,
            Self::Parse { .. } => FetchErrorKind::Parse,
        }
    }

    /// Return the human-readable detail.
    pub fn detail(&self) -> &str {
        match self {
            Self::Network { detail } | Self::Parse { detail } => detail,
        }
    }
}

/// Reasons a [`FeedQuery`] is rejected before any request is made.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// `window.start` is after `window.end`.
    #[error("time window start is after its end")]
    InvertedWindow,

    /// A latitude bound is outside `[-90, 90]` or not finite.
    #[error("latitude {value} is outside [-90, 90]")]
    LatitudeOutOfRange {
        /// The offending value.
        value: f64,
    },

    /// A longitude bound is outside `[-180, 180]` or not finite.
    #[error("longitude {value} is outside [-180, 180]")]
    LongitudeOutOfRange {
        /// The offending value.
        value: f64,
    },

    /// `min_latitude` is greater than `max_latitude`.
    #[error("min_latitude is greater than max_latitude")]
    InvertedLatitude,

    /// `min_longitude` is greater than `max_longitude`.
    #[error("min_longitude is greater than max_longitude")]
    InvertedLongitude,
}

/// A source of earthquake records.
///
/// Implementations perform exactly one upstream request per call and
/// never touch shared state. Failures come back as a tagged
/// [`FetchError`]; nothing panics past this boundary.
pub trait FeedClient: Send + Sync {
    /// Fetch all records matching `query`, in upstream order.
    fn fetch(
        &self,
        query: &FeedQuery,
    ) -> impl Future<Output = Result<Vec<EarthquakeRecord>, FetchError>> + Send;
}

impl<T: FeedClient> FeedClient for Arc<T> {
    fn fetch(
        &self,
        query: &FeedQuery,
    ) -> impl Future<Output = Result<Vec<EarthquakeRecord>, FetchError>> + Send {
        (**self).fetch(query)
    }
}

/// Check that a query describes a bounded, well-formed region and window.
pub fn validate_query(query: &FeedQuery) -> Result<(), QueryError> {
    if query.window.start > query.window.end {
        return Err(QueryError::InvertedWindow);
    }

    let bbox = &query.bbox;
    for value in [bbox.min_latitude, bbox.max_latitude] {
        if !(-90.0..=90.0).contains(&value) {
            return Err(QueryError::LatitudeOutOfRange { value });
        }
    }
    for value in [bbox.min_longitude, bbox.max_longitude] {
        if !(-180.0..=180.0).contains(&value) {
            return Err(QueryError::LongitudeOutOfRange { value });
        }
    }
    if bbox.min_latitude > bbox.max_latitude {
        return Err(QueryError::InvertedLatitude);
    }
    if bbox.min_longitude > bbox.max_longitude {
        return Err(QueryError::InvertedLongitude);
    }
    Ok(())
}

/// Build the upstream query-string pairs for `query`.
pub fn query_params(query: &FeedQuery, format: &str) -> Vec<(&'static str, String)> {
    vec![
        ("format", format.to_owned()),
        (
            "starttime",
            query.window.start.format(QUERY_TIME_FORMAT).to_string(),
        ),
        (
            "endtime",
            query.window.end.format(QUERY_TIME_FORMAT).to_string(),
        ),
        ("minlatitude", query.bbox.min_latitude.to_string()),
        ("maxlatitude", query.bbox.max_latitude.to_string()),
        ("minlongitude", query.bbox.min_longitude.to_string()),
        ("maxlongitude", query.bbox.max_longitude.to_string()),
    ]
}

// ---------------------------------------------------------------------------
// GeoJSON wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    id: String,
    properties: Properties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(default)]
    mag: Option<f64>,
    #[serde(default)]
    place: Option<String>,
    time: i64,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<f64>,
}

/// Parse a `GeoJSON` feed document into records.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the body is not a feature collection,
/// a timestamp is out of range, or a feature lacks a coordinate triple.
pub fn parse_feed(body: &str) -> Result<Vec<EarthquakeRecord>, FetchError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| FetchError::Parse {
            detail: format!("invalid feed document: {e}"),
        })?;

    let mut seen: HashSet<String> = HashSet::with_capacity(collection.features.len());
    let mut records = Vec::with_capacity(collection.features.len());

    for feature in collection.features {
        if !seen.insert(feature.id.clone()) {
            warn!(event_id = feature.id, "duplicate feature id in feed, keeping first");
            continue;
        }
        records.push(feature_to_record(feature)?);
    }

    Ok(records)
}

fn feature_to_record(feature: Feature) -> Result<EarthquakeRecord, FetchError> {
    let &[longitude, latitude, depth_km, ..] = feature.geometry.coordinates.as_slice() else {
        return Err(FetchError::Parse {
            detail: format!(
                "feature {} has {} coordinates, expected [lon, lat, depth]",
                feature.id,
                feature.geometry.coordinates.len()
            ),
        });
    };

    let occurred_at =
        DateTime::from_timestamp_millis(feature.properties.time).ok_or_else(|| {
            FetchError::Parse {
                detail: format!(
                    "feature {} has out-of-range time {}",
                    feature.id, feature.properties.time
                ),
            }
        })?;

    Ok(EarthquakeRecord {
        id: EventId::new(feature.id),
        magnitude: feature.properties.mag,
        place: feature.properties.place.unwrap_or_default(),
        occurred_at,
        coordinates: Coordinates {
            longitude,
            latitude,
            depth_km,
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use chrono::{TimeZone, Utc};
    use quakewatch_types::{BoundingBox, TimeWindow};

    use super::*;

    fn horn_of_africa_query() -> FeedQuery {
        FeedQuery {
            window: TimeWindow {
                start: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
            },
            bbox: BoundingBox {
                min_latitude: 3.4,
                max_latitude: 15.0,
                min_longitude: 33.0,
                max_longitude: 48.0,
            },
        }
    }

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "metadata": {"count": 3},
        "features": [
            {
                "type": "Feature",
                "id": "us7000a",
                "properties": {"mag": 4.2, "place": "20 km E of Awash, Ethiopia", "time": 1735776000000},
                "geometry": {"type": "Point", "coordinates": [40.3, 9.1, 10.0]}
            },
            {
                "type": "Feature",
                "id": "us7000b",
                "properties": {"mag": 5.6, "place": "Afar region", "time": 1735862400000},
                "geometry": {"type": "Point", "coordinates": [40.9, 11.2, 8.5]}
            },
            {
                "type": "Feature",
                "id": "us7000c",
                "properties": {"mag": null, "place": null, "time": 1735948800000},
                "geometry": {"type": "Point", "coordinates": [41.0, 12.0, 5.0]}
            }
        ]
    }"#;

    #[test]
    fn parses_features_in_upstream_order() {
        let records = parse_feed(SAMPLE).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["us7000a", "us7000b", "us7000c"]);

        let second = &records[1];
        assert_eq!(second.place, "Afar region");
        assert_eq!(
            second.occurred_at,
            Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap()
        );
        assert!((second.coordinates.longitude - 40.9).abs() < f64::EPSILON);
        assert!((second.coordinates.latitude - 11.2).abs() < f64::EPSILON);
        assert!((second.coordinates.depth_km - 8.5).abs() < f64::EPSILON);
    }

    #[test]
    fn null_magnitude_stays_absent() {
        let records = parse_feed(SAMPLE).unwrap();
        assert!(records[2].magnitude.is_none());
        assert!(records[2].place.is_empty());
    }

    #[test]
    fn missing_magnitude_field_stays_absent() {
        let body = r#"{"features": [{
            "id": "x1",
            "properties": {"time": 0},
            "geometry": {"coordinates": [1.0, 2.0, 3.0]}
        }]}"#;
        let records = parse_feed(body).unwrap();
        assert!(records[0].magnitude.is_none());
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let body = r#"{"features": [
            {"id": "dup", "properties": {"mag": 3.0, "place": "first", "time": 0},
             "geometry": {"coordinates": [1.0, 2.0, 3.0]}},
            {"id": "dup", "properties": {"mag": 6.0, "place": "second", "time": 0},
             "geometry": {"coordinates": [1.0, 2.0, 3.0]}}
        ]}"#;
        let records = parse_feed(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].place, "first");
    }

    #[test]
    fn short_coordinates_are_a_parse_error() {
        let body = r#"{"features": [{
            "id": "x1",
            "properties": {"mag": 3.0, "place": "p", "time": 0},
            "geometry": {"coordinates": [1.0, 2.0]}
        }]}"#;
        let err = parse_feed(body).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);
        assert!(err.detail().contains("x1"));
    }

    #[test]
    fn malformed_body_is_a_parse_error() {
        let err = parse_feed("<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);

        let err = parse_feed(r#"{"type": "FeatureCollection"}"#).unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Parse);
    }

    #[test]
    fn empty_feature_list_is_ok() {
        let records = parse_feed(r#"{"features": []}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn query_params_match_upstream_names() {
        let params = query_params(&horn_of_africa_query(), DEFAULT_FORMAT);
        let lookup = |key: &str| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };
        assert_eq!(lookup("format"), "geojson");
        assert_eq!(lookup("starttime"), "2025-01-01T00:00:00");
        assert_eq!(lookup("endtime"), "2025-01-08T00:00:00");
        assert_eq!(lookup("minlatitude"), "3.4");
        assert_eq!(lookup("maxlatitude"), "15");
        assert_eq!(lookup("minlongitude"), "33");
        assert_eq!(lookup("maxlongitude"), "48");
        assert_eq!(params.len(), 7);
    }

    #[test]
    fn valid_query_passes() {
        assert!(validate_query(&horn_of_africa_query()).is_ok());
    }

    #[test]
    fn inverted_window_is_rejected() {
        let mut query = horn_of_africa_query();
        std::mem::swap(&mut query.window.start, &mut query.window.end);
        assert_eq!(validate_query(&query), Err(QueryError::InvertedWindow));
    }

    #[test]
    fn out_of_range_bounds_are_rejected() {
        let mut query = horn_of_africa_query();
        query.bbox.max_latitude = 91.0;
        assert!(matches!(
            validate_query(&query),
            Err(QueryError::LatitudeOutOfRange { .. })
        ));

        let mut query = horn_of_africa_query();
        query.bbox.min_longitude = f64::NAN;
        assert!(matches!(
            validate_query(&query),
            Err(QueryError::LongitudeOutOfRange { .. })
        ));

        let mut query = horn_of_africa_query();
        query.bbox.min_latitude = 20.0;
        assert_eq!(validate_query(&query), Err(QueryError::InvertedLatitude));

        let mut query = horn_of_africa_query();
        query.bbox.min_longitude = 50.0;
        assert_eq!(validate_query(&query), Err(QueryError::InvertedLongitude));
    }
}
