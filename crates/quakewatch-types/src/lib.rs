//! Shared type definitions for the Quakewatch earthquake poller.
//!
//! This crate is the single source of truth for the records, queries, and
//! identifiers that flow between the feed client, the notifier, the
//! scheduler, and the presentation layer. Types defined here are exported
//! to `TypeScript` via `ts-rs` so a mobile front end renders the same shapes.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers (feed event ids, notification ids, push tokens)
//! - [`record`] -- [`EarthquakeRecord`] and its [`Coordinates`]
//! - [`query`] -- [`FeedQuery`] time window and bounding box

pub mod ids;
pub mod query;
pub mod record;

pub use ids::{EventId, NotificationId, PushToken};
pub use query::{BoundingBox, FeedQuery, TimeWindow};
pub use record::{Coordinates, EarthquakeRecord};
