//! Feed polling, threshold alerts, and record selection for Quakewatch.
//!
//! This crate is transport-agnostic. It talks to the outside world only
//! through three traits, implemented by the runner (HTTP, push service,
//! environment) and by in-memory fakes in tests.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `quakewatch.yaml` into
//!   strongly-typed structs, with environment overrides.
//! - [`feed`] -- [`FeedClient`] trait, query validation, query parameters,
//!   and `GeoJSON` response parsing.
//! - [`notifier`] -- [`NotificationSink`] trait, threshold evaluation, and
//!   the dedup window.
//! - [`permission`] -- [`PermissionProvider`] trait and the caching
//!   [`PermissionGate`].
//! - [`scheduler`] -- The start/stop poll loop.
//! - [`selection`] -- Selected-record store shared with the presentation
//!   layer.
//! - [`session`] -- Launch sequence tying permission and polling together.
//! - [`state`] -- Latest poll results and error.
//! - [`view`] -- Display strings and map regions for list and detail
//!   screens.
//!
//! [`FeedClient`]: feed::FeedClient
//! [`NotificationSink`]: notifier::NotificationSink
//! [`PermissionProvider`]: permission::PermissionProvider
//! [`PermissionGate`]: permission::PermissionGate

pub mod config;
pub mod feed;
pub mod notifier;
pub mod permission;
pub mod scheduler;
pub mod selection;
pub mod session;
pub mod state;
pub mod view;

#[cfg(test)]
mod test_support;
