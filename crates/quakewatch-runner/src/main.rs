//! Quakewatch daemon entry point.
//!
//! Polls the USGS event feed on a fixed interval, keeps the latest records
//! in memory, and raises an alert for every event at or above the
//! configured magnitude.
//!
//! # Architecture
//!
//! ```text
//! USGS feed --> PollScheduler --> PollState / SelectionStore
//!                     |
//!                     +--> ThresholdNotifier --> log | push service
//! ```
//!
//! Push delivery needs a token from `QUAKEWATCH_PUSH_TOKEN`. Without one
//! the daemon still polls and logs. Ctrl-C stops the poll loop cleanly.

mod config;
mod error;
mod permission;
mod sink;
mod usgs;

use std::sync::Arc;

use quakewatch_core::config::{LogFormat, LoggingConfig};
use quakewatch_core::notifier::ThresholdNotifier;
use quakewatch_core::permission::PermissionGate;
use quakewatch_core::scheduler::{PollScheduler, PollSettings};
use quakewatch_core::selection::SelectionStore;
use quakewatch_core::session::start_session;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigSource, RunnerEnv, load_config};
use crate::error::RunnerError;
use crate::permission::EnvPermissionProvider;
use crate::sink::DeliverySink;
use crate::usgs::UsgsFeedClient;

/// Application entry point.
///
/// Loads configuration, initializes logging, wires the feed client, sink,
/// and permission gate into a scheduler, starts the session, and runs
/// until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration, logging, or client setup fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = RunnerEnv::from_env();
    let (config, source) = load_config(&env.config_path)?;
    init_logging(&config.logging)?;
    if source == ConfigSource::Defaults {
        warn!(
            path = %env.config_path.display(),
            "config file not found, using defaults"
        );
    }

    info!(
        config_path = %env.config_path.display(),
        endpoint_url = config.feed.endpoint_url,
        interval_ms = config.poll.interval_ms,
        threshold = config.notifier.threshold,
        dedup_window_size = config.notifier.dedup_window_size,
        "quakewatch starting"
    );

    let gate = Arc::new(PermissionGate::new(EnvPermissionProvider::new(
        env.push_token,
    )));
    let sink = DeliverySink::from_config(&config.sink, Arc::clone(&gate))
        .map_err(RunnerError::from)?;
    info!(sink = sink.name(), "notification sink configured");

    let feed = UsgsFeedClient::new(&config.feed).map_err(RunnerError::from)?;
    let scheduler = PollScheduler::new(
        feed,
        ThresholdNotifier::new(sink, &config.notifier),
        Arc::new(SelectionStore::new(config.selection.stale_policy)),
        PollSettings {
            query: config.feed.query,
            interval: config.poll.interval(),
        },
    );

    let session = start_session(
        gate.as_ref(),
        &scheduler,
        config.permissions.send_test_notification,
    )
    .await;
    info!(push_enabled = session.push_enabled(), "session ready");

    tokio::signal::ctrl_c().await.map_err(RunnerError::from)?;
    info!("shutdown signal received");
    scheduler.stop().await;

    let state = scheduler.snapshot().await;
    info!(
        successful_polls = state.successful_polls,
        failed_polls = state.failed_polls,
        "quakewatch stopped"
    );
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), RunnerError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .map_err(|e| RunnerError::Logging(format!("invalid logging.level: {e}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
