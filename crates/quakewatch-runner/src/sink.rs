//! Notification sinks the runner can deliver through.
//!
//! Selected at startup from `sink.kind`. Uses enum dispatch so the
//! scheduler stays monomorphic over one sink type whichever is chosen.

use std::sync::Arc;
use std::time::Duration;

use quakewatch_core::config::{SinkConfig, SinkKind};
use quakewatch_core::notifier::{DispatchError, NotificationSink};
use quakewatch_core::permission::PermissionGate;
use quakewatch_types::NotificationId;
use serde::Serialize;
use tracing::info;

use crate::permission::EnvPermissionProvider;

/// Gate shared between the session and the push sink.
pub type SharedGate = Arc<PermissionGate<EnvPermissionProvider>>;

// ---------------------------------------------------------------------------
// Dispatch enum
// ---------------------------------------------------------------------------

/// The configured sink.
pub enum DeliverySink {
    /// Write to the log.
    Log(LogSink),
    /// POST to a push service.
    Push(PushSink),
}

impl DeliverySink {
    /// Build the sink named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the push HTTP client cannot be constructed.
    pub fn from_config(config: &SinkConfig, gate: SharedGate) -> Result<Self, reqwest::Error> {
        Ok(match config.kind {
            SinkKind::Log => Self::Log(LogSink),
            SinkKind::Push => Self::Push(PushSink::new(
                &config.push_url,
                Duration::from_millis(config.request_timeout_ms),
                gate,
            )?),
        })
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Log(_) => "log",
            Self::Push(_) => "push",
        }
    }
}

impl NotificationSink for DeliverySink {
    async fn schedule(
        &self,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> Result<NotificationId, DispatchError> {
        match self {
            Self::Log(sink) => sink.schedule(title, body, payload).await,
            Self::Push(sink) => sink.schedule(title, body, payload).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Log sink
// ---------------------------------------------------------------------------

/// Emits each notification as an `info` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn schedule(
        &self,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> Result<NotificationId, DispatchError> {
        let id = NotificationId::new();
        info!(notification_id = %id, title, body, data = %payload, "notification");
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Push sink
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PushMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
}

/// Delivers through an Expo-style push endpoint addressed by push token.
pub struct PushSink {
    client: reqwest::Client,
    push_url: String,
    gate: SharedGate,
}

impl PushSink {
    /// Create a sink posting to `push_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(push_url: &str, timeout: Duration, gate: SharedGate) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            push_url: push_url.to_owned(),
            gate,
        })
    }
}

impl NotificationSink for PushSink {
    async fn schedule(
        &self,
        title: &str,
        body: &str,
        payload: &serde_json::Value,
    ) -> Result<NotificationId, DispatchError> {
        let token = self
            .gate
            .token()
            .await
            .ok_or_else(|| DispatchError::SinkUnavailable {
                detail: "no push token acquired".to_owned(),
            })?;

        let message = PushMessage {
            to: token.as_str(),
            title,
            body,
            data: payload,
        };

        let response = self
            .client
            .post(&self.push_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| DispatchError::SinkUnavailable {
                detail: format!("push request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(DispatchError::SinkUnavailable {
                detail: format!("push service returned {status}: {error_body}"),
            });
        }

        let id = NotificationId::new();
        info!(notification_id = %id, title, "push notification sent");
        Ok(id)
    }
}
