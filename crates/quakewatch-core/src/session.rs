//! App-launch sequence: permission first, then polling.

use quakewatch_types::{NotificationId, PushToken};
use tracing::{info, warn};

use crate::feed::FeedClient;
use crate::notifier::{DispatchError, NotificationSink};
use crate::permission::{PermissionError, PermissionGate, PermissionProvider};
use crate::scheduler::PollScheduler;

/// What happened during [`start_session`].
#[derive(Debug)]
pub struct SessionStart {
    /// The push token, or why it could not be obtained.
    pub push: Result<PushToken, PermissionError>,
    /// Result of the confirmation notification, if one was sent.
    pub test_notification: Option<Result<NotificationId, DispatchError>>,
    /// Whether this call started the scheduler.
    pub polling_started: bool,
}

impl SessionStart {
    /// Whether push notifications are available this session.
    pub const fn push_enabled(&self) -> bool {
        self.push.is_ok()
    }
}

/// Acquire notification permission, then start polling.
///
/// Polling starts whether or not permission is granted. When
/// `send_test_notification` is set and the token was obtained by this call
/// (not from the gate's cache), a confirmation notification goes out
/// before the first poll.
pub async fn start_session<P, F, S>(
    gate: &PermissionGate<P>,
    scheduler: &PollScheduler<F, S>,
    send_test_notification: bool,
) -> SessionStart
where
    P: PermissionProvider,
    F: FeedClient + 'static,
    S: NotificationSink + 'static,
{
    let mut test_notification = None;
    let push = match gate.acquire_grant().await {
        Ok(grant) => {
            if grant.newly_acquired && send_test_notification {
                let sent = scheduler.send_test_notification().await;
                if let Err(e) = &sent {
                    warn!(error = %e, "test notification failed");
                }
                test_notification = Some(sent);
            }
            Ok(grant.token)
        }
        Err(e) => {
            warn!(error = %e, "push notifications unavailable, polling without them");
            Err(e)
        }
    };

    let polling_started = scheduler.start().await;
    info!(
        push_enabled = push.is_ok(),
        polling_started, "session started"
    );

    SessionStart {
        push,
        test_notification,
        polling_started,
    }
}
