//! One-shot acquisition of notification permission and a push token.
//!
//! [`PermissionGate`] asks the platform (through a [`PermissionProvider`])
//! for the current status, prompts only if permission is not already
//! granted, then fetches the push registration token. The token is cached;
//! later calls return it without prompting again.
//!
//! A denial is not fatal. Polling and in-app display work without push
//! capability, so callers log the error and carry on.

use std::future::Future;
use std::sync::Arc;

use quakewatch_types::PushToken;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Platform permission status before any prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Notifications are already allowed.
    Granted,
    /// The user previously refused.
    Denied,
    /// The user has not been asked yet.
    Undetermined,
}

/// Errors returned by [`PermissionGate::acquire`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermissionError {
    /// The user refused notification permission.
    #[error("notification permission denied")]
    Denied,

    /// The platform permission or push service failed.
    #[error("permission service unavailable: {detail}")]
    Unavailable {
        /// What went wrong.
        detail: String,
    },
}

/// Platform permission API.
pub trait PermissionProvider: Send + Sync {
    /// Current status without prompting.
    ///
    /// Platforms that cannot report it return
    /// [`PermissionStatus::Undetermined`], which leads to a prompt.
    fn status(&self) -> impl Future<Output = Result<PermissionStatus, PermissionError>> + Send {
        async { Ok(PermissionStatus::Undetermined) }
    }

    /// Prompt the user. Resolves to whether permission was granted.
    fn request(&self) -> impl Future<Output = Result<bool, PermissionError>> + Send;

    /// Fetch the push registration token. Only valid once granted.
    fn get_token(&self) -> impl Future<Output = Result<PushToken, PermissionError>> + Send;
}

impl<T: PermissionProvider> PermissionProvider for Arc<T> {
    fn status(&self) -> impl Future<Output = Result<PermissionStatus, PermissionError>> + Send {
        (**self).status()
    }

    fn request(&self) -> impl Future<Output = Result<bool, PermissionError>> + Send {
        (**self).request()
    }

    fn get_token(&self) -> impl Future<Output = Result<PushToken, PermissionError>> + Send {
        (**self).get_token()
    }
}

/// A successful acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// The push registration token.
    pub token: PushToken,
    /// `true` on the call that obtained the token, `false` when it came
    /// from the cache.
    pub newly_acquired: bool,
}

/// Caches the push token after the first successful acquisition.
#[derive(Debug)]
pub struct PermissionGate<P> {
    provider: P,
    token: Mutex<Option<PushToken>>,
}

impl<P: PermissionProvider> PermissionGate<P> {
    /// Create a gate over `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            token: Mutex::new(None),
        }
    }

    /// Acquire the push token, prompting if needed.
    pub async fn acquire(&self) -> Result<PushToken, PermissionError> {
        self.acquire_grant().await.map(|grant| grant.token)
    }

    /// Like [`acquire`](Self::acquire), also reporting whether this call
    /// obtained the token or returned the cached one.
    ///
    /// Concurrent callers are serialized so the user is prompted at most
    /// once per successful acquisition.
    pub async fn acquire_grant(&self) -> Result<Grant, PermissionError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            debug!("push token already acquired, returning cached token");
            return Ok(Grant {
                token: token.clone(),
                newly_acquired: false,
            });
        }

        let status = self.provider.status().await?;
        let granted = if status == PermissionStatus::Granted {
            true
        } else {
            debug!(status = ?status, "requesting notification permission");
            self.provider.request().await?
        };

        if !granted {
            warn!("notification permission denied");
            return Err(PermissionError::Denied);
        }

        let token = self.provider.get_token().await?;
        info!("push token acquired");
        *cached = Some(token.clone());
        Ok(Grant {
            token,
            newly_acquired: true,
        })
    }

    /// The cached token, if one was acquired.
    pub async fn token(&self) -> Option<PushToken> {
        self.token.lock().await.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeProvider {
        status: PermissionStatus,
        grant_on_request: bool,
        requests: AtomicUsize,
        token_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(status: PermissionStatus, grant_on_request: bool) -> Self {
            Self {
                status,
                grant_on_request,
                requests: AtomicUsize::new(0),
                token_calls: AtomicUsize::new(0),
            }
        }
    }

    impl PermissionProvider for FakeProvider {
        async fn status(&self) -> Result<PermissionStatus, PermissionError> {
            Ok(self.status)
        }

        async fn request(&self) -> Result<bool, PermissionError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.grant_on_request)
        }

        async fn get_token(&self) -> Result<PushToken, PermissionError> {
            self.token_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PushToken::new("ExponentPushToken[abc]"))
        }
    }

    struct BrokenProvider;

    impl PermissionProvider for BrokenProvider {
        async fn request(&self) -> Result<bool, PermissionError> {
            Ok(true)
        }

        async fn get_token(&self) -> Result<PushToken, PermissionError> {
            Err(PermissionError::Unavailable {
                detail: String::from("no push service"),
            })
        }
    }

    #[tokio::test]
    async fn prompts_when_undetermined_and_caches_token() {
        let provider = Arc::new(FakeProvider::new(PermissionStatus::Undetermined, true));
        let gate = PermissionGate::new(Arc::clone(&provider));

        let first = gate.acquire_grant().await.unwrap();
        let second = gate.acquire_grant().await.unwrap();

        assert!(first.newly_acquired);
        assert!(!second.newly_acquired);
        assert_eq!(first.token, second.token);
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
        assert_eq!(provider.token_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn already_granted_skips_prompt() {
        let provider = Arc::new(FakeProvider::new(PermissionStatus::Granted, false));
        let gate = PermissionGate::new(Arc::clone(&provider));

        let token = gate.acquire().await.unwrap();

        assert_eq!(token.as_str(), "ExponentPushToken[abc]");
        assert_eq!(provider.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn previously_denied_is_asked_again() {
        let provider = Arc::new(FakeProvider::new(PermissionStatus::Denied, true));
        let gate = PermissionGate::new(Arc::clone(&provider));

        assert!(gate.acquire().await.is_ok());
        assert_eq!(provider.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refusal_is_denied_and_not_cached() {
        let provider = Arc::new(FakeProvider::new(PermissionStatus::Undetermined, false));
        let gate = PermissionGate::new(Arc::clone(&provider));

        assert_eq!(gate.acquire().await, Err(PermissionError::Denied));
        assert!(gate.token().await.is_none());
        assert_eq!(provider.token_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn token_failure_is_unavailable() {
        let gate = PermissionGate::new(BrokenProvider);

        let err = gate.acquire().await.unwrap_err();

        assert!(matches!(err, PermissionError::Unavailable { .. }));
        assert!(gate.token().await.is_none());
    }
}
