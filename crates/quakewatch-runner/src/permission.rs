//! Permission provider for a headless daemon.
//!
//! There is no user to prompt. Permission counts as granted exactly when a
//! push token was supplied through `QUAKEWATCH_PUSH_TOKEN`.

use quakewatch_core::permission::{PermissionError, PermissionProvider, PermissionStatus};
use quakewatch_types::PushToken;

/// Grants permission iff a push token is configured.
#[derive(Debug, Clone)]
pub struct EnvPermissionProvider {
    token: Option<PushToken>,
}

impl EnvPermissionProvider {
    /// Create a provider holding `token`.
    pub const fn new(token: Option<PushToken>) -> Self {
        Self { token }
    }
}

impl PermissionProvider for EnvPermissionProvider {
    async fn status(&self) -> Result<PermissionStatus, PermissionError> {
        Ok(if self.token.is_some() {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        })
    }

    async fn request(&self) -> Result<bool, PermissionError> {
        Ok(self.token.is_some())
    }

    async fn get_token(&self) -> Result<PushToken, PermissionError> {
        self.token.clone().ok_or(PermissionError::Denied)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use quakewatch_core::permission::PermissionGate;

    use super::*;

    #[tokio::test]
    async fn token_present_grants() {
        let gate = PermissionGate::new(EnvPermissionProvider::new(Some(PushToken::new("tok"))));

        let grant = gate.acquire_grant().await.unwrap();

        assert_eq!(grant.token.as_str(), "tok");
        assert!(grant.newly_acquired);
    }

    #[tokio::test]
    async fn token_absent_denies() {
        let gate = PermissionGate::new(EnvPermissionProvider::new(None));

        assert_eq!(gate.acquire().await, Err(PermissionError::Denied));
    }
}
