use crate::errors::{AccessError, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Upper bound on the validity window of brokered credentials.
pub const MAX_SESSION_DURATION: Duration = Duration::from_secs(3600);

const SESSION_NAME_PREFIX: &str = "cop-session";

/// Short-lived storage credentials returned by the token exchange. Held only
/// for the duration of a single fetch, never persisted.
#[derive(Clone)]
pub struct TemporaryStorageCredentials {
    pub key_id: String,
    pub secret: String,
    pub session_token: Option<String>,
}

impl fmt::Debug for TemporaryStorageCredentials {
    // secret material stays out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemporaryStorageCredentials")
            .field("key_id", &self.key_id)
            .field("secret", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Upstream identity token service: swaps a bearer token for temporary
/// credentials scoped to a role.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        identity_token: &str,
        role_arn: &str,
        session_name: &str,
        duration: Duration,
    ) -> Result<TemporaryStorageCredentials>;
}

/// Exchanges a caller's identity token for temporary storage credentials.
///
/// Every call is independent: a fresh correlation label per exchange,
/// nothing cached across calls, validity capped at one hour. Callers
/// re-exchange per fetch.
pub struct CredentialBroker {
    exchanger: Arc<dyn TokenExchanger>,
    role_arn: String,
    duration: Duration,
}

impl CredentialBroker {
    pub fn new(exchanger: Arc<dyn TokenExchanger>, role_arn: impl Into<String>) -> Self {
        Self {
            exchanger,
            role_arn: role_arn.into(),
            duration: MAX_SESSION_DURATION,
        }
    }

    /// Override the validity window; values above the cap are clamped.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration.min(MAX_SESSION_DURATION);
        self
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub async fn exchange(&self, identity_token: &str) -> Result<TemporaryStorageCredentials> {
        let session_name = format!("{SESSION_NAME_PREFIX}-{}", Uuid::new_v4());
        debug!(%session_name, "exchanging identity token for storage credentials");

        let credentials = self
            .exchanger
            .exchange(identity_token, &self.role_arn, &session_name, self.duration)
            .await?;

        if credentials.key_id.is_empty() || credentials.secret.is_empty() {
            return Err(AccessError::CredentialExchange(
                "token service returned no credentials".into(),
            ));
        }
        Ok(credentials)
    }
}
