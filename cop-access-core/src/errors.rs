use thiserror::Error;

/// Result alias for the classified document path.
pub type Result<T> = std::result::Result<T, AccessError>;

/// Result alias for decryption operations.
pub type DecryptResult<T> = std::result::Result<T, DecryptError>;

/// Failures surfaced to callers of the credential broker and document
/// fetcher. Entitlement denial keeps its own variant at every boundary so
/// consumers can distinguish "access refused" from "broken".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("locator must match scheme://container/key: {value}")]
    InvalidLocator { value: String },
    #[error("credential exchange failed: {0}")]
    CredentialExchange(String),
    #[error("access denied by storage policy: {locator}")]
    EntitlementDenied { locator: String },
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl AccessError {
    /// Stable machine-readable code carried across layer boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::InvalidLocator { .. } => "invalid_locator",
            AccessError::CredentialExchange(_) => "credential_exchange",
            AccessError::EntitlementDenied { .. } => "entitlement_denied",
            AccessError::MalformedDocument(_) => "malformed_document",
            AccessError::Storage(_) => "storage",
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessError::EntitlementDenied { .. })
    }
}

/// Failures on the decryption path. These never escape the transform
/// pipeline; it degrades to live-only output instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecryptError {
    #[error("decryption engine not initialized")]
    EngineUnavailable,
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("worker unit stopped before replying")]
    WorkerGone,
}
