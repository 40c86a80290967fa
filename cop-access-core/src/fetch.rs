use crate::broker::{CredentialBroker, TemporaryStorageCredentials};
use crate::errors::{AccessError, Result};
use crate::locator::ObjectLocator;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Storage-layer failure, classified just enough for the fetcher to map
/// policy refusals onto the access-denial signal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,
    #[error("{0}")]
    Upstream(String),
}

/// Object store addressed by container and key. Implementations return the
/// whole object body; chunked transfers are aggregated behind this seam.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(
        &self,
        credentials: &TemporaryStorageCredentials,
        container: &str,
        key: &str,
    ) -> std::result::Result<Vec<u8>, StoreError>;
}

/// Document retrieved from the classified store; opaque beyond being
/// structured JSON.
pub type ClassifiedDocument = Value;

/// Resolves locators, brokers credentials, and retrieves classified
/// documents. No retries live at this layer; retry policy belongs to the
/// caller.
pub struct DocumentFetcher {
    broker: CredentialBroker,
    store: Arc<dyn ObjectStore>,
}

impl DocumentFetcher {
    pub fn new(broker: CredentialBroker, store: Arc<dyn ObjectStore>) -> Self {
        Self { broker, store }
    }

    pub fn broker(&self) -> &CredentialBroker {
        &self.broker
    }

    /// Fetch and parse the document at `locator_uri` on behalf of
    /// `identity_token`.
    ///
    /// A storage-layer "no such object" surfaces as
    /// [`AccessError::EntitlementDenied`]: the proxy refuses to materialize
    /// objects the caller is not entitled to, so absence is a policy answer,
    /// not a missing document.
    pub async fn fetch(
        &self,
        identity_token: &str,
        locator_uri: &str,
    ) -> Result<ClassifiedDocument> {
        let locator = ObjectLocator::parse(locator_uri)?;
        let credentials = self.broker.exchange(identity_token).await?;

        debug!(locator = %locator, "retrieving classified document");
        let bytes = self
            .store
            .get_object(&credentials, locator.container(), locator.key())
            .await
            .map_err(|err| match err {
                StoreError::NotFound => {
                    warn!(locator = %locator, "storage policy denied access");
                    AccessError::EntitlementDenied {
                        locator: locator.to_string(),
                    }
                }
                StoreError::Upstream(message) => AccessError::Storage(message),
            })?;

        decode_document(&bytes)
    }
}

fn decode_document(bytes: &[u8]) -> Result<ClassifiedDocument> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| AccessError::MalformedDocument(err.to_string()))?;
    serde_json::from_str(text).map_err(|err| AccessError::MalformedDocument(err.to_string()))
}
