//! Client-side secure object access core for situational-awareness
//! consumers: a decryption worker pool, a merge/cache pipeline for decrypted
//! and live record data, a credential broker for classified document
//! retrieval, and entitlement-based visibility filtering.

pub mod broker;
pub mod cache;
pub mod crypto;
pub mod entitlement;
pub mod errors;
pub mod fetch;
pub mod locator;
pub mod pipeline;
pub mod pool;
pub mod session;
pub mod telemetry;
pub mod types;

pub use broker::{
    CredentialBroker, TemporaryStorageCredentials, TokenExchanger, MAX_SESSION_DURATION,
};
pub use cache::IdentityCache;
pub use crypto::{AesGcmEngine, DecryptionEngine, EngineFactory, SessionKeyFactory};
pub use entitlement::{is_visible, EntitlementSet, UNRESTRICTED};
pub use errors::{AccessError, DecryptError, DecryptResult, Result};
pub use fetch::{ClassifiedDocument, DocumentFetcher, ObjectStore, StoreError};
pub use locator::ObjectLocator;
pub use pipeline::RecordPipeline;
pub use pool::{WorkerHandle, WorkerPool, DEFAULT_POOL_SIZE};
pub use session::SessionInitializer;
pub use types::{
    EncryptedRecord, MergedRecord, SessionCredentials, WorkerConfig, VEHICLES_KIND,
};
