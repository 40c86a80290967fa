use async_trait::async_trait;
use cop_access_core::broker::{CredentialBroker, TemporaryStorageCredentials, TokenExchanger};
use cop_access_core::fetch::{DocumentFetcher, ObjectStore, StoreError};
use cop_access_core::{AccessError, Result};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ROLE: &str = "arn:aws:iam::000000000000:role/cop-reader";

struct StaticExchanger {
    calls: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl TokenExchanger for StaticExchanger {
    async fn exchange(
        &self,
        _identity_token: &str,
        _role_arn: &str,
        _session_name: &str,
        _duration: Duration,
    ) -> Result<TemporaryStorageCredentials> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AccessError::CredentialExchange("sts unreachable".into()));
        }
        Ok(TemporaryStorageCredentials {
            key_id: "AKID".into(),
            secret: "shh".into(),
            session_token: Some("token".into()),
        })
    }
}

#[derive(Default)]
struct MapStore {
    objects: HashMap<String, Vec<u8>>,
}

impl MapStore {
    fn with_object(mut self, container: &str, key: &str, body: &[u8]) -> Self {
        self.objects
            .insert(format!("{container}/{key}"), body.to_vec());
        self
    }
}

#[async_trait]
impl ObjectStore for MapStore {
    async fn get_object(
        &self,
        _credentials: &TemporaryStorageCredentials,
        container: &str,
        key: &str,
    ) -> std::result::Result<Vec<u8>, StoreError> {
        self.objects
            .get(&format!("{container}/{key}"))
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

struct Harness {
    fetcher: DocumentFetcher,
    exchanges: Arc<AtomicUsize>,
}

fn harness(store: MapStore, fail_exchange: bool) -> Harness {
    let exchanges = Arc::new(AtomicUsize::new(0));
    let exchanger = Arc::new(StaticExchanger {
        calls: Arc::clone(&exchanges),
        fail: fail_exchange,
    });
    let broker = CredentialBroker::new(exchanger, ROLE);
    Harness {
        fetcher: DocumentFetcher::new(broker, Arc::new(store)),
        exchanges,
    }
}

#[tokio::test]
async fn invalid_locator_fails_before_any_exchange() {
    let harness = harness(MapStore::default(), false);
    let err = harness
        .fetcher
        .fetch("tok-1", "not-a-uri")
        .await
        .unwrap_err();

    assert!(matches!(err, AccessError::InvalidLocator { .. }));
    assert_eq!(harness.exchanges.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_object_is_entitlement_denial() {
    let harness = harness(MapStore::default(), false);
    let err = harness
        .fetcher
        .fetch("tok-1", "s3://bucket-a/manifests/m1.json")
        .await
        .unwrap_err();

    assert!(err.is_denied(), "expected EntitlementDenied, got {err:?}");
    assert_eq!(err.code(), "entitlement_denied");
    assert_eq!(harness.exchanges.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn present_object_is_decoded_and_parsed() {
    let body = json!({"classification": "SECRET", "missionId": "m-17"});
    let store = MapStore::default().with_object(
        "cop-demo",
        "manifests/m1.json",
        body.to_string().as_bytes(),
    );
    let harness = harness(store, false);

    let document = harness
        .fetcher
        .fetch("tok-1", "s3://cop-demo/manifests/m1.json")
        .await
        .unwrap();
    assert_eq!(document, body);
}

#[tokio::test]
async fn unparseable_document_is_malformed() {
    let store = MapStore::default().with_object("cop-demo", "manifests/m1.json", b"not json");
    let harness = harness(store, false);

    let err = harness
        .fetcher
        .fetch("tok-1", "s3://cop-demo/manifests/m1.json")
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::MalformedDocument(_)));
}

#[tokio::test]
async fn exchange_failure_propagates_unchanged() {
    let harness = harness(MapStore::default(), true);
    let err = harness
        .fetcher
        .fetch("tok-1", "s3://cop-demo/manifests/m1.json")
        .await
        .unwrap_err();

    assert_eq!(
        err,
        AccessError::CredentialExchange("sts unreachable".into())
    );
}

#[tokio::test]
async fn each_fetch_exchanges_credentials_again() {
    let store = MapStore::default().with_object("cop-demo", "manifests/m1.json", b"{}");
    let harness = harness(store, false);

    harness
        .fetcher
        .fetch("tok-1", "s3://cop-demo/manifests/m1.json")
        .await
        .unwrap();
    harness
        .fetcher
        .fetch("tok-1", "s3://cop-demo/manifests/m1.json")
        .await
        .unwrap();

    assert_eq!(harness.exchanges.load(Ordering::SeqCst), 2);
}
