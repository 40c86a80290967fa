use cop_access_core::crypto::{AesGcmEngine, DecryptionEngine, EngineFactory};
use cop_access_core::{
    DecryptResult, EncryptedRecord, IdentityCache, RecordPipeline, SessionCredentials,
    SessionInitializer, WorkerConfig, WorkerPool,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct CountingEngine {
    inner: AesGcmEngine,
    decrypts: Arc<AtomicUsize>,
}

impl DecryptionEngine for CountingEngine {
    fn decrypt(&self, ciphertext: &[u8]) -> DecryptResult<Vec<u8>> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner.decrypt(ciphertext)
    }
}

struct CountingFactory {
    decrypts: Arc<AtomicUsize>,
}

impl EngineFactory for CountingFactory {
    fn build(
        &self,
        _config: &WorkerConfig,
        credentials: &SessionCredentials,
    ) -> DecryptResult<Arc<dyn DecryptionEngine>> {
        Ok(Arc::new(CountingEngine {
            inner: AesGcmEngine::from_session(credentials),
            decrypts: Arc::clone(&self.decrypts),
        }))
    }
}

struct Harness {
    pipeline: Arc<RecordPipeline>,
    cache: Arc<IdentityCache>,
    decrypts: Arc<AtomicUsize>,
    credentials: SessionCredentials,
}

impl Harness {
    fn decrypt_count(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    fn seal(&self, value: &Value) -> Vec<u8> {
        AesGcmEngine::from_session(&self.credentials)
            .seal(value.to_string().as_bytes())
            .unwrap()
    }
}

async fn harness(initialized: bool) -> Harness {
    let decrypts = Arc::new(AtomicUsize::new(0));
    let pool = Arc::new(WorkerPool::new(
        4,
        Arc::new(CountingFactory {
            decrypts: Arc::clone(&decrypts),
        }),
    ));
    let session = Arc::new(SessionInitializer::new(
        Arc::clone(&pool),
        WorkerConfig::default(),
    ));
    let cache = Arc::new(IdentityCache::new());
    let credentials = SessionCredentials::new("tok-1", "refresh-1");
    if initialized {
        assert!(session.initialize(&credentials).await.unwrap());
    }

    let pipeline = Arc::new(RecordPipeline::new(pool, session, Arc::clone(&cache)));
    Harness {
        pipeline,
        cache,
        decrypts,
        credentials,
    }
}

fn record(id: &str, ciphertext: Vec<u8>, live: Option<&str>, kind: &str) -> EncryptedRecord {
    EncryptedRecord {
        id: id.into(),
        ciphertext,
        live_metadata: live.map(str::to_string),
        source_kind: kind.into(),
        classification: None,
    }
}

#[tokio::test]
async fn empty_ciphertext_yields_live_fields_only() {
    let harness = harness(true).await;
    let merged = harness
        .pipeline
        .transform(record(
            "v1",
            Vec::new(),
            Some(r#"{"speed":"450 kts"}"#),
            "vehicles",
        ))
        .await;

    assert_eq!(Value::Object(merged.fields), json!({"speed": "450 kts"}));
    assert_eq!(harness.decrypt_count(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn live_fields_win_on_key_collision() {
    let harness = harness(true).await;
    let ciphertext = harness.seal(&json!({"a": 1, "b": 2}));
    let merged = harness
        .pipeline
        .transform(record("v1", ciphertext, Some(r#"{"b":3,"c":4}"#), "vehicles"))
        .await;

    assert_eq!(Value::Object(merged.fields), json!({"a": 1, "b": 3, "c": 4}));
}

#[tokio::test]
async fn uninitialized_pool_degrades_to_live_only() {
    let harness = harness(false).await;
    let ciphertext = harness.seal(&json!({"callsign": "EAGLE1"}));
    let merged = harness
        .pipeline
        .transform(record(
            "v1",
            ciphertext,
            Some(r#"{"speed":"450 kts"}"#),
            "vehicles",
        ))
        .await;

    assert_eq!(Value::Object(merged.fields), json!({"speed": "450 kts"}));
    assert_eq!(harness.decrypt_count(), 0);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn cached_identity_is_reused_without_redecrypting() {
    let harness = harness(true).await;
    let ciphertext = harness.seal(&json!({"callsign": "EAGLE1"}));

    let first = harness
        .pipeline
        .transform(record(
            "v1",
            ciphertext,
            Some(r#"{"speed":"450 km/h"}"#),
            "vehicles",
        ))
        .await;
    assert_eq!(
        Value::Object(first.fields),
        json!({"callsign": "EAGLE1", "speed": "450 km/h"})
    );
    assert_eq!(harness.decrypt_count(), 1);
    assert!(harness.cache.contains("v1"));

    // refresh cycle: different (even garbage) ciphertext, fresher telemetry
    let second = harness
        .pipeline
        .transform(record(
            "v1",
            vec![0u8; 64],
            Some(r#"{"speed":"460 km/h"}"#),
            "vehicles",
        ))
        .await;
    assert_eq!(
        Value::Object(second.fields),
        json!({"callsign": "EAGLE1", "speed": "460 km/h"})
    );
    assert_eq!(harness.decrypt_count(), 1);
}

#[tokio::test]
async fn only_vehicle_records_populate_the_cache() {
    let harness = harness(true).await;
    let ciphertext = harness.seal(&json!({"title": "briefing"}));
    let merged = harness
        .pipeline
        .transform(record("n1", ciphertext, None, "notes"))
        .await;

    assert_eq!(Value::Object(merged.fields), json!({"title": "briefing"}));
    assert_eq!(harness.decrypt_count(), 1);
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn decryption_failure_degrades_to_live_fields() {
    let harness = harness(true).await;
    let merged = harness
        .pipeline
        .transform(record(
            "v1",
            vec![0u8; 64],
            Some(r#"{"speed":"450 kts"}"#),
            "vehicles",
        ))
        .await;

    assert_eq!(Value::Object(merged.fields), json!({"speed": "450 kts"}));
    assert!(harness.cache.is_empty());
}

#[tokio::test]
async fn unparseable_live_metadata_is_treated_as_empty() {
    let harness = harness(true).await;
    let ciphertext = harness.seal(&json!({"callsign": "EAGLE1"}));
    let merged = harness
        .pipeline
        .transform(record("v1", ciphertext, Some("{broken"), "vehicles"))
        .await;

    assert_eq!(Value::Object(merged.fields), json!({"callsign": "EAGLE1"}));
}

#[tokio::test]
async fn concurrent_transforms_share_the_pool() {
    let harness = harness(true).await;

    let mut handles = Vec::new();
    for i in 0..16 {
        let pipeline = Arc::clone(&harness.pipeline);
        let rec = record(
            &format!("v{i}"),
            harness.seal(&json!({"callsign": format!("EAGLE{i}")})),
            Some(r#"{"speed":"400 kts"}"#),
            "vehicles",
        );
        handles.push(tokio::spawn(async move { pipeline.transform(rec).await }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let merged = handle.await.unwrap();
        assert_eq!(merged.fields["callsign"], format!("EAGLE{i}"));
        assert_eq!(merged.fields["speed"], "400 kts");
    }
    assert_eq!(harness.decrypt_count(), 16);
    assert_eq!(harness.cache.len(), 16);
}
