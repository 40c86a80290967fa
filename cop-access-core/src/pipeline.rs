use crate::cache::IdentityCache;
use crate::pool::WorkerPool;
use crate::session::SessionInitializer;
use crate::types::{merge_fields, parse_fields, EncryptedRecord, MergedRecord, VEHICLES_KIND};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-record orchestration: parse live metadata, consult the identity
/// cache, dispatch ciphertext to a worker when needed, merge, and update the
/// cache.
pub struct RecordPipeline {
    pool: Arc<WorkerPool>,
    session: Arc<SessionInitializer>,
    cache: Arc<IdentityCache>,
}

impl RecordPipeline {
    pub fn new(
        pool: Arc<WorkerPool>,
        session: Arc<SessionInitializer>,
        cache: Arc<IdentityCache>,
    ) -> Self {
        Self {
            pool,
            session,
            cache,
        }
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Convert a raw record into its merged view.
    ///
    /// Never fails: live-metadata parse errors, missing decryption, and
    /// decryption failures all degrade to whatever live fields are present.
    /// Live fields win over static fields on key collision.
    pub async fn transform(&self, record: EncryptedRecord) -> MergedRecord {
        let EncryptedRecord {
            id,
            ciphertext,
            live_metadata,
            source_kind,
            classification,
        } = record;
        let live = parse_fields(live_metadata.as_deref());

        if let Some(cached) = self.cache.get(&id) {
            debug!(%id, "identity cache hit");
            return MergedRecord {
                fields: merge_fields(&cached, &live),
                id,
                source_kind,
                classification,
            };
        }

        if !self.session.is_ready() || ciphertext.is_empty() {
            return MergedRecord {
                id,
                source_kind,
                classification,
                fields: live,
            };
        }

        let unit = self.pool.acquire();
        let static_fields = match unit.decrypt(ciphertext).await {
            Ok(plaintext) => {
                let fields = parse_object(&plaintext);
                if !fields.is_empty() && source_kind == VEHICLES_KIND {
                    self.cache.insert(id.clone(), fields.clone());
                }
                fields
            }
            Err(err) => {
                warn!(%id, error = %err, "decryption failed; serving live fields only");
                Map::new()
            }
        };

        MergedRecord {
            fields: merge_fields(&static_fields, &live),
            id,
            source_kind,
            classification,
        }
    }
}

/// Lenient parse of decrypted plaintext; non-object payloads yield no static
/// fields.
fn parse_object(plaintext: &[u8]) -> Map<String, Value> {
    match serde_json::from_slice::<Value>(plaintext) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
