use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::RwLock;

/// Process-wide map from record id to decrypted static identity fields.
///
/// Live telemetry must never be inserted here; entries hold only the
/// slow-changing identity portion so repeated refreshes of the same record
/// skip decryption. There is no TTL and no size bound: `clear` (logout or an
/// explicit cache bust) is the only removal path.
#[derive(Debug, Default)]
pub struct IdentityCache {
    inner: RwLock<HashMap<String, Map<String, Value>>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached static fields for `id`, if any.
    pub fn get(&self, id: &str) -> Option<Map<String, Value>> {
        read(&self.inner).get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        read(&self.inner).contains_key(id)
    }

    /// Store the decrypted static fields for `id`.
    pub fn insert(&self, id: impl Into<String>, fields: Map<String, Value>) {
        write(&self.inner).insert(id.into(), fields);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        write(&self.inner).clear();
    }

    pub fn len(&self) -> usize {
        read(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Inner = RwLock<HashMap<String, Map<String, Value>>>;

fn read(lock: &Inner) -> std::sync::RwLockReadGuard<'_, HashMap<String, Map<String, Value>>> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write(lock: &Inner) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Map<String, Value>>> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
