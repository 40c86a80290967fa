use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Source kind whose decrypted fields are identity data worth caching.
pub const VEHICLES_KIND: &str = "vehicles";

/// Opaque encrypted record as supplied by the upstream query surface.
///
/// Immutable once received; a refresh cycle supersedes it with a newer
/// record sharing the same `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub id: String,
    /// Encrypted payload; empty when the record carries no static identity.
    #[serde(with = "base64_bytes", default)]
    pub ciphertext: Vec<u8>,
    /// JSON-encoded plaintext fragment; may be absent or the literal "null".
    #[serde(default)]
    pub live_metadata: Option<String>,
    pub source_kind: String,
    /// Plaintext classification attribute(s) carried alongside the record,
    /// either a label string or a list of attribute URIs.
    #[serde(default)]
    pub classification: Option<Value>,
}

/// Union of decrypted static identity fields and plaintext live telemetry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    pub id: String,
    pub source_kind: String,
    pub classification: Option<Value>,
    pub fields: Map<String, Value>,
}

/// Session material broadcast to the worker pool exactly once.
#[derive(Clone, Default, Deserialize)]
pub struct SessionCredentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl SessionCredentials {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }

    /// True when the credentials carry neither an access nor a refresh token.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_empty() && self.refresh_token.is_empty()
    }
}

impl fmt::Debug for SessionCredentials {
    // token material stays out of logs
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Static configuration forwarded to every worker unit at initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub platform_endpoint: String,
    pub kas_url: String,
}

/// Merge static identity fields with live telemetry; live wins on collision.
pub fn merge_fields(static_fields: &Map<String, Value>, live: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = static_fields.clone();
    for (key, value) in live {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Lenient parse of a JSON object fragment. Absence, `null`, non-object
/// values, and parse failures all yield an empty map.
pub fn parse_fields(raw: Option<&str>) -> Map<String, Value> {
    let Some(raw) = raw else {
        return Map::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(Vec::new()),
            Some(raw) => STANDARD
                .decode(raw.as_bytes())
                .map_err(serde::de::Error::custom),
        }
    }
}
