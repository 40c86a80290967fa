use crate::types::MergedRecord;
use serde_json::Value;
use std::collections::HashSet;

/// Marker label granting visibility into every record.
pub const UNRESTRICTED: &str = "*";

/// Classification labels the caller is entitled to view. An empty set, or
/// one containing the unrestricted marker, sees everything.
#[derive(Debug, Clone, Default)]
pub struct EntitlementSet {
    labels: HashSet<String>,
}

impl EntitlementSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|label| normalize(&label.into()))
                .collect(),
        }
    }

    /// Set that can see every record.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn is_unrestricted(&self) -> bool {
        self.labels.is_empty() || self.labels.contains(UNRESTRICTED)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&normalize(label))
    }
}

/// Decide whether a record may be surfaced to a caller holding
/// `entitlements`.
///
/// Records without a classification attribute are visible (fail-open for
/// missing metadata). When the attribute is a list, its first element
/// decides.
pub fn is_visible(record: &MergedRecord, entitlements: &EntitlementSet) -> bool {
    if entitlements.is_unrestricted() {
        return true;
    }
    let Some(classification) = record.classification.as_ref() else {
        return true;
    };
    match classification_label(classification) {
        Some(label) => entitlements.contains(label),
        None => true,
    }
}

fn classification_label(value: &Value) -> Option<&str> {
    match value {
        Value::String(label) => Some(label),
        Value::Array(items) => items.first().and_then(Value::as_str),
        _ => None,
    }
}

/// Classification attributes arrive either as bare labels or as attribute
/// URIs (`…/attr/classification/value/secret`); compare on the trailing
/// segment, case-insensitively.
fn normalize(label: &str) -> String {
    label
        .rsplit('/')
        .next()
        .unwrap_or(label)
        .trim()
        .to_ascii_lowercase()
}
