use crate::errors::{AccessError, Result};
use std::fmt;
use std::str::FromStr;

/// Address of an object inside the classified object store, in the shape
/// `scheme://container/key`. Anything else is rejected before any network
/// call is made.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    scheme: String,
    container: String,
    key: String,
}

impl ObjectLocator {
    /// Parses a locator from a string.
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        let (scheme, rest) = raw.split_once("://").ok_or_else(|| invalid(raw))?;
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(invalid(raw));
        }

        let (container, key) = rest.split_once('/').ok_or_else(|| invalid(raw))?;
        if container.is_empty() || key.is_empty() {
            return Err(invalid(raw));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            container: container.to_string(),
            key: key.to_string(),
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Container (bucket) component.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Object key, including any path segments.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl FromStr for ObjectLocator {
    type Err = AccessError;

    fn from_str(input: &str) -> Result<Self> {
        Self::parse(input)
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.container, self.key)
    }
}

fn invalid(value: &str) -> AccessError {
    AccessError::InvalidLocator {
        value: value.to_string(),
    }
}
