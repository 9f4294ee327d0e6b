//! Directive flag sets.
//!
//! Flags are the `key=value` tails of `server` and `*_cache_path`
//! directives. They come from three places (cache defaults in the build
//! settings, per-entity flags in the document, selector rules on default
//! upstream servers) and every combination goes through [`Flags::merged`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Ordered map of directive flags.
///
/// An empty value renders the key alone (`backup`), anything else renders
/// as `key=value`. Keys are kept sorted so rendered output is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Flags(BTreeMap<String, String>);

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge with override semantics.
    ///
    /// Starts from `self`, then every entry of `overrides` replaces the
    /// value stored under the same key. Keys present only in `self` are
    /// preserved. This is the only way flag sets are ever combined.
    pub fn merged(&self, overrides: &Flags) -> Flags {
        let mut out = self.0.clone();
        for (key, value) in &overrides.0 {
            out.insert(key.clone(), value.clone());
        }
        Flags(out)
    }

    /// Rewrite every value through `f`, stopping at the first error.
    pub fn try_map_values<E, F>(&self, mut f: F) -> Result<Flags, E>
    where
        F: FnMut(&str, &str) -> Result<String, E>,
    {
        let mut out = BTreeMap::new();
        for (key, value) in &self.0 {
            out.insert(key.clone(), f(key, value)?);
        }
        Ok(Flags(out))
    }

    /// Render as a space separated directive tail.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            if value.is_empty() {
                write!(f, "{}", key)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Flags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Flags(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// YAML authors write `max_fails: 3` and `backup: ~` as often as quoted
// strings, so any scalar is accepted and kept as its textual form.
impl<'de> Deserialize<'de> for Flags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
        let mut out = BTreeMap::new();
        for (key, value) in raw.unwrap_or_default() {
            let text = match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s,
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                other => {
                    return Err(de::Error::custom(format!(
                        "flag `{}` must be a scalar, got {}",
                        key, other
                    )))
                }
            };
            out.insert(key, text);
        }
        Ok(Flags(out))
    }
}
