use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Every, KEY_EVERY, KEY_MAX_MEM, KEY_MAX_RUNTIME, TriggerParseError};

/// Trigger configuration extracted from a task file.
///
/// Opaque key/value mapping; only a handful of keys are interpreted here, everything else is carried along untouched.
/// Serialized as a transparent JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig(pub BTreeMap<String, String>);

impl TaskConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Check if the configuration is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return len.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a key–value pair, replacing any previous value.
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style [`TaskConfig::insert`].
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.insert(key, value);
        self
    }

    /// Raw `every` string, if present.
    pub fn every_raw(&self) -> Option<&str> {
        self.get(KEY_EVERY)
    }

    /// Parsed `every` trigger.
    pub fn every(&self) -> Result<Every, TriggerParseError> {
        let raw = self.every_raw().ok_or(TriggerParseError::Missing)?;
        raw.parse()
    }

    /// Requested memory ceiling in megabytes.
    ///
    /// Returns `None` when the key is absent or not a positive integer.
    pub fn max_mem_mb(&self) -> Option<u64> {
        parse_positive(self.get(KEY_MAX_MEM)?)
    }

    /// Requested runtime ceiling in seconds.
    ///
    /// Returns `None` when the key is absent or not a positive integer.
    pub fn max_runtime_secs(&self) -> Option<u64> {
        parse_positive(self.get(KEY_MAX_RUNTIME)?)
    }
}

impl<K, V> FromIterator<(K, V)> for TaskConfig
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn parse_positive(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_parse_positive_integers_only() {
        let cfg = TaskConfig::new()
            .with(KEY_MAX_MEM, "512")
            .with(KEY_MAX_RUNTIME, " 90 ");
        assert_eq!(cfg.max_mem_mb(), Some(512));
        assert_eq!(cfg.max_runtime_secs(), Some(90));

        let cfg = TaskConfig::new()
            .with(KEY_MAX_MEM, "0")
            .with(KEY_MAX_RUNTIME, "ten");
        assert_eq!(cfg.max_mem_mb(), None);
        assert_eq!(cfg.max_runtime_secs(), None);
    }

    #[test]
    fn missing_every_is_reported() {
        let cfg = TaskConfig::new().with(KEY_MAX_MEM, "128");
        assert_eq!(cfg.every(), Err(TriggerParseError::Missing));
    }

    #[test]
    fn unknown_keys_are_kept() {
        let cfg: TaskConfig = [("every", "1 min"), ("owner", "ops")].into_iter().collect();
        assert_eq!(cfg.len(), 2);
        assert_eq!(cfg.get("owner"), Some("ops"));
    }

    #[test]
    fn serde_transparent_object() {
        let cfg = TaskConfig::new().with("every", "2 hours");
        let json = serde_json::to_string(&cfg).unwrap();
        assert_eq!(json, r#"{"every":"2 hours"}"#);

        let back: TaskConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
