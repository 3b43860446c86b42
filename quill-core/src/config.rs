//! # Configuration
//!
//! A minimal string key/value store in the style of `app.set()` /
//! `app.get()`. Applications decide where values come from (environment,
//! files, defaults) and hand components a read-only [`QuillConfigSnapshot`].
//!
//! ```rust
//! use quill_core::QuillConfig;
//!
//! let mut config = QuillConfig::new();
//! config.set("http.port", "3001");
//! config.set("store.timeout", "5s");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_usize("http.port"), Some(3001));
//! assert_eq!(snapshot.get_duration("store.timeout"), Some(std::time::Duration::from_secs(5)));
//! ```
//!
//! Environment variables with a prefix can be folded in with
//! [`QuillConfig::merge_env_prefixed`]: `QUILL__STORE__TIMEOUT=2s` becomes
//! `store.timeout`.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct QuillConfig {
    values: HashMap<String, String>,
}

impl QuillConfig {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set only when the key has no value yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Fold `PREFIX__A__B=value` variables in as `a.b = value`.
    pub fn merge_env_prefixed<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if !normalized.is_empty() {
                    self.values.insert(normalized, value);
                }
            }
        }
    }

    pub fn snapshot(&self) -> QuillConfigSnapshot {
        QuillConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuillConfigSnapshot {
    map: HashMap<String, String>,
}

impl QuillConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
    }

    /// Human-readable durations such as `5s`, `250ms` or `7days`.
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        self.get(key)
            .and_then(|v| humantime_serde::re::humantime::parse_duration(v.trim()).ok())
    }

    /// Comma-separated list, blank entries dropped.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
