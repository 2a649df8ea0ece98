// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hierarchical name/value property bag.
//!
//! Keys are dotted paths (`dataport.buffer.length`). A bag is flat
//! internally; [`Properties::node`] projects the sub-tree below a prefix so
//! that subsystems read relative keys (`length`, `write.full_policy`).

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Value for `key`, or `default` when unset or empty.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => v.trim(),
            _ => default,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sub-tree below `prefix`, with the prefix and its dot stripped.
    pub fn node(&self, prefix: &str) -> Properties {
        let lead = format!("{}.", prefix);
        let entries = self
            .entries
            .range(lead.clone()..)
            .take_while(|(k, _)| k.starts_with(&lead))
            .map(|(k, v)| (k[lead.len()..].to_string(), v.clone()))
            .collect();
        Properties { entries }
    }

    /// Copy every entry of `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: &Properties) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    /// Parse `key` as `T`. Unset or empty values yield `Ok(None)`.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<T>().map(Some).map_err(|_| Error::InvalidProperty {
                key: key.to_string(),
                value: raw.to_string(),
            }),
        }
    }

    /// Boolean in the `YES`/`NO` convention (also `true`/`false`, `1`/`0`).
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" | "on" => Ok(true),
                "no" | "false" | "0" | "off" => Ok(false),
                _ => Err(Error::InvalidProperty {
                    key: key.to_string(),
                    value: raw.to_string(),
                }),
            },
        }
    }

    pub fn get_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.get_parsed::<f64>(key)? {
            Some(v) if !v.is_finite() => Err(Error::InvalidProperty {
                key: key.to_string(),
                value: v.to_string(),
            }),
            other => Ok(other),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>> {
        self.get_parsed::<usize>(key)
    }

    /// Seconds as a float. Negative values mean "not set".
    pub fn get_duration_secs(&self, key: &str) -> Result<Option<Duration>> {
        match self.get_f64(key)? {
            Some(secs) if secs >= 0.0 => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|_| Error::InvalidProperty {
                    key: key.to_string(),
                    value: secs.to_string(),
                }),
            _ => Ok(None),
        }
    }

    /// Lower-cased value, for enumerated policy names.
    pub fn get_lowercase(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_strips_prefix() {
        let props = Properties::new()
            .with("dataport.buffer.length", "16")
            .with("dataport.buffer.write.full_policy", "block")
            .with("dataport.bufferx", "ignored")
            .with("dataport.interface_type", "local");

        let buffer = props.node("dataport.buffer");
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.get("length"), Some("16"));
        assert_eq!(buffer.get("write.full_policy"), Some("block"));
    }

    #[test]
    fn test_get_or_ignores_blank() {
        let props = Properties::new().with("a", "  ");
        assert_eq!(props.get_or("a", "x"), "x");
        assert_eq!(props.get_or("missing", "y"), "y");
    }

    #[test]
    fn test_merge_overwrites() {
        let mut a = Properties::new().with("k", "1").with("only_a", "a");
        let b = Properties::new().with("k", "2");
        a.merge(&b);
        assert_eq!(a.get("k"), Some("2"));
        assert_eq!(a.get("only_a"), Some("a"));
    }

    #[test]
    fn test_typed_getters() {
        let props: Properties = [
            ("rate", "250.5"),
            ("sync", "NO"),
            ("len", "abc"),
            ("timeout", "-1.0"),
            ("wait", "0.25"),
        ]
        .into_iter()
        .collect();

        assert_eq!(props.get_f64("rate").unwrap(), Some(250.5));
        assert!(!props.get_bool("sync", true).unwrap());
        assert!(props.get_bool("absent", true).unwrap());
        assert!(props.get_usize("len").is_err());
        assert_eq!(props.get_duration_secs("timeout").unwrap(), None);
        assert_eq!(
            props.get_duration_secs("wait").unwrap(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_duration_out_of_range_is_invalid() {
        let props = Properties::new().with("timeout", "1e300");
        assert!(matches!(
            props.get_duration_secs("timeout"),
            Err(Error::InvalidProperty { .. })
        ));
    }
}
