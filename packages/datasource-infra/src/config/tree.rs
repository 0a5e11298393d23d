use std::collections::BTreeMap;
use std::env;

use crate::error::DbInfraError;

/// Generic key/value configuration tree with dotted keys (`db.datasource.user`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    entries: BTreeMap<String, String>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse `key=value` properties text. Blank lines and lines starting with
    /// `#` or `!` are skipped; keys and values are trimmed.
    pub fn parse_properties(text: &str) -> Result<Self, DbInfraError> {
        let mut tree = Self::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(DbInfraError::config(format!(
                    "line {}: expected 'key=value', got '{}'",
                    idx + 1,
                    line
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(DbInfraError::config(format!("line {}: empty key", idx + 1)));
            }
            tree.put(key, value.trim());
        }

        Ok(tree)
    }

    /// Overlay process environment variables starting with `prefix`.
    ///
    /// The remainder of the variable name is the key, with `__` standing for
    /// `.`: `DATASOURCE__db__datasource__user` sets `db.datasource.user`.
    pub fn overlay_env(&mut self, prefix: &str) {
        for (name, value) in env::vars() {
            if let Some(rest) = name.strip_prefix(prefix) {
                if rest.is_empty() {
                    continue;
                }
                let key = rest.replace("__", ".");
                self.put(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
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

    /// Copy of every entry under `root`, with keys made relative to it.
    pub fn subtree(&self, root: &str) -> ConfigTree {
        let prefix = format!("{root}.");
        ConfigTree {
            entries: self
                .entries
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(prefix.as_str())
                        .filter(|rest| !rest.is_empty())
                        .map(|rest| (rest.to_string(), v.clone()))
                })
                .collect(),
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> Result<u32, DbInfraError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                DbInfraError::config(format!("invalid value '{raw}' for '{key}': {e}"))
            }),
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64, DbInfraError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                DbInfraError::config(format!("invalid value '{raw}' for '{key}': {e}"))
            }),
        }
    }
}

impl<'a> IntoIterator for &'a ConfigTree {
    type Item = (&'a String, &'a String);
    type IntoIter = std::collections::btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
