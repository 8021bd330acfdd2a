//! Content keys and key sets.
//!
//! Keys are opaque base58 identifiers. A [`KeySet`] is a thread-safe set of
//! keys used as a gateway allow-list or deny-list; sets can be loaded from a
//! newline-delimited list served over HTTP.

use dashmap::DashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// The base58 alphabet (no `0`, `O`, `I` or `l`).
pub const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Errors raised for malformed keys or unloadable key sets.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    #[error("invalid key in set at line {line}: {value:?}")]
    InvalidEntry { line: usize, value: String },

    #[error("failed to fetch key set from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("key set request to {url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// A content key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Key {
    type Err = KeySetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_empty() && s.bytes().all(|b| BASE58_ALPHABET.contains(&b)) {
            Ok(Self(s.to_string()))
        } else {
            Err(KeySetError::InvalidKey(s.to_string()))
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cheaply cloneable, thread-safe set of keys.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Arc<DashSet<Key>>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: Key) {
        self.keys.insert(key);
    }

    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parse a newline-delimited list. Any malformed line rejects the whole
    /// list.
    pub fn parse_list(body: &str) -> Result<Self, KeySetError> {
        let set = Self::new();
        for (index, line) in body.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            let key = line.parse::<Key>().map_err(|_| KeySetError::InvalidEntry {
                line: index + 1,
                value: line.to_string(),
            })?;
            set.add(key);
        }
        Ok(set)
    }
}

impl FromIterator<Key> for KeySet {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        let set = Self::new();
        for key in iter {
            set.add(key);
        }
        set
    }
}

/// Fetch and parse a key set from `url`.
pub async fn load_keyset_from_url(client: &reqwest::Client, url: &str) -> Result<KeySet, KeySetError> {
    let fetch_err = |source| KeySetError::Fetch {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(fetch_err)?;
    let status = response.status();
    if !status.is_success() {
        return Err(KeySetError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = response.text().await.map_err(fetch_err)?;

    let set = KeySet::parse_list(&body)?;
    tracing::info!(url = %url, keys = set.len(), "Key set loaded");
    Ok(set)
}
