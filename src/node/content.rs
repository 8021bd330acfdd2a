//! In-memory content and name store served by the gateways.

use axum::body::Bytes;
use dashmap::DashMap;
use std::sync::Arc;

use crate::keys::Key;

/// Content blobs keyed by [`Key`] plus a table of published names.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    blocks: Arc<DashMap<Key, Bytes>>,
    names: Arc<DashMap<String, Key>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key`, returning whether the key was new.
    pub fn put(&self, key: Key, data: Bytes) -> bool {
        self.blocks.insert(key, data).is_none()
    }

    pub fn get(&self, key: &Key) -> Option<Bytes> {
        self.blocks.get(key).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, key: &Key) -> bool {
        self.blocks.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Point `name` at `key`.
    pub fn publish(&self, name: impl Into<String>, key: Key) {
        self.names.insert(name.into(), key);
    }

    pub fn resolve(&self, name: &str) -> Option<Key> {
        self.names.get(name).map(|entry| entry.value().clone())
    }
}
