//! Key/value cache with tag invalidation.
//!
//! [`Cache`] is the narrow interface the response-cache middleware talks to;
//! production deployments back it with Redis, memcached, etc. [`MemoryCache`]
//! is an in-process implementation for tests and single-node services.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::BoxError;

/// A shared key/value store whose entries can be invalidated in bulk by tag.
///
/// Implementations must tolerate concurrent calls from many in-flight requests.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the value stored under `key`, or `None` on a miss.
    async fn get_value(&self, key: &str) -> Result<Option<String>, BoxError>;

    /// Stores `value` under `key`, labelled with `tags`. Replaces any previous
    /// value and its tags.
    async fn set_value(&self, key: &str, value: String, tags: &[String]) -> Result<(), BoxError>;

    async fn remove(&self, key: &str) -> Result<(), BoxError>;

    /// Removes every entry labelled with any of `tags`.
    async fn bust_tags(&self, tags: &[String]) -> Result<(), BoxError>;
}

/// In-process [`Cache`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    tagged: HashMap<String, HashSet<String>>,
}

#[derive(Debug)]
struct Entry {
    value: String,
    tags: Vec<String>,
}

impl Inner {
    fn remove(&mut self, key: &str) {
        let Some(entry) = self.entries.remove(key) else { return };
        for tag in entry.tags {
            if let Some(keys) = self.tagged.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tagged.remove(&tag);
                }
            }
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get_value(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.inner.lock().entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_value(&self, key: &str, value: String, tags: &[String]) -> Result<(), BoxError> {
        let mut inner = self.inner.lock();
        inner.remove(key);
        for tag in tags {
            inner.tagged.entry(tag.clone()).or_default().insert(key.to_owned());
        }
        inner.entries.insert(key.to_owned(), Entry { value, tags: tags.to_vec() });
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.inner.lock().remove(key);
        Ok(())
    }

    async fn bust_tags(&self, tags: &[String]) -> Result<(), BoxError> {
        let mut inner = self.inner.lock();
        for tag in tags {
            let Some(keys) = inner.tagged.remove(tag) else { continue };
            for key in keys {
                inner.remove(&key);
            }
        }
        Ok(())
    }
}
