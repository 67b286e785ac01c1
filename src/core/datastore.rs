use std::{collections::HashMap, fmt};

use bytes::Bytes;
use parking_lot::RwLock;

/// Key/value storage backing the node's records.
pub trait Datastore: Send + Sync {
    fn get(&self, key: &str) -> Option<Bytes>;

    fn put(&self, key: &str, value: Bytes);

    /// Returns the removed value, if there was one.
    fn delete(&self, key: &str) -> Option<Bytes>;

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// A volatile, in-memory [`Datastore`]; the default backend.
#[derive(Default)]
pub struct MemoryDatastore {
    records: RwLock<HashMap<String, Bytes>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl fmt::Debug for MemoryDatastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatastore")
            .field("len", &self.len())
            .finish()
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &str) -> Option<Bytes> {
        // Cheap as the backing storage is shared amongst instances.
        self.records.read().get(key).cloned()
    }

    fn put(&self, key: &str, value: Bytes) {
        self.records.write().insert(key.to_owned(), value);
    }

    fn delete(&self, key: &str) -> Option<Bytes> {
        self.records.write().remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let ds = MemoryDatastore::new();
        assert!(ds.is_empty());

        ds.put("/pk/a", Bytes::from_static(b"key"));
        assert!(ds.has("/pk/a"));
        assert_eq!(ds.get("/pk/a"), Some(Bytes::from_static(b"key")));

        assert_eq!(ds.delete("/pk/a"), Some(Bytes::from_static(b"key")));
        assert!(!ds.has("/pk/a"));
        assert!(ds.delete("/pk/a").is_none());
    }

    #[test]
    fn put_overwrites() {
        let ds = MemoryDatastore::new();
        ds.put("k", Bytes::from_static(b"1"));
        ds.put("k", Bytes::from_static(b"2"));

        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get("k"), Some(Bytes::from_static(b"2")));
    }
}
