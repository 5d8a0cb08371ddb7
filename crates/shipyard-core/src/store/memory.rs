use std::collections::HashMap;
use std::sync::Mutex;

use super::{check_version, Collection, DocumentStore};
use crate::error::{Result, ShipyardError};

/// Process-local backend for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(Collection, String), Vec<u8>>>,
}

impl MemoryStore {
    fn docs(&self) -> std::sync::MutexGuard<'_, HashMap<(Collection, String), Vec<u8>>> {
        self.docs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.docs().get(&(collection, id.to_string())).cloned())
    }

    fn list(&self, collection: Collection) -> Result<Vec<Vec<u8>>> {
        let docs = self.docs();
        let mut entries: Vec<_> = docs
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .collect();
        entries.sort_by(|a, b| a.0 .1.cmp(&b.0 .1));
        Ok(entries.into_iter().map(|(_, v)| v.clone()).collect())
    }

    fn insert(&self, collection: Collection, id: &str, value: &[u8]) -> Result<()> {
        let mut docs = self.docs();
        let key = (collection, id.to_string());
        if docs.contains_key(&key) {
            return Err(ShipyardError::AlreadyExists {
                kind: collection.kind(),
                id: id.to_string(),
            });
        }
        docs.insert(key, value.to_vec());
        Ok(())
    }

    fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        value: &[u8],
    ) -> Result<()> {
        let mut docs = self.docs();
        let key = (collection, id.to_string());
        check_version(collection, id, docs.get(&key).map(Vec::as_slice), expected_version)?;
        docs.insert(key, value.to_vec());
        Ok(())
    }

    fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        Ok(self.docs().remove(&(collection, id.to_string())).is_some())
    }
}
