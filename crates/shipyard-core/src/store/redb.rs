//! On-disk backend using redb.
//!
//! One table per [`Collection`], keyed by record id, holding JSON bytes.
//! Version checks and writes happen inside a single write transaction, so a
//! concurrent writer either sees the committed version or waits for it.

use std::path::Path;

use ::redb::{Database, ReadableTable, TableDefinition};

use super::{check_version, Collection, DocumentStore};
use crate::error::{Result, ShipyardError};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

fn table(collection: Collection) -> Table {
    TableDefinition::new(collection.name())
}

fn store_err(e: impl std::fmt::Display) -> ShipyardError {
    ShipyardError::Store(e.to_string())
}

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database at `path`, creating every table.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            crate::io::ensure_dir(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        for collection in Collection::ALL {
            wt.open_table(table(collection)).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }
}

impl DocumentStore for RedbStore {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Vec<u8>>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let t = rt.open_table(table(collection)).map_err(store_err)?;
        let value = t.get(id).map_err(store_err)?.map(|g| g.value().to_vec());
        Ok(value)
    }

    fn list(&self, collection: Collection) -> Result<Vec<Vec<u8>>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let t = rt.open_table(table(collection)).map_err(store_err)?;
        let mut out = Vec::new();
        for entry in t.iter().map_err(store_err)? {
            let (_, v) = entry.map_err(store_err)?;
            out.push(v.value().to_vec());
        }
        Ok(out)
    }

    fn insert(&self, collection: Collection, id: &str, value: &[u8]) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut t = wt.open_table(table(collection)).map_err(store_err)?;
            let exists = t.get(id).map_err(store_err)?.is_some();
            if exists {
                return Err(ShipyardError::AlreadyExists {
                    kind: collection.kind(),
                    id: id.to_string(),
                });
            }
            t.insert(id, value).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        value: &[u8],
    ) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut t = wt.open_table(table(collection)).map_err(store_err)?;
            let current = t.get(id).map_err(store_err)?.map(|g| g.value().to_vec());
            check_version(collection, id, current.as_deref(), expected_version)?;
            t.insert(id, value).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    fn remove(&self, collection: Collection, id: &str) -> Result<bool> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let removed = {
            let mut t = wt.open_table(table(collection)).map_err(store_err)?;
            let old = t.remove(id).map_err(store_err)?;
            old.is_some()
        };
        wt.commit().map_err(store_err)?;
        Ok(removed)
    }
}
