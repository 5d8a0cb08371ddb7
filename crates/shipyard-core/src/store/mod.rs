//! Document persistence.
//!
//! Records are stored as JSON values keyed by id, one keyspace per
//! [`Collection`]. Backends implement the untyped [`DocumentStore`]; callers
//! use the typed [`Store`] wrapper.
//!
//! Every record carries a `version`. Writes through [`Store::update`] must
//! present the version they read; the backend compares it with the stored
//! value inside the same transaction and rejects stale writes with
//! [`ShipyardError::VersionConflict`].

mod memory;
mod redb;

pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShipyardError};

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Organizations,
    Projects,
    Clusters,
    Applications,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Organizations,
        Collection::Projects,
        Collection::Clusters,
        Collection::Applications,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Organizations => "organizations",
            Collection::Projects => "projects",
            Collection::Clusters => "clusters",
            Collection::Applications => "applications",
        }
    }

    /// Singular label used in error messages.
    pub fn kind(self) -> &'static str {
        match self {
            Collection::Users => "user",
            Collection::Organizations => "organization",
            Collection::Projects => "project",
            Collection::Clusters => "cluster",
            Collection::Applications => "application",
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Untyped storage backend. Values are opaque JSON bytes except for the
/// top-level `version` field, which backends read to enforce optimistic
/// concurrency.
pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Vec<u8>>>;

    fn list(&self, collection: Collection) -> Result<Vec<Vec<u8>>>;

    /// Fails with `AlreadyExists` if `id` is taken.
    fn insert(&self, collection: Collection, id: &str, value: &[u8]) -> Result<()>;

    /// Replace the stored value only if its version equals `expected_version`.
    fn replace(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        value: &[u8],
    ) -> Result<()>;

    /// Returns whether a value was removed.
    fn remove(&self, collection: Collection, id: &str) -> Result<bool>;
}

#[derive(Deserialize)]
struct Versioned {
    #[serde(default)]
    version: u64,
}

/// Version recorded in a stored value. Unparsable values count as version 0.
pub(crate) fn stored_version(value: &[u8]) -> u64 {
    serde_json::from_slice::<Versioned>(value)
        .map(|v| v.version)
        .unwrap_or(0)
}

/// Shared compare step for backends: `Ok` when `current` matches.
pub(crate) fn check_version(
    collection: Collection,
    id: &str,
    current: Option<&[u8]>,
    expected: u64,
) -> Result<()> {
    let Some(current) = current else {
        return Err(ShipyardError::NotFound {
            kind: collection.kind(),
            id: id.to_string(),
        });
    };
    if stored_version(current) != expected {
        return Err(ShipyardError::VersionConflict {
            kind: collection.kind(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

/// A record type that lives in one collection.
pub trait Document: Serialize + DeserializeOwned + Send + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    /// Owning user, for per-owner counts.
    fn owner(&self) -> Option<&str>;

    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);
}

/// Typed facade over a shared backend. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn DocumentStore>,
}

impl Store {
    pub fn new(backend: impl DocumentStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    pub fn get<D: Document>(&self, id: &str) -> Result<Option<D>> {
        self.backend
            .get(D::COLLECTION, id)?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(ShipyardError::from))
            .transpose()
    }

    /// Like [`Store::get`] but a missing record is `NotFound`.
    pub fn require<D: Document>(&self, id: &str) -> Result<D> {
        self.get(id)?.ok_or_else(|| ShipyardError::NotFound {
            kind: D::COLLECTION.kind(),
            id: id.to_string(),
        })
    }

    pub fn list<D: Document>(&self) -> Result<Vec<D>> {
        self.backend
            .list(D::COLLECTION)?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(ShipyardError::from))
            .collect()
    }

    pub fn count_owned<D: Document>(&self, owner: &str) -> Result<usize> {
        Ok(self
            .list::<D>()?
            .iter()
            .filter(|d| d.owner() == Some(owner))
            .count())
    }

    /// Store a new record at version 1.
    pub fn insert<D: Document>(&self, doc: &mut D) -> Result<()> {
        doc.set_version(1);
        let bytes = serde_json::to_vec(&*doc)?;
        self.backend.insert(D::COLLECTION, doc.id(), &bytes)
    }

    /// Write `doc` over the stored record. `doc.version()` must be the version
    /// that was read; on success it is bumped to the new stored version.
    pub fn update<D: Document>(&self, doc: &mut D) -> Result<()> {
        let expected = doc.version();
        doc.set_version(expected + 1);
        let bytes = serde_json::to_vec(&*doc)?;
        let result = self
            .backend
            .replace(D::COLLECTION, doc.id(), expected, &bytes);
        if result.is_err() {
            doc.set_version(expected);
        }
        result
    }

    pub fn delete<D: Document>(&self, id: &str) -> Result<()> {
        if self.backend.remove(D::COLLECTION, id)? {
            Ok(())
        } else {
            Err(ShipyardError::NotFound {
                kind: D::COLLECTION.kind(),
                id: id.to_string(),
            })
        }
    }
}
