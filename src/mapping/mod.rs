//! Decoy Vault - Mapping Store
//!
//! Durable table of opaque identifier → original display name. Every
//! mutation is a load-modify-save sequence run under one mutex, so two
//! updates can never interleave and revert each other.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::ident::OpaqueId;

mod json;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

#[cfg(test)]
pub(crate) use memory::testing;

/// Current on-disk layout version
pub const MAPPING_FORMAT_VERSION: u32 = 1;

/// Identifier → display name
pub type Mapping = BTreeMap<OpaqueId, String>;

/// Versioned envelope: `{"version":1,"entries":{"<id>":"<name>"}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDocument {
    pub version: u32,
    #[serde(deserialize_with = "deserialize_entries")]
    pub entries: Mapping,
}

/// Keep rows whose identifier is a valid file name, drop the rest
pub(crate) fn collect_entries<I>(rows: I) -> Mapping
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut mapping = Mapping::new();
    for (id, name) in rows {
        match OpaqueId::parse(&id) {
            Ok(id) => {
                mapping.insert(id, name);
            }
            Err(_) => log::warn!("Skipping malformed mapping row {:?}", id),
        }
    }
    mapping
}

fn deserialize_entries<'de, D>(deserializer: D) -> Result<Mapping, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, String>::deserialize(deserializer)?;
    Ok(collect_entries(raw))
}

impl MappingDocument {
    pub fn new(entries: Mapping) -> Self {
        Self {
            version: MAPPING_FORMAT_VERSION,
            entries,
        }
    }

    /// Accept only layouts this build knows how to read
    pub fn into_entries(self) -> VaultResult<Mapping> {
        if self.version == 0 || self.version > MAPPING_FORMAT_VERSION {
            return Err(VaultError::PersistenceUnavailable(format!(
                "unsupported mapping version {} (expected {})",
                self.version, MAPPING_FORMAT_VERSION
            )));
        }
        Ok(self.entries)
    }
}

/// Persistence backend for the mapping table
pub trait MappingBackend: Send {
    /// Persisted mapping, empty if nothing was ever saved
    fn load(&self) -> VaultResult<Mapping>;

    /// Replace the whole persisted mapping atomically
    fn save(&self, mapping: &Mapping) -> VaultResult<()>;

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Mapping Store - serialized access to a backend
pub struct MappingStore {
    backend: Mutex<Box<dyn MappingBackend>>,
}

impl MappingStore {
    pub fn new(backend: Box<dyn MappingBackend>) -> Self {
        log::debug!("Mapping store at {}", backend.describe());
        Self {
            backend: Mutex::new(backend),
        }
    }

    pub fn load(&self) -> VaultResult<Mapping> {
        self.backend.lock().load()
    }

    pub fn save(&self, mapping: &Mapping) -> VaultResult<()> {
        self.backend.lock().save(mapping)
    }

    /// Display name for a single identifier
    pub fn get(&self, id: &OpaqueId) -> VaultResult<Option<String>> {
        Ok(self.load()?.remove(id))
    }

    pub fn put(&self, id: &OpaqueId, name: &str) -> VaultResult<()> {
        self.update(|mapping| {
            mapping.insert(id.clone(), name.to_string());
        })
    }

    /// Remove a record, returning the name it held
    pub fn remove(&self, id: &OpaqueId) -> VaultResult<Option<String>> {
        self.update(|mapping| mapping.remove(id))
    }

    /// Set a new display name. An empty name leaves the record untouched.
    pub fn rename(&self, id: &OpaqueId, new_name: &str) -> VaultResult<()> {
        if new_name.trim().is_empty() {
            return Ok(());
        }
        self.update(|mapping| {
            mapping.insert(id.clone(), new_name.to_string());
        })
    }

    /// Drop every record whose identifier fails `keep`; returns how many went
    pub fn prune<F>(&self, keep: F) -> VaultResult<usize>
    where
        F: Fn(&OpaqueId) -> bool,
    {
        let backend = self.backend.lock();
        let mut mapping = backend.load()?;
        let before = mapping.len();
        mapping.retain(|id, _| keep(id));
        let removed = before - mapping.len();

        if removed > 0 {
            backend.save(&mapping)?;
        }
        Ok(removed)
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut Mapping) -> R) -> VaultResult<R> {
        let backend = self.backend.lock();
        let mut mapping = backend.load()?;
        let result = mutate(&mut mapping);
        backend.save(&mapping)?;
        Ok(result)
    }
}
