//! In-memory backend, for embedders that persist elsewhere and for tests.

use parking_lot::Mutex;

use super::{Mapping, MappingBackend};
use crate::error::VaultResult;

#[derive(Default)]
pub struct MemoryBackend {
    mapping: Mutex<Mapping>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MappingBackend for MemoryBackend {
    fn load(&self) -> VaultResult<Mapping> {
        Ok(self.mapping.lock().clone())
    }

    fn save(&self, mapping: &Mapping) -> VaultResult<()> {
        *self.mapping.lock() = mapping.clone();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
