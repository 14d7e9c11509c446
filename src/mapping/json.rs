//! JSON file backend - the default mapping persistence.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::{Mapping, MappingBackend, MappingDocument};
use crate::error::{VaultError, VaultResult};

/// Mapping persisted as a single JSON document
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_err(&self, action: &str, e: std::io::Error) -> VaultError {
        VaultError::PersistenceUnavailable(format!(
            "{} {}: {}",
            action,
            self.path.display(),
            e
        ))
    }
}

impl MappingBackend for JsonFileBackend {
    fn load(&self) -> VaultResult<Mapping> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Mapping::new()),
            Err(e) => return Err(self.persistence_err("read", e)),
        };

        let doc: MappingDocument = serde_json::from_slice(&data)?;
        doc.into_entries()
    }

    fn save(&self, mapping: &Mapping) -> VaultResult<()> {
        let doc = MappingDocument::new(mapping.clone());
        let data = serde_json::to_vec_pretty(&doc)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.persistence_err("create dir for", e))?;
        }

        // Write to temp file first, then rename over the old document
        let temp_path = self.path.with_extension("json.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| self.persistence_err("open", e))?;

        file.write_all(&data)
            .and_then(|_| file.sync_all())
            .map_err(|e| self.persistence_err("write", e))?;
        drop(file);

        fs::rename(&temp_path, &self.path).map_err(|e| self.persistence_err("commit", e))?;

        // Make the rename itself durable where the platform allows it
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}
