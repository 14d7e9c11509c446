//! Decoy Vault - Configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};
use crate::gate::GateConfig;
use crate::mapping::{JsonFileBackend, MappingBackend, MemoryBackend};

/// Where the mapping table is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Json,
    #[cfg(feature = "sqlite")]
    Sqlite,
    Memory,
}

impl std::str::FromStr for BackendKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(BackendKind::Json),
            #[cfg(feature = "sqlite")]
            "sqlite" => Ok(BackendKind::Sqlite),
            "memory" => Ok(BackendKind::Memory),
            other => Err(VaultError::Config(format!("unknown mapping backend: {}", other))),
        }
    }
}

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Private data directory
    pub root: PathBuf,
    /// Where materialized copies go; defaults to `<root>/scratch`
    pub scratch_dir: Option<PathBuf>,
    /// Mapping persistence
    pub backend: BackendKind,
    /// Reveal gate
    pub gate: GateConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./vault"),
            scratch_dir: None,
            backend: BackendKind::Json,
            gate: GateConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Config rooted at `root`, everything else default
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Read a JSON config file
    pub fn load<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_slice(&data)
            .map_err(|e| VaultError::Config(format!("{}: {}", path.display(), e)))?;
        config.gate.validate()?;
        Ok(config)
    }

    /// Directory holding content files under their identifiers
    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| self.root.join("scratch"))
    }

    /// Location of the persisted mapping, if it lives on disk
    pub fn mapping_path(&self) -> Option<PathBuf> {
        match self.backend {
            BackendKind::Json => Some(self.root.join("mapping.json")),
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Some(self.root.join("mapping.db")),
            BackendKind::Memory => None,
        }
    }

    /// Build the configured mapping backend
    pub fn open_backend(&self) -> VaultResult<Box<dyn MappingBackend>> {
        match self.backend {
            BackendKind::Json => {
                Ok(Box::new(JsonFileBackend::new(self.root.join("mapping.json"))))
            }
            #[cfg(feature = "sqlite")]
            BackendKind::Sqlite => Ok(Box::new(crate::mapping::SqliteBackend::open(
                self.root.join("mapping.db"),
            )?)),
            BackendKind::Memory => Ok(Box::new(MemoryBackend::new())),
        }
    }
}
