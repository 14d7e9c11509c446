//! Decoy Vault - Import Sources
//!
//! Files arrive from pickers, drag-and-drop or "open in" handoffs. Some of
//! those are sandboxed: access must be acquired before reading and released
//! once the copy is complete.

use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Name used when a source has no usable file name
pub const UNNAMED: &str = "unnamed";

/// Externally supplied file to import
pub trait ImportSource {
    /// Readable location of the content
    fn path(&self) -> &Path;

    /// Name the user knows the file by
    fn original_name(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNNAMED.to_string())
    }

    /// Acquire access to a scoped resource; `false` means access was denied
    fn start_access(&self) -> bool {
        true
    }

    /// Release access acquired by [`ImportSource::start_access`]
    fn stop_access(&self) {}
}

/// Plain filesystem path, no access scoping
#[derive(Debug, Clone)]
pub struct PathSource {
    path: PathBuf,
}

impl PathSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImportSource for PathSource {
    fn path(&self) -> &Path {
        &self.path
    }
}

/// Holds source access for as long as it lives
pub struct AccessGuard<'a> {
    source: &'a dyn ImportSource,
}

impl<'a> AccessGuard<'a> {
    pub fn acquire(source: &'a dyn ImportSource) -> VaultResult<Self> {
        if !source.start_access() {
            return Err(VaultError::SourceUnreadable(format!(
                "access denied to {}",
                source.path().display()
            )));
        }
        Ok(Self { source })
    }
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        self.source.stop_access();
    }
}
