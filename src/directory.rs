//! Decoy Vault - Vault Directory
//!
//! Content files named by opaque identifier under one private root, plus a
//! scratch area where entries are materialized under their display names
//! for preview and sharing.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};
use crate::ident::OpaqueId;

/// Suffix of imports still being copied
const PARTIAL_SUFFIX: &str = ".partial";

const COPY_CHUNK: usize = 64 * 1024;

/// A materialized copy living in the scratch area
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryHandle {
    path: PathBuf,
    name: String,
}

impl TemporaryHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name the copy was materialized under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the scratch copy once preview/share is done
    pub fn discard(self) -> VaultResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VaultError::DestinationWriteFailed(e.to_string())),
        }
    }
}

/// On-disk storage of entry bytes keyed by identifier
pub trait VaultDirectory: Send + Sync {
    /// Identifiers currently on disk, in no particular order
    fn list(&self) -> VaultResult<Vec<OpaqueId>>;

    /// Copy `source` into the vault under `id`; returns bytes stored
    fn write(&self, id: &OpaqueId, source: &Path) -> VaultResult<u64>;

    /// Copy the content of `id` into the scratch area as `desired_name`
    fn materialize(&self, id: &OpaqueId, desired_name: &str) -> VaultResult<TemporaryHandle>;

    fn delete(&self, id: &OpaqueId) -> VaultResult<()>;

    fn size(&self, id: &OpaqueId) -> VaultResult<u64>;

    fn contains(&self, id: &OpaqueId) -> bool;

    /// Remove every materialized copy; returns how many went
    fn clear_scratch(&self) -> VaultResult<usize>;
}

/// Vault directory on the local filesystem
pub struct FsVaultDirectory {
    root: PathBuf,
    scratch: PathBuf,
}

impl FsVaultDirectory {
    /// Open the vault at `root`, creating it if needed
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(root: P, scratch: Q) -> VaultResult<Self> {
        let root = root.as_ref().to_path_buf();
        let scratch = scratch.as_ref().to_path_buf();

        fs::create_dir_all(&root).map_err(|e| write_err(&root, e))?;
        fs::create_dir_all(&scratch).map_err(|e| write_err(&scratch, e))?;

        let dir = Self { root, scratch };
        let swept = dir.sweep_partials()?;
        if swept > 0 {
            log::info!("Removed {} abandoned import(s)", swept);
        }

        Ok(dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    fn entry_path(&self, id: &OpaqueId) -> PathBuf {
        self.root.join(id.as_str())
    }

    fn partial_path(&self, id: &OpaqueId) -> PathBuf {
        self.root.join(format!(".{}{}", id, PARTIAL_SUFFIX))
    }

    /// Drop staging files left behind by imports that never finished
    fn sweep_partials(&self) -> VaultResult<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.root).map_err(|e| list_err(&self.root, e))? {
            let entry = entry.map_err(|e| list_err(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX) {
                fs::remove_file(entry.path()).map_err(|e| write_err(&entry.path(), e))?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Chunked copy that tells a bad source apart from a bad destination
    fn copy_into(source: &mut File, dest: &mut File, dest_path: &Path) -> VaultResult<u64> {
        let mut buf = vec![0u8; COPY_CHUNK];
        let mut total = 0u64;

        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(VaultError::SourceUnreadable(e.to_string())),
            };
            dest.write_all(&buf[..n]).map_err(|e| write_err(dest_path, e))?;
            total += n as u64;
        }

        dest.sync_all().map_err(|e| write_err(dest_path, e))?;
        Ok(total)
    }
}

impl VaultDirectory for FsVaultDirectory {
    fn list(&self) -> VaultResult<Vec<OpaqueId>> {
        let mut ids = Vec::new();

        for entry in fs::read_dir(&self.root).map_err(|e| list_err(&self.root, e))? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Skipping unreadable vault entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }

            // Staging files and anything hidden are never entries
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Ok(id) = OpaqueId::parse(&name) {
                ids.push(id);
            }
        }

        Ok(ids)
    }

    fn write(&self, id: &OpaqueId, source: &Path) -> VaultResult<u64> {
        let dest = self.entry_path(id);
        if dest.exists() {
            return Err(VaultError::DestinationWriteFailed(format!(
                "identifier {} already in use",
                id
            )));
        }

        let mut src = File::open(source)
            .map_err(|e| VaultError::SourceUnreadable(format!("{}: {}", source.display(), e)))?;
        if src.metadata().map(|m| m.is_dir()).unwrap_or(false) {
            return Err(VaultError::SourceUnreadable(format!(
                "{} is a directory",
                source.display()
            )));
        }

        let partial = self.partial_path(id);
        let mut staged = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&partial)
            .map_err(|e| write_err(&partial, e))?;

        let copied = Self::copy_into(&mut src, &mut staged, &partial);
        drop(staged);

        let copied = copied.and_then(|n| {
            fs::rename(&partial, &dest).map_err(|e| write_err(&dest, e))?;
            Ok(n)
        });

        if copied.is_err() {
            let _ = fs::remove_file(&partial);
        }
        copied
    }

    fn materialize(&self, id: &OpaqueId, desired_name: &str) -> VaultResult<TemporaryHandle> {
        let source = self.entry_path(id);
        if !source.is_file() {
            return Err(VaultError::NotFound(id.to_string()));
        }

        let name = scratch_name(desired_name, id);
        let target = self.scratch.join(&name);

        // Replace a stale copy from an earlier preview
        match fs::remove_file(&target) {
            Ok(()) => log::debug!("Refreshed scratch copy for {}", id),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(write_err(&target, e)),
        }

        fs::copy(&source, &target).map_err(|e| write_err(&target, e))?;

        Ok(TemporaryHandle { path: target, name })
    }

    fn delete(&self, id: &OpaqueId) -> VaultResult<()> {
        match fs::remove_file(self.entry_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(VaultError::NotFound(id.to_string())),
            Err(e) => Err(write_err(&self.entry_path(id), e)),
        }
    }

    fn size(&self, id: &OpaqueId) -> VaultResult<u64> {
        fs::metadata(self.entry_path(id))
            .map(|m| m.len())
            .map_err(|_| VaultError::NotFound(id.to_string()))
    }

    fn contains(&self, id: &OpaqueId) -> bool {
        self.entry_path(id).is_file()
    }

    fn clear_scratch(&self) -> VaultResult<usize> {
        let mut count = 0;
        let entries = match fs::read_dir(&self.scratch) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(list_err(&self.scratch, e)),
        };

        for entry in entries.flatten() {
            if entry.path().is_file() {
                fs::remove_file(entry.path()).map_err(|e| write_err(&entry.path(), e))?;
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Reduce a display name to one safe file name component
fn scratch_name(desired: &str, id: &OpaqueId) -> String {
    let last = desired
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .replace('\0', "");
    let last = last.trim();

    if last.is_empty() || last == "." || last == ".." {
        id.to_string()
    } else {
        last.to_string()
    }
}

fn write_err(path: &Path, e: std::io::Error) -> VaultError {
    VaultError::DestinationWriteFailed(format!("{}: {}", path.display(), e))
}

fn list_err(path: &Path, e: std::io::Error) -> VaultError {
    VaultError::PersistenceUnavailable(format!("{}: {}", path.display(), e))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::{IdentifierSource, UuidGenerator};
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, FsVaultDirectory) {
        let dir = tempdir().unwrap();
        let vault =
            FsVaultDirectory::open(dir.path().join("vault"), dir.path().join("scratch")).unwrap();
        (dir, vault)
    }

    #[test]
    fn test_write_list_delete() {
        let (dir, vault) = setup();
        let source = dir.path().join("vacation.jpg");
        fs::write(&source, b"jpeg bytes").unwrap();

        let id = UuidGenerator.new_identifier();
        assert_eq!(vault.write(&id, &source).unwrap(), 10);
        assert_eq!(vault.list().unwrap(), vec![id.clone()]);
        assert!(vault.contains(&id));
        assert_eq!(vault.size(&id).unwrap(), 10);

        vault.delete(&id).unwrap();
        assert!(vault.list().unwrap().is_empty());
        assert!(matches!(vault.delete(&id), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_write_refuses_existing_id() {
        let (dir, vault) = setup();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"a").unwrap();

        let id = UuidGenerator.new_identifier();
        vault.write(&id, &source).unwrap();
        assert!(matches!(
            vault.write(&id, &source),
            Err(VaultError::DestinationWriteFailed(_))
        ));
    }

    #[test]
    fn test_write_unreadable_source() {
        let (dir, vault) = setup();
        let id = UuidGenerator.new_identifier();
        assert!(matches!(
            vault.write(&id, &dir.path().join("missing.bin")),
            Err(VaultError::SourceUnreadable(_))
        ));
        assert!(matches!(
            vault.write(&id, dir.path()),
            Err(VaultError::SourceUnreadable(_))
        ));
        assert!(vault.list().unwrap().is_empty());
    }

    #[test]
    fn test_partial_imports_hidden_and_swept() {
        let (dir, vault) = setup();
        let id = UuidGenerator.new_identifier();
        fs::write(vault.partial_path(&id), b"half a file").unwrap();
        assert!(vault.list().unwrap().is_empty());

        let reopened = FsVaultDirectory::open(vault.root(), vault.scratch()).unwrap();
        assert!(!reopened.partial_path(&id).exists());
        drop(dir);
    }

    #[test]
    fn test_materialize_refreshes_stale_copy() {
        let (dir, vault) = setup();
        let source = dir.path().join("notes.txt");
        fs::write(&source, b"fresh").unwrap();
        let id = UuidGenerator.new_identifier();
        vault.write(&id, &source).unwrap();

        fs::write(vault.scratch().join("notes.txt"), b"stale stale").unwrap();
        let handle = vault.materialize(&id, "notes.txt").unwrap();

        assert_eq!(handle.name(), "notes.txt");
        assert_eq!(fs::read(handle.path()).unwrap(), b"fresh");
        assert!(vault.contains(&id));

        handle.discard().unwrap();
        assert_eq!(vault.clear_scratch().unwrap(), 0);
    }

    #[test]
    fn test_materialize_missing() {
        let (_dir, vault) = setup();
        let id = UuidGenerator.new_identifier();
        assert!(matches!(vault.materialize(&id, "x"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_scratch_name_is_single_component() {
        let id = OpaqueId::parse("abc").unwrap();
        assert_eq!(scratch_name("../../etc/passwd", &id), "passwd");
        assert_eq!(scratch_name("dir\\file.txt", &id), "file.txt");
        assert_eq!(scratch_name("..", &id), "abc");
        assert_eq!(scratch_name("  ", &id), "abc");
        assert_eq!(scratch_name("trip.jpg", &id), "trip.jpg");
    }
}
