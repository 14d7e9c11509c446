//! Decoy Vault - Vault Service
//!
//! The only component allowed to touch both the vault directory and the
//! mapping store. File write + mapping put and file delete + mapping remove
//! always run as pairs, directory first, so a failure part-way leaves at
//! worst a file without a name (listed under its identifier) or a name
//! without a file (dropped on the next listing).

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::config::VaultConfig;
use crate::directory::{FsVaultDirectory, TemporaryHandle, VaultDirectory};
use crate::error::{VaultError, VaultResult};
use crate::ident::{IdentifierSource, OpaqueId, UuidGenerator};
use crate::mapping::{Mapping, MappingStore};
use crate::source::{AccessGuard, ImportSource, PathSource};

/// Attempts at drawing an identifier not already on disk
const MAX_ID_ATTEMPTS: usize = 4;

/// One file in the vault, as the UI sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultEntry {
    /// On-disk identifier, never changes
    pub id: OpaqueId,
    /// User-visible name
    pub display_name: String,
    /// Stored size in bytes
    pub size: u64,
    /// No mapping record; `display_name` is the raw identifier
    pub orphaned: bool,
}

/// Vault statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct VaultStats {
    pub entries: usize,
    pub orphans: usize,
    pub total_size: u64,
}

/// Vault Service - import, list, rename, delete, materialize
pub struct VaultService {
    directory: Box<dyn VaultDirectory>,
    mapping: MappingStore,
    ids: Box<dyn IdentifierSource>,
}

impl VaultService {
    // ═══════════════════════════════════════════════════════════════════════
    // INITIALIZATION
    // ═══════════════════════════════════════════════════════════════════════

    pub fn new(
        directory: Box<dyn VaultDirectory>,
        mapping: MappingStore,
        ids: Box<dyn IdentifierSource>,
    ) -> Self {
        Self {
            directory,
            mapping,
            ids,
        }
    }

    /// Open the filesystem vault described by `config`
    pub fn open(config: &VaultConfig) -> VaultResult<Self> {
        let directory = FsVaultDirectory::open(config.files_dir(), config.scratch_dir())?;
        let mapping = MappingStore::new(config.open_backend()?);

        log::info!("Vault opened at {}", config.root.display());

        Ok(Self::new(
            Box::new(directory),
            mapping,
            Box::new(UuidGenerator),
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // IMPORT
    // ═══════════════════════════════════════════════════════════════════════

    /// Copy a file into the vault under a fresh identifier.
    ///
    /// If the mapping cannot be written after the copy succeeded, the error
    /// is returned but the file stays and is listed under its identifier.
    pub fn import(&self, source: &dyn ImportSource) -> VaultResult<VaultEntry> {
        let original_name = source.original_name();
        let id = self.fresh_identifier()?;

        let size = {
            let _access = AccessGuard::acquire(source)?;
            self.directory.write(&id, source.path())?
        };

        if let Err(e) = self.mapping.put(&id, &original_name) {
            log::warn!("Imported {} but could not record its name: {}", id, e);
            return Err(e);
        }

        log::info!("Imported {} ({} bytes)", id, size);

        Ok(VaultEntry {
            id,
            display_name: original_name,
            size,
            orphaned: false,
        })
    }

    /// Import a plain filesystem path
    pub fn import_path<P: AsRef<Path>>(&self, path: P) -> VaultResult<VaultEntry> {
        self.import(&PathSource::new(path))
    }

    /// Import several paths; one result per source
    pub fn import_many<P: AsRef<Path>>(&self, sources: &[P]) -> Vec<VaultResult<VaultEntry>> {
        sources.iter().map(|p| self.import_path(p)).collect()
    }

    fn fresh_identifier(&self) -> VaultResult<OpaqueId> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.new_identifier();
            if !self.directory.contains(&id) {
                return Ok(id);
            }
            log::warn!("Identifier {} already in use, drawing another", id);
        }
        Err(VaultError::DestinationWriteFailed(
            "could not allocate a free identifier".into(),
        ))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LIST
    // ═══════════════════════════════════════════════════════════════════════

    /// Every file on disk, named from the mapping where a record exists.
    ///
    /// Records whose file is gone are skipped here and pruned from the store.
    pub fn list(&self) -> VaultResult<Vec<VaultEntry>> {
        let ids = self.directory.list()?;

        let (mapping, mapping_ok) = match self.mapping.load() {
            Ok(mapping) => (mapping, true),
            Err(e) => {
                log::warn!("Mapping unavailable, listing raw identifiers: {}", e);
                (Mapping::new(), false)
            }
        };

        let present: HashSet<&OpaqueId> = ids.iter().collect();
        if mapping_ok && mapping.keys().any(|id| !present.contains(id)) {
            self.prune_stale_records();
        }

        let mut entries: Vec<VaultEntry> = ids
            .iter()
            .map(|id| self.entry_from(id, &mapping))
            .collect();

        entries.sort_by(|a, b| {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(entries)
    }

    /// Single entry by identifier
    pub fn entry(&self, id: &OpaqueId) -> VaultResult<VaultEntry> {
        if !self.directory.contains(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }
        let mapping = self.mapping.load().unwrap_or_default();
        Ok(self.entry_from(id, &mapping))
    }

    fn entry_from(&self, id: &OpaqueId, mapping: &Mapping) -> VaultEntry {
        let name = mapping.get(id).filter(|n| !n.is_empty());
        VaultEntry {
            id: id.clone(),
            display_name: name.cloned().unwrap_or_else(|| id.to_string()),
            size: self.directory.size(id).unwrap_or(0),
            orphaned: name.is_none(),
        }
    }

    /// Best-effort removal of records whose file no longer exists
    fn prune_stale_records(&self) {
        // Checked against the directory under the store lock, so a record
        // written by an import that finished after our listing survives
        match self.mapping.prune(|id| self.directory.contains(id)) {
            Ok(0) => {}
            Ok(n) => log::info!("Pruned {} stale mapping record(s)", n),
            Err(e) => log::warn!("Could not prune stale mapping records: {}", e),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RENAME / DELETE
    // ═══════════════════════════════════════════════════════════════════════

    /// Change the display name. An empty name is a no-op; the stored file
    /// is never touched.
    pub fn rename(&self, id: &OpaqueId, new_name: &str) -> VaultResult<()> {
        if new_name.trim().is_empty() {
            log::debug!("Ignoring empty rename of {}", id);
            return Ok(());
        }
        if !self.directory.contains(id) {
            return Err(VaultError::NotFound(id.to_string()));
        }

        self.mapping.rename(id, new_name)?;
        log::info!("Renamed {}", id);
        Ok(())
    }

    /// Remove the file, then its mapping record
    pub fn delete(&self, id: &OpaqueId) -> VaultResult<()> {
        if let Err(e) = self.directory.delete(id) {
            if matches!(e, VaultError::NotFound(_)) {
                self.prune_stale_records();
            }
            return Err(e);
        }

        if let Err(e) = self.mapping.remove(id) {
            log::warn!("Deleted {} but its mapping record remains: {}", id, e);
            return Err(e);
        }

        log::info!("Deleted {}", id);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // MATERIALIZE
    // ═══════════════════════════════════════════════════════════════════════

    /// Scratch copy of an entry under its display name, for preview/share
    pub fn materialize(&self, id: &OpaqueId) -> VaultResult<TemporaryHandle> {
        let name = match self.mapping.get(id) {
            Ok(Some(name)) if !name.is_empty() => name,
            Ok(_) => id.to_string(),
            Err(e) => {
                log::warn!(
                    "Mapping unavailable, materializing {} under its identifier: {}",
                    id,
                    e
                );
                id.to_string()
            }
        };

        self.directory.materialize(id, &name)
    }

    /// Remove every materialized copy
    pub fn clear_scratch(&self) -> VaultResult<usize> {
        self.directory.clear_scratch()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STATS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn stats(&self) -> VaultResult<VaultStats> {
        let entries = self.list()?;
        Ok(VaultStats {
            entries: entries.len(),
            orphans: entries.iter().filter(|e| e.orphaned).count(),
            total_size: entries.iter().map(|e| e.size).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::testing::FailingDeletes;
    use crate::mapping::{testing::FlakyBackend, JsonFileBackend, MemoryBackend};
    use crate::source::testing::ScopedSource;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::{tempdir, TempDir};

    fn fs_dir(dir: &TempDir) -> FsVaultDirectory {
        FsVaultDirectory::open(dir.path().join("files"), dir.path().join("scratch")).unwrap()
    }

    fn service(dir: &TempDir) -> VaultService {
        VaultService::new(
            Box::new(fs_dir(dir)),
            MappingStore::new(Box::new(MemoryBackend::new())),
            Box::new(UuidGenerator),
        )
    }

    /// Hands out ids in a fixed order, then repeats the last one
    struct Scripted(parking_lot::Mutex<std::collections::VecDeque<&'static str>>);

    impl Scripted {
        fn new(ids: &[&'static str]) -> Self {
            Self(parking_lot::Mutex::new(ids.iter().copied().collect()))
        }
    }

    impl IdentifierSource for Scripted {
        fn new_identifier(&self) -> OpaqueId {
            let mut ids = self.0.lock();
            let next = if ids.len() > 1 { ids.pop_front() } else { ids.front().copied() };
            OpaqueId::parse(next.unwrap_or("zzz")).unwrap()
        }
    }

    fn scripted_service(dir: &TempDir, ids: &[&'static str]) -> VaultService {
        VaultService::new(
            Box::new(fs_dir(dir)),
            MappingStore::new(Box::new(MemoryBackend::new())),
            Box::new(Scripted::new(ids)),
        )
    }

    fn source(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(&inbox).unwrap();
        let path = inbox.join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_import_rename_materialize_delete() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let photo = source(&dir, "vacation.jpg", b"\xFF\xD8\xFFbeach");

        let entry = vault.import_path(&photo).unwrap();
        assert_eq!(entry.display_name, "vacation.jpg");
        assert_ne!(entry.id.as_str(), "vacation.jpg");

        let listed = vault.list().unwrap();
        assert_eq!(listed, vec![entry.clone()]);

        vault.rename(&entry.id, "trip.jpg").unwrap();
        let listed = vault.list().unwrap();
        assert_eq!(listed[0].display_name, "trip.jpg");
        assert_eq!(listed[0].id, entry.id);

        let handle = vault.materialize(&entry.id).unwrap();
        assert_eq!(handle.name(), "trip.jpg");
        assert_eq!(fs::read(handle.path()).unwrap(), fs::read(&photo).unwrap());

        vault.delete(&entry.id).unwrap();
        assert!(vault.list().unwrap().is_empty());
    }

    #[test]
    fn test_materialize_round_trip() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let bytes: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let path = source(&dir, "archive.bin", &bytes);

        let entry = vault.import_path(&path).unwrap();
        let handle = vault.materialize(&entry.id).unwrap();
        assert_eq!(handle.name(), "archive.bin");
        assert_eq!(fs::read(handle.path()).unwrap(), bytes);

        // repeat access refreshes the copy
        let again = vault.materialize(&entry.id).unwrap();
        assert_eq!(again.path(), handle.path());
        assert_eq!(vault.clear_scratch().unwrap(), 1);
    }

    #[test]
    fn test_rename_to_empty_keeps_name() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let entry = vault.import_path(source(&dir, "notes.txt", b"n")).unwrap();

        vault.rename(&entry.id, "").unwrap();
        assert_eq!(vault.entry(&entry.id).unwrap().display_name, "notes.txt");
    }

    #[test]
    fn test_rename_unknown_id() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let id = UuidGenerator.new_identifier();
        assert!(matches!(vault.rename(&id, "x"), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_orphan_listed_when_mapping_write_fails() {
        let dir = tempdir().unwrap();
        let (backend, faults) = FlakyBackend::new();
        let vault = VaultService::new(
            Box::new(fs_dir(&dir)),
            MappingStore::new(Box::new(backend)),
            Box::new(UuidGenerator),
        );

        faults.fail_saves(true);
        let err = vault.import_path(source(&dir, "secret.pdf", b"pdf")).unwrap_err();
        assert!(err.is_persistence());

        let listed = vault.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].orphaned);
        assert_eq!(listed[0].display_name, listed[0].id.to_string());

        // the orphan can still be named once persistence is back
        faults.fail_saves(false);
        vault.rename(&listed[0].id, "secret.pdf").unwrap();
        assert_eq!(vault.list().unwrap()[0].display_name, "secret.pdf");
    }

    #[test]
    fn test_list_survives_mapping_outage() {
        let dir = tempdir().unwrap();
        let (backend, faults) = FlakyBackend::new();
        let vault = VaultService::new(
            Box::new(fs_dir(&dir)),
            MappingStore::new(Box::new(backend)),
            Box::new(UuidGenerator),
        );
        let entry = vault.import_path(source(&dir, "a.txt", b"a")).unwrap();

        faults.fail_loads(true);
        let listed = vault.list().unwrap();
        assert_eq!(listed[0].display_name, entry.id.to_string());

        faults.fail_loads(false);
        assert_eq!(vault.list().unwrap()[0].display_name, "a.txt");
    }

    #[test]
    fn test_failed_directory_delete_keeps_entry() {
        let dir = tempdir().unwrap();
        let fail = Arc::new(AtomicBool::new(false));
        let vault = VaultService::new(
            Box::new(FailingDeletes {
                inner: fs_dir(&dir),
                fail: Arc::clone(&fail),
            }),
            MappingStore::new(Box::new(MemoryBackend::new())),
            Box::new(UuidGenerator),
        );
        let entry = vault.import_path(source(&dir, "keep.doc", b"doc")).unwrap();

        fail.store(true, Ordering::SeqCst);
        assert!(vault.delete(&entry.id).is_err());

        let listed = vault.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].display_name, "keep.doc");
        assert!(!listed[0].orphaned);
    }

    #[test]
    fn test_failed_mapping_remove_reconciles_later() {
        let dir = tempdir().unwrap();
        let (backend, faults) = FlakyBackend::new();
        let vault = VaultService::new(
            Box::new(fs_dir(&dir)),
            MappingStore::new(Box::new(backend)),
            Box::new(UuidGenerator),
        );
        let entry = vault.import_path(source(&dir, "gone.txt", b"g")).unwrap();

        faults.fail_saves(true);
        assert!(vault.delete(&entry.id).unwrap_err().is_persistence());
        assert!(vault.list().unwrap().is_empty());

        faults.fail_saves(false);
        assert!(vault.list().unwrap().is_empty());
        assert!(vault.mapping.load().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_band_removal_reconciled() {
        let dir = tempdir().unwrap();
        let mapping_path = dir.path().join("mapping.json");
        let vault = VaultService::new(
            Box::new(fs_dir(&dir)),
            MappingStore::new(Box::new(JsonFileBackend::new(&mapping_path))),
            Box::new(UuidGenerator),
        );
        let keep = vault.import_path(source(&dir, "keep.txt", b"k")).unwrap();
        let lost = vault.import_path(source(&dir, "lost.txt", b"l")).unwrap();

        fs::remove_file(dir.path().join("files").join(lost.id.as_str())).unwrap();

        let listed = vault.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);

        let persisted = JsonFileBackend::new(&mapping_path);
        let mapping = crate::mapping::MappingBackend::load(&persisted).unwrap();
        assert!(!mapping.contains_key(&lost.id));
        assert!(mapping.contains_key(&keep.id));
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = tempdir().unwrap();
        let config = VaultConfig::with_root(dir.path().join("root"));
        let photo = source(&dir, "vacation.jpg", b"jpg");

        let id = {
            let vault = VaultService::open(&config).unwrap();
            let entry = vault.import_path(&photo).unwrap();
            vault.rename(&entry.id, "trip.jpg").unwrap();
            entry.id
        };

        let vault = VaultService::open(&config).unwrap();
        let listed = vault.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].display_name, "trip.jpg");
    }

    #[test]
    fn test_scoped_source_released_after_copy() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let scoped = ScopedSource::new(source(&dir, "shared.txt", b"shared"), true);

        let entry = vault.import(&scoped).unwrap();
        assert_eq!(entry.display_name, "shared.txt");
        assert_eq!(scoped.starts.get(), 1);
        assert_eq!(scoped.stops.get(), 1);
        assert!(!scoped.active.get());

        let denied = ScopedSource::new(source(&dir, "locked.txt", b"x"), false);
        assert!(matches!(vault.import(&denied), Err(VaultError::SourceUnreadable(_))));
        assert_eq!(vault.list().unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_source_leaves_no_trace() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        assert!(matches!(
            vault.import_path(dir.path().join("nope.txt")),
            Err(VaultError::SourceUnreadable(_))
        ));
        assert!(vault.list().unwrap().is_empty());
        assert!(vault.mapping.load().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_names_get_distinct_ids() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let path = source(&dir, "same.txt", b"1");

        let results = vault.import_many(&[&path, &path]);
        let ids: Vec<_> = results.into_iter().map(|r| r.unwrap().id).collect();
        assert_ne!(ids[0], ids[1]);

        let stats = vault.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.orphans, 0);
        assert_eq!(stats.total_size, 2);
    }

    #[test]
    fn test_list_order() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        for name in ["beta.txt", "Alpha.txt", "gamma.txt"] {
            vault.import_path(source(&dir, name, b"x")).unwrap();
        }
        let names: Vec<_> = vault
            .list()
            .unwrap()
            .into_iter()
            .map(|e| e.display_name)
            .collect();
        assert_eq!(names, vec!["Alpha.txt", "beta.txt", "gamma.txt"]);
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let vault = service(&dir);
        let id = UuidGenerator.new_identifier();
        assert!(matches!(vault.delete(&id), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_identifier_collision_draws_again() {
        let dir = tempdir().unwrap();
        let vault = scripted_service(&dir, &["aaa", "aaa", "bbb"]);

        let first = vault.import_path(source(&dir, "a.txt", b"one")).unwrap();
        let second = vault.import_path(source(&dir, "b.txt", b"two")).unwrap();
        assert_eq!(first.id.as_str(), "aaa");
        assert_eq!(second.id.as_str(), "bbb");

        let path = dir.path().join("files").join("aaa");
        assert_eq!(fs::read(path).unwrap(), b"one");
        assert_eq!(vault.list().unwrap().len(), 2);
    }

    #[test]
    fn test_identifier_exhaustion_fails_import() {
        let dir = tempdir().unwrap();
        let vault = scripted_service(&dir, &["aaa"]);

        vault.import_path(source(&dir, "a.txt", b"one")).unwrap();
        let result = vault.import_path(source(&dir, "b.txt", b"two"));
        assert!(matches!(result, Err(VaultError::DestinationWriteFailed(_))));

        let listed = vault.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].display_name, "a.txt");
        assert_eq!(fs::read(dir.path().join("files").join("aaa")).unwrap(), b"one");
    }
}
