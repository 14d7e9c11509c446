//! SQLite key-value backend.
//!
//! One table of `(id, name)` rows; the layout version lives in
//! `PRAGMA user_version`.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::{collect_entries, Mapping, MappingBackend, MAPPING_FORMAT_VERSION};
use crate::error::{VaultError, VaultResult};

pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Open (or create) the mapping database
    pub fn open<P: AsRef<Path>>(path: P) -> VaultResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| VaultError::PersistenceUnavailable(e.to_string()))?;
        }

        let conn = Connection::open(&path)?;
        Self::init(conn, path)
    }

    /// Throwaway in-memory database
    pub fn open_in_memory() -> VaultResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, path: PathBuf) -> VaultResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS mapping (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )?;

        let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        match version {
            0 => conn.execute_batch(&format!("PRAGMA user_version = {}", MAPPING_FORMAT_VERSION))?,
            v if v > MAPPING_FORMAT_VERSION => {
                return Err(VaultError::PersistenceUnavailable(format!(
                    "unsupported mapping version {} (expected {})",
                    v, MAPPING_FORMAT_VERSION
                )));
            }
            _ => {}
        }

        Ok(Self { conn, path })
    }
}

impl MappingBackend for SqliteBackend {
    fn load(&self) -> VaultResult<Mapping> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM mapping")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let rows = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(collect_entries(rows))
    }

    fn save(&self, mapping: &Mapping) -> VaultResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM mapping", [])?;
        {
            let mut insert = tx.prepare("INSERT INTO mapping (id, name) VALUES (?1, ?2)")?;
            for (id, name) in mapping {
                insert.execute(params![id.as_str(), name])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }
}
