//! SQLite-backed record store.
//!
//! All collections share one `records` table; field payloads are stored as
//! JSON text and formulas are evaluated after loading a collection's rows.
//! Like the hosted store it stands in for, it enforces no relationships
//! between records.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Collection, Fields, Formula, Record, RecordStore, generate_id};
use crate::{Error, Result};

/// Database file name inside the data directory.
pub const DB_FILE: &str = "ledger.db";

/// Current schema version, recorded in the `meta` table.
const SCHEMA_VERSION: i64 = 1;

/// Record store for a single data directory.
pub struct SqliteStore {
    /// Data directory holding `ledger.db`, `config.kdl` and `action.log`
    pub root: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    /// Open existing storage in `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join(DB_FILE);
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }

        let conn = Connection::open(&db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
        })
    }

    /// Initialize storage in `data_dir`, creating the directory if needed.
    pub fn init(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join(DB_FILE))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
        })
    }

    /// Check if storage exists in `data_dir`.
    pub fn exists(data_dir: &Path) -> bool {
        data_dir.join(DB_FILE).exists()
    }

    /// Data directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                fields TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_collection ON records(collection);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Self::run_migrations(conn)?;

        Ok(())
    }

    /// Record the schema version; later versions add their migrations here.
    fn run_migrations(conn: &Connection) -> Result<()> {
        let version: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if version.is_none() {
            conn.execute(
                "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)",
                params![SCHEMA_VERSION.to_string()],
            )?;
        }

        Ok(())
    }

    /// Count records per collection (for `nb status`).
    pub fn counts(&self) -> Result<Vec<(Collection, usize)>> {
        let mut counts = Vec::new();
        for collection in Collection::ALL {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![collection.as_str()],
                |row| row.get(0),
            )?;
            counts.push((collection, n as usize));
        }
        Ok(counts)
    }

    fn parse_row(id: String, fields: String, created_at: String) -> Result<Record> {
        let fields: Fields = serde_json::from_str(&fields)?;
        let created_time = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::Storage(format!("Corrupt timestamp on {}: {}", id, e)))?;
        Ok(Record {
            id,
            created_time,
            fields,
        })
    }
}

impl RecordStore for SqliteStore {
    fn find(&self, collection: Collection, formula: &Formula) -> Result<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fields, created_at FROM records WHERE collection = ?1 ORDER BY seq ASC",
        )?;

        let rows = stmt
            .query_map(params![collection.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<(String, String, String)>>>()?;

        let mut records = Vec::new();
        for (id, fields, created_at) in rows {
            let record = Self::parse_row(id, fields, created_at)?;
            if formula.matches(&record) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        let row: Option<(String, String, String)> = self
            .conn
            .query_row(
                "SELECT id, fields, created_at FROM records WHERE collection = ?1 AND id = ?2",
                params![collection.as_str(), id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        row.map(|(id, fields, created_at)| Self::parse_row(id, fields, created_at))
            .transpose()
    }

    fn create(&mut self, collection: Collection, fields: Fields) -> Result<Record> {
        let record = Record {
            id: generate_id("rec", collection.as_str()),
            created_time: Utc::now(),
            fields,
        };

        self.conn.execute(
            "INSERT INTO records (collection, id, fields, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                collection.as_str(),
                record.id,
                serde_json::to_string(&record.fields)?,
                record.created_time.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    fn update(&mut self, collection: Collection, id: &str, fields: Fields) -> Result<Record> {
        let mut record = self
            .get(collection, id)?
            .ok_or_else(|| Error::NotFound(format!("{} record {}", collection, id)))?;
        record.fields.extend(fields);

        self.conn.execute(
            "UPDATE records SET fields = ?1 WHERE collection = ?2 AND id = ?3",
            params![
                serde_json::to_string(&record.fields)?,
                collection.as_str(),
                id
            ],
        )?;

        Ok(record)
    }

    fn delete(&mut self, collection: Collection, id: &str) -> Result<()> {
        let removed = self.conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND id = ?2",
            params![collection.as_str(), id],
        )?;
        if removed == 0 {
            return Err(Error::NotFound(format!("{} record {}", collection, id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::App;
    use crate::store::{RecordStoreExt, patch};
    use tempfile::TempDir;

    fn create_test_store() -> (TempDir, SqliteStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteStore::init(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            SqliteStore::open(temp_dir.path()),
            Err(Error::NotInitialized)
        ));
        assert!(!SqliteStore::exists(temp_dir.path()));
    }

    #[test]
    fn test_init_then_exists() {
        let (temp_dir, _store) = create_test_store();
        assert!(SqliteStore::exists(temp_dir.path()));
        assert!(temp_dir.path().join(DB_FILE).exists());
    }

    #[test]
    fn test_records_survive_reopen() {
        let (temp_dir, mut store) = create_test_store();
        let app = store.insert(&App::new("Gizmo".to_string())).unwrap();
        drop(store);

        let store = SqliteStore::open(temp_dir.path()).unwrap();
        let loaded: App = store.fetch(&app.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Gizmo");
        assert!(loaded.is_joinable);
    }

    #[test]
    fn test_find_filters_and_orders_by_creation() {
        let (_temp_dir, mut store) = create_test_store();
        store.insert(&App::new("Alpha".to_string())).unwrap();
        store.insert(&App::new("Beta".to_string())).unwrap();
        store.insert(&App::new("alpha ".to_string())).unwrap();

        let alphas: Vec<App> = store
            .find_all(&Formula::normalized_eq("name", "ALPHA"))
            .unwrap();
        assert_eq!(alphas.len(), 2);
        assert_eq!(alphas[0].name, "Alpha");
        assert_eq!(alphas[1].name, "alpha ");
    }

    #[test]
    fn test_update_merges_and_delete_removes() {
        let (_temp_dir, mut store) = create_test_store();
        let app = store.insert(&App::new("Gizmo".to_string())).unwrap();

        let updated: App = store
            .patch_entity(&app.id, patch("neighbors", ["recN"]).unwrap())
            .unwrap();
        assert_eq!(updated.neighbors, vec!["recN".to_string()]);
        assert_eq!(updated.name, "Gizmo");

        store.delete(Collection::Apps, &app.id).unwrap();
        assert!(store.get(Collection::Apps, &app.id).unwrap().is_none());
        assert!(matches!(
            store.delete(Collection::Apps, &app.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_counts_per_collection() {
        let (_temp_dir, mut store) = create_test_store();
        store.insert(&App::new("Gizmo".to_string())).unwrap();
        let counts = store.counts().unwrap();
        let apps = counts.iter().find(|(c, _)| *c == Collection::Apps).unwrap();
        assert_eq!(apps.1, 1);
        assert_eq!(counts.len(), Collection::ALL.len());
    }
}
