//! Record store layer for ledger data.
//!
//! The ledger runs against a hosted spreadsheet-style record store: named
//! collections of records, filtered with a formula language, with no
//! transactions, no foreign keys and no unique constraints. This module
//! defines that contract as the [`RecordStore`] trait and ships two
//! implementations:
//!
//! - **`MemoryStore`**: in-process, used by tests and embedders
//! - **`SqliteStore`**: durable, one `records` table in `ledger.db` under
//!   the data directory (`--data-dir` > `NB_DATA_DIR` > `~/.local/share/neighborhood/`)
//!
//! Typed access goes through [`RecordStoreExt`], which maps [`Entity`]
//! structs to and from raw record fields.

pub mod formula;
pub mod memory;
pub mod sqlite;

pub use formula::{Formula, normalize_key};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "NB_DATA_DIR";

/// Raw field payload of a record.
pub type Fields = serde_json::Map<String, Value>;

/// The collections the ledger touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Neighbors,
    Apps,
    HackatimeProjects,
    Sessions,
    Commits,
    Posts,
    Comments,
    Submissions,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::Neighbors,
        Collection::Apps,
        Collection::HackatimeProjects,
        Collection::Sessions,
        Collection::Commits,
        Collection::Posts,
        Collection::Comments,
        Collection::Submissions,
    ];

    /// Table name in the hosted store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Neighbors => "neighbors",
            Collection::Apps => "Apps",
            Collection::HackatimeProjects => "hackatimeProjects",
            Collection::Sessions => "sessions",
            Collection::Commits => "commits",
            Collection::Posts => "Posts",
            Collection::Comments => "Comments",
            Collection::Submissions => "YSWS Submission",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw record as the store returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub created_time: DateTime<Utc>,
    pub fields: Fields,
}

/// Contract of the backing record store.
///
/// Implementations offer no atomicity across calls. `update` has patch
/// semantics: the given fields replace existing ones, the rest are kept.
pub trait RecordStore {
    /// All records of `collection` matching `formula`, in creation order.
    fn find(&self, collection: Collection, formula: &Formula) -> Result<Vec<Record>>;

    /// A single record by id, `None` when absent.
    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>>;

    /// Create a record; the store assigns its id.
    fn create(&mut self, collection: Collection, fields: Fields) -> Result<Record>;

    /// Patch an existing record.
    fn update(&mut self, collection: Collection, id: &str, fields: Fields) -> Result<Record>;

    /// Delete a record by id.
    fn delete(&mut self, collection: Collection, id: &str) -> Result<()>;
}

/// A typed record living in one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

/// Serialize an entity into record fields (the id is store-owned and dropped).
pub fn encode<E: Entity>(entity: &E) -> Result<Fields> {
    match serde_json::to_value(entity)? {
        Value::Object(mut fields) => {
            fields.remove("id");
            Ok(fields)
        }
        other => Err(Error::Storage(format!(
            "{} entity did not serialize to an object: {}",
            E::COLLECTION,
            other
        ))),
    }
}

/// Deserialize a record into an entity, carrying the record id over.
pub fn decode<E: Entity>(record: Record) -> Result<E> {
    let mut fields = record.fields;
    fields.insert("id".to_string(), Value::String(record.id));
    Ok(serde_json::from_value(Value::Object(fields))?)
}

/// Build a single-field patch.
pub fn patch(field: &str, value: impl Serialize) -> Result<Fields> {
    let mut fields = Fields::new();
    fields.insert(field.to_string(), serde_json::to_value(value)?);
    Ok(fields)
}

/// Typed helpers over any [`RecordStore`].
pub trait RecordStoreExt: RecordStore {
    fn fetch<E: Entity>(&self, id: &str) -> Result<Option<E>> {
        self.get(E::COLLECTION, id)?.map(decode).transpose()
    }

    fn find_all<E: Entity>(&self, formula: &Formula) -> Result<Vec<E>> {
        self.find(E::COLLECTION, formula)?
            .into_iter()
            .map(decode)
            .collect()
    }

    fn find_first<E: Entity>(&self, formula: &Formula) -> Result<Option<E>> {
        self.find(E::COLLECTION, formula)?
            .into_iter()
            .next()
            .map(decode)
            .transpose()
    }

    /// Create the entity and return it with its assigned id.
    fn insert<E: Entity>(&mut self, entity: &E) -> Result<E> {
        let record = self.create(E::COLLECTION, encode(entity)?)?;
        decode(record)
    }

    fn patch_entity<E: Entity>(&mut self, id: &str, fields: Fields) -> Result<E> {
        let record = self.update(E::COLLECTION, id, fields)?;
        decode(record)
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a record id.
///
/// Format: `<prefix><14 hex chars>`, e.g. `rec3f9a0c1d2b7e44`.
pub fn generate_id(prefix: &str, seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(
        chrono::Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(0)
            .to_le_bytes(),
    );
    hasher.update(ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let hash = hasher.finalize();
    let hash_hex = format!("{:x}", hash);
    format!("{}{}", prefix, &hash_hex[..14])
}

/// Resolve the data directory.
///
/// Priority: explicit path > `NB_DATA_DIR` > `<platform data dir>/neighborhood`.
pub fn get_storage_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Storage("Could not determine data directory".to_string()))?;
    Ok(data_dir.join("neighborhood"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::App;

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("rec", "seed");
        assert!(id.starts_with("rec"));
        assert_eq!(id.len(), 17);
        assert!(id[3..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_id_uniqueness_with_same_seed() {
        let id1 = generate_id("rec", "same");
        let id2 = generate_id("rec", "same");
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Submissions.as_str(), "YSWS Submission");
        assert_eq!(Collection::from_str("apps"), Some(Collection::Apps));
        assert_eq!(Collection::from_str("nope"), None);
    }

    #[test]
    fn test_encode_drops_id_and_decode_restores_it() {
        let mut app = App::new("Gizmo".to_string());
        app.id = "recIgnored".to_string();
        let fields = encode(&app).unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["name"], "Gizmo");

        let record = Record {
            id: "recA".to_string(),
            created_time: Utc::now(),
            fields,
        };
        let decoded: App = decode(record).unwrap();
        assert_eq!(decoded.id, "recA");
        assert_eq!(decoded.name, "Gizmo");
    }

    #[test]
    fn test_explicit_storage_dir_wins() {
        let dir = get_storage_dir(Some(Path::new("/tmp/nb-explicit"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/nb-explicit"));
    }

    #[test]
    #[serial_test::serial]
    fn test_storage_dir_from_env() {
        // SAFETY: serialized with every other test touching NB_DATA_DIR.
        unsafe { std::env::set_var(DATA_DIR_ENV, "/tmp/nb-env") };
        let from_env = get_storage_dir(None).unwrap();

        unsafe { std::env::set_var(DATA_DIR_ENV, "   ") };
        let blank = get_storage_dir(None);

        unsafe { std::env::remove_var(DATA_DIR_ENV) };
        assert_eq!(from_env, PathBuf::from("/tmp/nb-env"));
        if let Ok(dir) = blank {
            assert!(dir.ends_with("neighborhood"));
        }
    }
}
