//! In-process record store.

use chrono::Utc;
use std::collections::HashMap;

use super::{Collection, Fields, Formula, Record, RecordStore, generate_id};
use crate::{Error, Result};

/// Record store held in memory. Records keep creation order per collection.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    collections: HashMap<Collection, Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.collections.get(&collection).map_or(0, Vec::len)
    }
}

impl RecordStore for MemoryStore {
    fn find(&self, collection: Collection, formula: &Formula) -> Result<Vec<Record>> {
        Ok(self
            .collections
            .get(&collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| formula.matches(r))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get(&self, collection: Collection, id: &str) -> Result<Option<Record>> {
        Ok(self
            .collections
            .get(&collection)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .cloned())
    }

    fn create(&mut self, collection: Collection, fields: Fields) -> Result<Record> {
        let record = Record {
            id: generate_id("rec", collection.as_str()),
            created_time: Utc::now(),
            fields,
        };
        self.collections
            .entry(collection)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    fn update(&mut self, collection: Collection, id: &str, fields: Fields) -> Result<Record> {
        let record = self
            .collections
            .get_mut(&collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| Error::NotFound(format!("{} record {}", collection, id)))?;
        record.fields.extend(fields);
        Ok(record.clone())
    }

    fn delete(&mut self, collection: Collection, id: &str) -> Result<()> {
        let records = self.collections.entry(collection).or_default();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Error::NotFound(format!("{} record {}", collection, id)));
        }
        Ok(())
    }
}
