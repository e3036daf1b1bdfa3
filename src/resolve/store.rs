//! Value-mapping stores consulted by the resolver.
//!
//! A store answers "exact match for (category, normalized input)" and
//! "every mapping for category". Stores keep insertion order; the resolver's
//! fuzzy tie-breaking depends on it.

use std::path::Path;

use parking_lot::{Mutex, RwLock};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::MappingStoreError;
use crate::resolve::normalize_text;

/// One many-to-one mapping from a raw spelling to its standard value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub mapping_type: String,
    pub input_value: String,
    pub standard_value: String,
}

impl MappingRecord {
    /// Builds a record with the input already normalized.
    pub fn new(
        mapping_type: impl Into<String>,
        input_value: &str,
        standard_value: impl Into<String>,
    ) -> Self {
        Self {
            mapping_type: mapping_type.into(),
            input_value: normalize_text(input_value),
            standard_value: standard_value.into(),
        }
    }
}

/// Read side of a value-mapping store.
pub trait MappingStore: Send + Sync {
    /// Standard value for an exact `(category, normalized)` match.
    fn exact(&self, category: &str, normalized: &str) -> Result<Option<String>, MappingStoreError>;
    /// Every mapping for `category`, in lookup order.
    fn all_for(&self, category: &str) -> Result<Vec<MappingRecord>, MappingStoreError>;

    /// Whether some mapping of `category` has `value` as its standard value.
    fn has_standard(&self, category: &str, value: &str) -> Result<bool, MappingStoreError> {
        Ok(self
            .all_for(category)?
            .iter()
            .any(|record| record.standard_value == value))
    }
}

/// Process-local store, mainly for tests and configuration-seeded runs.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    records: RwLock<Vec<MappingRecord>>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MappingRecord>,
    {
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        store
    }

    /// Inserts or replaces the mapping for `(mapping_type, input_value)`.
    pub fn insert(&self, mut record: MappingRecord) {
        record.input_value = normalize_text(&record.input_value);
        let mut records = self.records.write();
        match records.iter_mut().find(|r| {
            r.mapping_type == record.mapping_type && r.input_value == record.input_value
        }) {
            Some(existing) => existing.standard_value = record.standard_value,
            None => records.push(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MappingStore for InMemoryMappingStore {
    fn exact(&self, category: &str, normalized: &str) -> Result<Option<String>, MappingStoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.mapping_type == category && r.input_value == normalized)
            .map(|r| r.standard_value.clone()))
    }

    fn all_for(&self, category: &str) -> Result<Vec<MappingRecord>, MappingStoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.mapping_type == category)
            .cloned()
            .collect())
    }
}

/// SQLite-backed store over a `value_mappings` table.
pub struct SqliteMappingStore {
    conn: Mutex<Connection>,
}

impl SqliteMappingStore {
    /// Opens (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MappingStoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, MappingStoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MappingStoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS value_mappings (
                mapping_type TEXT NOT NULL,
                input_value TEXT NOT NULL,
                standard_value TEXT NOT NULL,
                PRIMARY KEY (mapping_type, input_value)
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Inserts or replaces one mapping; the input is normalized first.
    pub fn upsert(&self, record: &MappingRecord) -> Result<(), MappingStoreError> {
        let input = normalize_text(&record.input_value);
        self.conn.lock().execute(
            "INSERT INTO value_mappings (mapping_type, input_value, standard_value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (mapping_type, input_value)
             DO UPDATE SET standard_value = excluded.standard_value",
            params![record.mapping_type, input, record.standard_value],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize, MappingStoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM value_mappings", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl MappingStore for SqliteMappingStore {
    fn exact(&self, category: &str, normalized: &str) -> Result<Option<String>, MappingStoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT standard_value FROM value_mappings
                 WHERE mapping_type = ?1 AND input_value = ?2",
                params![category, normalized],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(found)
    }

    fn all_for(&self, category: &str) -> Result<Vec<MappingRecord>, MappingStoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT mapping_type, input_value, standard_value FROM value_mappings
             WHERE mapping_type = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map([category], |row| {
            Ok(MappingRecord {
                mapping_type: row.get(0)?,
                input_value: row.get(1)?,
                standard_value: row.get(2)?,
            })
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn has_standard(&self, category: &str, value: &str) -> Result<bool, MappingStoreError> {
        let conn = self.conn.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM value_mappings
                 WHERE mapping_type = ?1 AND standard_value = ?2 LIMIT 1",
                params![category, value],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
