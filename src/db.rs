use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
#[cfg(test)]
use std::collections::HashMap;
use std::fs::create_dir_all;
use std::path::Path;
use thiserror::Error;

use crate::recipe::Recipe;

pub const DEFAULT_KEY: &str = "recipes";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored recipes are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Could not prepare storage directory: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A flat key-value partition holding text values.
pub trait Storage {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    /// Removes every key in the partition.
    fn clear(&mut self) -> Result<()>;
    fn item_count(&self) -> Result<usize>;
}

/// Storage partition kept in a single SQLite table.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the storage file, creating parent directories as needed.
    /// The path `:memory:` opens a throwaway in-memory partition.
    pub fn open(path: &Path) -> Result<Self> {
        if path == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            (),
        )?;
        Ok(SqliteStorage { conn })
    }
}

impl Storage for SqliteStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                (key,),
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO local_storage (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            (key, value),
        )?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn.execute("DELETE FROM local_storage", ())?;
        Ok(())
    }

    fn item_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM local_storage", (), |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// In-memory partition used as a stand-in for the SQLite table in tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

#[cfg(test)]
impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.items.clear();
        Ok(())
    }

    fn item_count(&self) -> Result<usize> {
        Ok(self.items.len())
    }
}

/// The recipe collection, kept as one JSON array under a single storage key.
pub struct RecipeStore<S: Storage> {
    storage: S,
    key: String,
}

impl<S: Storage> RecipeStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, DEFAULT_KEY)
    }

    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        RecipeStore {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Reads the whole collection. A missing, empty or `null` slot is an
    /// empty collection; text that is not a JSON array is an error.
    ///
    /// Entries that are not objects (`null` included) come back as `None`
    /// and show up as blank cards.
    pub fn load(&self) -> Result<Vec<Option<Recipe>>> {
        let json = match self.storage.get_item(&self.key)? {
            Some(json) if !json.trim().is_empty() => json,
            _ => return Ok(Vec::new()),
        };
        let entries: Option<Vec<Value>> = serde_json::from_str(&json)?;
        let recipes = entries
            .unwrap_or_default()
            .into_iter()
            .map(|entry| match entry {
                Value::Object(_) => serde_json::from_value(entry).map(Some),
                _ => Ok(None),
            })
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(recipes)
    }

    /// Overwrites the slot with the full collection.
    pub fn save(&mut self, recipes: &[Option<Recipe>]) -> Result<()> {
        let json = serde_json::to_string(recipes)?;
        self.storage.set_item(&self.key, &json)?;
        log::debug!("Saved {} recipes under {:?}", recipes.len(), self.key);
        Ok(())
    }

    /// Wipes the whole storage partition, not only the recipes slot.
    pub fn clear(&mut self) -> Result<()> {
        let keys = self.storage.item_count()?;
        if keys > 1 {
            log::warn!("Clearing {} storage keys, not only {:?}", keys, self.key);
        }
        self.storage.clear()?;
        log::warn!("Cleared recipe storage");
        Ok(())
    }

    #[cfg(test)]
    pub fn storage(&self) -> &S {
        &self.storage
    }
}
