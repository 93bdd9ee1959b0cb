use std::env;
use std::path::PathBuf;

use crate::db::DEFAULT_KEY;

const DEFAULT_DB: &str = "recipes.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite file backing the storage partition, or `:memory:`.
    pub db_path: PathBuf,
    /// Storage key holding the recipe collection.
    pub storage_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB),
            storage_key: DEFAULT_KEY.to_string(),
        }
    }
}

impl Config {
    /// Reads `RECIPES_DB` and `RECIPES_KEY`, falling back to defaults when unset or blank.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Config {
            db_path: var("RECIPES_DB").map(PathBuf::from).unwrap_or(defaults.db_path),
            storage_key: var("RECIPES_KEY").unwrap_or(defaults.storage_key),
        }
    }
}
