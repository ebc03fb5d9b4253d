//
// Copyright © 2025 Hardcore Engineering Inc.
//
// Licensed under the Eclipse Public License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may
// obtain a copy of the License at https://www.eclipse.org/legal/epl-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Durable local mirror of the document collection.
//!
//! The whole collection lives in a single named slot, read once at startup
//! and overwritten after every committed mutation or successful remote read.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::*;

use crate::document::Document;
use crate::{Error, Result};

/// Slot holding the serialized document collection.
pub const DOCUMENTS_SLOT: &str = "documents";

pub trait CacheStorage {
    /// `None` when nothing has been cached yet.
    fn load(&self) -> Result<Option<Vec<Document>>>;

    fn store(&self, documents: &[Document]) -> Result<()>;
}

pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(CACHE_SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn read_slot(&self, name: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().map_err(|_| Error::Other("Cache lock poisoned"))?;

        Ok(conn
            .query_row(
                "SELECT value FROM slots WHERE name = ?1",
                params![name],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    fn write_slot(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| Error::Other("Cache lock poisoned"))?;

        conn.execute(
            "INSERT OR REPLACE INTO slots (name, value, stored_at) VALUES (?1, ?2, ?3)",
            params![name, value, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }
}

impl CacheStorage for SqliteCache {
    fn load(&self) -> Result<Option<Vec<Document>>> {
        let Some(value) = self.read_slot(DOCUMENTS_SLOT)? else {
            return Ok(None);
        };

        let documents = serde_json::from_str::<Vec<Document>>(&value)?;

        trace!(count = documents.len(), "cache load");

        Ok(Some(documents))
    }

    fn store(&self, documents: &[Document]) -> Result<()> {
        let value = serde_json::to_string(documents)?;

        self.write_slot(DOCUMENTS_SLOT, &value)?;

        trace!(count = documents.len(), bytes = value.len(), "cache store");

        Ok(())
    }
}

const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS slots (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    stored_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentInputBuilder;

    fn document(subject: &str) -> Document {
        let input = DocumentInputBuilder::default()
            .doc_number("1")
            .source("source")
            .subject(subject)
            .doc_date("01/01/2566")
            .build()
            .unwrap();

        Document::new(&input, Vec::new(), None)
    }

    #[test]
    fn test_empty_cache() -> anyhow::Result<()> {
        let cache = SqliteCache::in_memory()?;
        assert!(cache.load()?.is_none());
        Ok(())
    }

    #[test]
    fn test_store_overwrites_slot() -> anyhow::Result<()> {
        let cache = SqliteCache::in_memory()?;

        cache.store(&[document("first"), document("second")])?;
        cache.store(&[document("third")])?;

        let documents = cache.load()?.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].subject, "third");

        Ok(())
    }

    #[test]
    fn test_corrupt_slot_is_an_error() -> anyhow::Result<()> {
        let cache = SqliteCache::in_memory()?;
        cache.write_slot(DOCUMENTS_SLOT, "{not json")?;

        assert!(matches!(cache.load(), Err(Error::Serde(_))));

        Ok(())
    }

    #[test]
    fn test_survives_reopen() -> anyhow::Result<()> {
        let path = std::env::temp_dir()
            .join(format!("docreg-cache-{}", std::process::id()))
            .join("cache.db");

        SqliteCache::open(&path)?.store(&[document("kept")])?;
        let documents = SqliteCache::open(&path)?.load()?.unwrap();
        std::fs::remove_dir_all(path.parent().unwrap())?;

        assert_eq!(documents[0].subject, "kept");

        Ok(())
    }
}
