//! Durable state cache backed by redb.
//!
//! A single table holds at most one record under a fixed key: the identifier
//! of the last successfully applied data-loading operation together with its
//! expiry instant. redb has no native TTL, so the record carries an absolute
//! `expires_at` timestamp that is checked on read; an expired record reads
//! as absent and is overwritten by the next `set`.
//!
//! Invocations are assumed sequential (one test-runner process at a time),
//! so no locking beyond redb's own is layered on top.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: configured cache key string. Value: JSON-encoded record.
const STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("state");

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedOperationRecord {
    operation_id: String,
    expires_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// StateCache
// ---------------------------------------------------------------------------

/// The remembered last-applied operation, shared across invocations.
pub trait StateCache {
    /// The cached operation id, or `None` if never set, cleared, or expired.
    fn get(&self) -> Result<Option<String>>;
    fn set(&self, operation_id: &str, ttl: Duration) -> Result<()>;
    fn delete(&self) -> Result<()>;
}

// ---------------------------------------------------------------------------
// RedbCache
// ---------------------------------------------------------------------------

pub struct RedbCache {
    db: Database,
    key: String,
}

impl RedbCache {
    /// Open or create the cache database at `path`.
    ///
    /// Creates the `STATE` table if it doesn't already exist.
    pub fn open(path: &Path, key: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(|e| PrepError::Cache(e.to_string()))?;
        // Ensure the table exists before any reads
        let wt = db
            .begin_write()
            .map_err(|e| PrepError::Cache(e.to_string()))?;
        wt.open_table(STATE)
            .map_err(|e| PrepError::Cache(e.to_string()))?;
        wt.commit().map_err(|e| PrepError::Cache(e.to_string()))?;
        Ok(Self {
            db,
            key: key.to_string(),
        })
    }
}

impl StateCache for RedbCache {
    fn get(&self) -> Result<Option<String>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| PrepError::Cache(e.to_string()))?;
        let table = rt
            .open_table(STATE)
            .map_err(|e| PrepError::Cache(e.to_string()))?;
        let Some(value) = table
            .get(self.key.as_str())
            .map_err(|e| PrepError::Cache(e.to_string()))?
        else {
            return Ok(None);
        };
        let record: CachedOperationRecord = serde_json::from_slice(value.value())?;
        if record.expires_at <= Utc::now() {
            return Ok(None);
        }
        Ok(Some(record.operation_id))
    }

    fn set(&self, operation_id: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| PrepError::Cache(e.to_string()))?;
        let record = CachedOperationRecord {
            operation_id: operation_id.to_string(),
            expires_at: Utc::now() + ttl,
        };
        let value = serde_json::to_vec(&record)?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| PrepError::Cache(e.to_string()))?;
        {
            let mut table = wt
                .open_table(STATE)
                .map_err(|e| PrepError::Cache(e.to_string()))?;
            table
                .insert(self.key.as_str(), value.as_slice())
                .map_err(|e| PrepError::Cache(e.to_string()))?;
        }
        wt.commit().map_err(|e| PrepError::Cache(e.to_string()))?;
        Ok(())
    }

    fn delete(&self) -> Result<()> {
        let wt = self
            .db
            .begin_write()
            .map_err(|e| PrepError::Cache(e.to_string()))?;
        {
            let mut table = wt
                .open_table(STATE)
                .map_err(|e| PrepError::Cache(e.to_string()))?;
            table
                .remove(self.key.as_str())
                .map_err(|e| PrepError::Cache(e.to_string()))?;
        }
        wt.commit().map_err(|e| PrepError::Cache(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
