//! libSQL implementation of [`Database`].

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, params};
use tracing::{info, warn};

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{Database, StoredSlot};

/// Slot database on a local file or in memory.
///
/// One connection is opened up front and shared by every call; the manager's
/// writer lock already keeps writes sequential.
pub struct LibSqlBackend {
    // The connection is only valid while its database handle is alive.
    _db: libsql::Database,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open or create `path`, creating parent directories, and migrate it.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let backend = Self::open(path).await?;
        info!(path = %path.display(), "Slot database ready");
        Ok(backend)
    }

    /// Throwaway database, gone when dropped.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        Self::open(":memory:").await
    }

    async fn open(target: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(target.as_ref())
            .build()
            .await
            .map_err(|e| DatabaseError::Open(e.to_string()))?;
        let conn = db.connect().map_err(|e| DatabaseError::Open(e.to_string()))?;
        let backend = Self { _db: db, conn };
        backend.run_migrations().await?;
        Ok(backend)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Serialization(format!("bad updated_at {raw:?}: {e}")))
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(&self.conn).await
    }

    async fn read_slot(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<StoredSlot>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT body, revision, updated_at FROM slots WHERE owner = ?1 AND name = ?2",
                params![owner, name],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("read {owner}/{name}: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("read {owner}/{name}: {e}")))?
        else {
            return Ok(None);
        };

        let body: String = row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("body of {owner}/{name}: {e}")))?;
        let revision: i64 = row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("revision of {owner}/{name}: {e}")))?;
        let updated_at: String = row
            .get(2)
            .map_err(|e| DatabaseError::Query(format!("updated_at of {owner}/{name}: {e}")))?;

        let value = serde_json::from_str(&body).unwrap_or_else(|e| {
            warn!(owner, name, revision, error = %e, "Slot body is not valid JSON");
            serde_json::Value::Null
        });

        Ok(Some(StoredSlot {
            value,
            revision,
            updated_at: parse_timestamp(&updated_at)?,
        }))
    }

    async fn write_slot(
        &self,
        owner: &str,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<i64, DatabaseError> {
        let body = serde_json::to_string(value)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let mut rows = self
            .conn
            .query(
                "INSERT INTO slots (owner, name, body, revision, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4)
                 ON CONFLICT (owner, name) DO UPDATE
                     SET body = excluded.body,
                         revision = slots.revision + 1,
                         updated_at = excluded.updated_at
                 RETURNING revision",
                params![owner, name, body, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("write {owner}/{name}: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("write {owner}/{name}: {e}")))?
            .ok_or_else(|| DatabaseError::Query(format!("write {owner}/{name}: no revision")))?;
        row.get::<i64>(0)
            .map_err(|e| DatabaseError::Query(format!("revision of {owner}/{name}: {e}")))
    }
}
