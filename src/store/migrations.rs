//! Schema upgrades for the slot database.
//!
//! The applied version lives in SQLite's `user_version` header, so there is no
//! bookkeeping table. Each step runs in its own transaction together with the
//! version bump.

use libsql::Connection;
use tracing::{debug, info};

use crate::error::DatabaseError;

/// Schema steps. Version N is `STEPS[N - 1]`; append only.
const STEPS: &[(&str, &str)] = &[(
    "slots",
    "CREATE TABLE IF NOT EXISTS slots (
        owner      TEXT    NOT NULL,
        name       TEXT    NOT NULL,
        body       TEXT    NOT NULL,
        revision   INTEGER NOT NULL DEFAULT 1,
        updated_at TEXT    NOT NULL,
        PRIMARY KEY (owner, name)
    );",
)];

/// Latest schema version this build knows about.
pub fn latest_version() -> i64 {
    STEPS.len() as i64
}

/// Bring the schema up to [`latest_version`].
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current = schema_version(conn).await?;
    if current > latest_version() {
        return Err(DatabaseError::Migration(format!(
            "database is at schema v{current}, newer than this build (v{})",
            latest_version()
        )));
    }

    for (index, (label, sql)) in STEPS.iter().enumerate().skip(current as usize) {
        let version = index as i64 + 1;
        info!(version, label, "Upgrading slot schema");

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Migration(format!("v{version} begin: {e}")))?;
        tx.execute_batch(sql)
            .await
            .map_err(|e| DatabaseError::Migration(format!("v{version} ({label}): {e}")))?;
        tx.execute_batch(&format!("PRAGMA user_version = {version};"))
            .await
            .map_err(|e| DatabaseError::Migration(format!("v{version} stamp: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Migration(format!("v{version} commit: {e}")))?;
    }

    debug!(version = latest_version(), "Slot schema up to date");
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("PRAGMA user_version", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading user_version: {e}")))?;
    let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("reading user_version: {e}")))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| DatabaseError::Migration(format!("decoding user_version: {e}")))
}
