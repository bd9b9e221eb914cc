//! Named JSON slots, the unit of persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;

/// A slot as last written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSlot {
    /// `Null` when the stored body is not valid JSON.
    pub value: serde_json::Value,
    /// Starts at 1, bumped on every write.
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

/// Slot storage keyed by `(owner, name)`. Writes replace the whole body.
#[async_trait]
pub trait Database: Send + Sync {
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    async fn read_slot(&self, owner: &str, name: &str)
    -> Result<Option<StoredSlot>, DatabaseError>;

    /// Replace a slot's body, returning its new revision.
    async fn write_slot(
        &self,
        owner: &str,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<i64, DatabaseError>;
}
