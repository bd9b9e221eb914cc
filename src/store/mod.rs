//! libSQL slot storage: named JSON documents with a revision counter.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, StoredSlot};
