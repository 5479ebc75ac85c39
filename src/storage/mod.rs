//! SQLite storage layer.
//!
//! Provides:
//! - Database location handling and PRAGMA setup
//! - Dedicated writer thread (the serialized writer lane)
//! - Read-only connection pool (the concurrent reader lane)

pub(crate) mod reader;
pub(crate) mod schema;
pub(crate) mod writer;
