//! Database locations and connection setup.
//!
//! A database lives either at a filesystem path or in memory. In-memory
//! databases use a per-engine shared-cache URI so the writer connection and
//! the reader pool attach to the same store; the writer holds the database
//! alive for its whole lifetime.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rusqlite::Connection;

use crate::error::Error;

/// Distinguishes the per-process in-memory databases from one another.
static MEMORY_DB_ID: AtomicU64 = AtomicU64::new(0);

/// Where a database lives.
#[derive(Clone, Debug)]
pub(crate) enum Location {
    /// A database file on disk, created if missing.
    File(PathBuf),
    /// An ephemeral shared-cache in-memory database.
    Memory {
        /// `file:` URI both lanes open to reach the same store.
        uri: String,
    },
}

impl Location {
    /// Resolve a caller-supplied path; absent means ephemeral in-memory.
    pub fn resolve(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self::File(path),
            None => {
                let id = MEMORY_DB_ID.fetch_add(1, Ordering::Relaxed);
                Self::Memory {
                    uri: format!("file:weir-mem-{id}?mode=memory&cache=shared"),
                }
            }
        }
    }

    /// The filesystem path, if this database lives on disk.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Memory { .. } => None,
        }
    }
}

/// Open the single write connection and apply writer pragmas.
pub(crate) fn open_writer(location: &Location) -> Result<Connection, Error> {
    // Default open flags include SQLITE_OPEN_URI, which the in-memory
    // shared-cache location relies on.
    let conn = match location {
        Location::File(path) => Connection::open(path)?,
        Location::Memory { uri } => Connection::open(uri)?,
    };
    apply_writer_pragmas(&conn)?;
    Ok(conn)
}

/// Writer connection pragmas: WAL for concurrent readers, full sync for
/// durability, enforced foreign keys.
pub(crate) fn apply_writer_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    // journal_mode returns a row ("wal", or "memory" for in-memory stores)
    conn.query_row("PRAGMA journal_mode = WAL", [], |_row| Ok(()))?;
    conn.pragma_update(None, "synchronous", "FULL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}

/// Reader connection pragmas: enforce read-only behavior even where the
/// connection had to be opened read-write (shared-cache in-memory stores).
pub(crate) fn apply_reader_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "query_only", "ON")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(())
}
