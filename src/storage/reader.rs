//! The concurrent reader lane.
//!
//! Uses r2d2 with r2d2_sqlite for pooled read access. WAL mode allows many
//! concurrent readers, and each read runs inside a deferred transaction so
//! it observes one consistent snapshot for its whole duration.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OpenFlags, TransactionBehavior};

use crate::error::Error;
use crate::ops::Read;
use crate::storage::schema::{self, Location};

/// Read connection pool.
///
/// File databases are opened read-only at the SQLite level; in-memory
/// shared-cache databases must be opened read-write to attach, so the
/// `query_only` pragma enforces read-only behavior there instead.
#[derive(Clone)]
pub(crate) struct ReaderPool {
    pool: Pool<SqliteConnectionManager>,
}

impl ReaderPool {
    /// Create a pool of `max_size` read connections for `location`.
    ///
    /// Called only after the writer lane has created and migrated the
    /// database, so the store is guaranteed to exist.
    pub fn new(location: &Location, max_size: u32) -> Result<Self, Error> {
        // File paths go to the manager as paths (they need not be UTF-8);
        // only the in-memory store connects through a string URI.
        let manager = match location {
            Location::File(path) => SqliteConnectionManager::file(path).with_flags(
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            ),
            Location::Memory { uri } => SqliteConnectionManager::file(uri).with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX
                    | OpenFlags::SQLITE_OPEN_URI,
            ),
        };

        let pool = Pool::builder()
            .max_size(max_size)
            .connection_customizer(Box::new(ReaderConnectionCustomizer))
            .build(manager)?;

        Ok(Self { pool })
    }

    /// Run one read on a pooled connection inside a snapshot transaction.
    pub fn execute<R: Read>(&self, op: &R) -> Result<R::Model, Error> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let model = op.apply(&tx)?;
        tx.commit()?;
        Ok(model)
    }
}

/// Connection customizer that applies reader pragmas.
#[derive(Debug)]
struct ReaderConnectionCustomizer;

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error>
    for ReaderConnectionCustomizer
{
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        schema::apply_reader_pragmas(conn)
    }
}
