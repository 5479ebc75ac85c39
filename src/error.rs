//! Error types surfaced by the engine.
//!
//! Storage-level errors propagate verbatim: the engine adds no retry logic
//! and never swallows an error. Cancellation is never represented here:
//! a cancelled observation terminates its stream and an abandoned future
//! simply never resolves its continuation.

use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A schema migration failed during [`load`](crate::Engine::load).
    ///
    /// The database never becomes ready after a migration failure; queued
    /// operations stay queued until a later `load` succeeds.
    #[error("migration {identifier:?} failed: {source}")]
    Migration {
        /// Identifier of the migration that failed.
        identifier: String,
        /// The underlying SQLite error.
        #[source]
        source: rusqlite::Error,
    },

    /// [`load`](crate::Engine::load) was called while the engine is already
    /// loading or ready.
    #[error("database is already loaded")]
    AlreadyLoaded,

    /// An SQLite error from the underlying storage engine, propagated
    /// verbatim. For writes, the transaction was fully rolled back.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// The read connection pool could not supply a connection.
    #[error("reader pool: {0}")]
    Pool(#[from] r2d2::Error),

    /// The engine was torn down before the operation could complete.
    #[error("engine closed before the operation completed")]
    EngineClosed,
}
