//! Migration registry execution.
//!
//! Migrations run on the writer connection before the dispatch gate opens,
//! in registration order. Applied identifiers are recorded in a bookkeeping
//! table inside the same database, so each migration runs at most once per
//! database file, each inside its own transaction. Any failure aborts the
//! load: the database never becomes ready over a partially-migrated schema.

use rusqlite::{Connection, TransactionBehavior};

use crate::error::Error;
use crate::ops::Migration;

/// Bookkeeping table holding applied migration identifiers.
const MIGRATIONS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS weir_migrations (
    identifier TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Apply every unapplied migration in registration order.
pub(crate) fn run(conn: &mut Connection, migrations: &[Box<dyn Migration>]) -> Result<(), Error> {
    conn.execute(MIGRATIONS_TABLE_SQL, [])?;

    for migration in migrations {
        let identifier = migration.identifier();
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM weir_migrations WHERE identifier = ?1)",
            [identifier],
            |row| row.get(0),
        )?;
        if applied {
            tracing::debug!(identifier, "migration already applied, skipping");
            continue;
        }

        // One transaction per migration: the schema change and its
        // bookkeeping row commit together or not at all.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        migration.apply(&tx).map_err(|source| Error::Migration {
            identifier: identifier.to_string(),
            source,
        })?;
        tx.execute(
            "INSERT INTO weir_migrations (identifier) VALUES (?1)",
            [identifier],
        )?;
        tx.commit()?;
        tracing::info!(identifier, "applied migration");
    }

    Ok(())
}
