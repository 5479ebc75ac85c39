//! Operation contracts consumed by the engine.
//!
//! The engine is generic over caller-supplied operations:
//! - [`Write`]: a side-effecting operation run inside an exclusive transaction
//! - [`Read`]: a pure function of a database snapshot returning a model
//! - [`Migration`]: a one-time schema evolution step with a stable identifier
//!
//! Operations are opaque to the engine; the only thing it inspects is the
//! [`TableSet`] each one declares, which drives change tracking for live
//! observation.

use std::collections::BTreeSet;

use rusqlite::Connection;

/// The set of tables an operation touches (writes) or depends on (reads).
///
/// Declaring a precise set lets the engine skip re-evaluating observations
/// whose reads cannot have been affected by a commit. The default for both
/// writes and reads is [`TableSet::All`]: over-approximating only costs
/// redundant re-reads, while under-approximating would silently drop
/// change notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableSet {
    /// Conservative default: assume every table.
    All,
    /// An explicit set of table names.
    Named(BTreeSet<String>),
}

impl TableSet {
    /// Build a named set from any collection of table names.
    pub fn named<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(tables.into_iter().map(Into::into).collect())
    }

    /// Whether two sets share at least one table.
    ///
    /// [`TableSet::All`] intersects everything, including an empty named set.
    #[must_use]
    pub fn intersects(&self, other: &TableSet) -> bool {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => true,
            (Self::Named(a), Self::Named(b)) => {
                // Iterate the smaller set.
                let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
                small.iter().any(|table| large.contains(table))
            }
        }
    }

    /// Whether this is an explicit empty set (touches nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::All => false,
            Self::Named(tables) => tables.is_empty(),
        }
    }
}

/// A side-effecting operation against the database.
///
/// The engine runs `apply` inside an `IMMEDIATE` transaction on the single
/// writer connection: the operation either commits in full or rolls back in
/// full, and no two writes ever execute concurrently.
pub trait Write: Send + Sync + 'static {
    /// Apply the operation. Any error rolls back the enclosing transaction
    /// and is surfaced verbatim to this write's caller.
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()>;

    /// The tables this write may modify. Used to decide which observations
    /// to re-evaluate after the commit.
    fn touched_tables(&self) -> TableSet {
        TableSet::All
    }
}

/// A read-only operation returning a typed model.
///
/// The engine runs `apply` on a pooled read-only connection inside a
/// deferred transaction, so the operation sees one consistent snapshot even
/// while writes commit concurrently.
pub trait Read: Send + Sync + 'static {
    /// The result type produced by this read.
    type Model: Send + 'static;

    /// Evaluate the read against the current snapshot.
    fn apply(&self, conn: &Connection) -> rusqlite::Result<Self::Model>;

    /// The tables whose contents this read depends on. An observation of
    /// this read re-evaluates only when a commit touches one of them.
    fn tracked_tables(&self) -> TableSet {
        TableSet::All
    }
}

/// A one-time schema migration step.
///
/// Migrations are registered in a fixed order at engine construction and
/// applied at most once per database file, each inside its own transaction.
/// Identity is the `identifier` string, recorded durably inside the
/// database itself.
pub trait Migration: Send + Sync {
    /// Stable unique identifier for this migration.
    fn identifier(&self) -> &str;

    /// Apply the schema change.
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()>;
}
