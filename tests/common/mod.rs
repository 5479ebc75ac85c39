//! Test utilities and domain fixtures for weir tests.
//!
//! Provides:
//! - Temporary database directories
//! - A small bookmark/recent schema with typed operations
//! - Polling helpers for asynchronous assertions

#![allow(dead_code)]

use std::path::PathBuf;

use rusqlite::Connection;
use tempfile::TempDir;
use weir::{Migration, Read, TableSet, Write};

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}

/// Test fixture that manages a temporary database directory.
///
/// The directory is automatically cleaned up when the fixture is dropped.
pub struct TestFixture {
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
    /// Path to the database file
    pub db_path: PathBuf,
}

impl TestFixture {
    /// Create a new test fixture with a temporary database directory.
    pub fn new() -> Self {
        init_test_tracing();
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        Self { temp_dir, db_path }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for a condition to become true with timeout.
///
/// Returns `true` if the condition was met, `false` if the timeout expired.
pub async fn wait_for<F>(timeout: std::time::Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    false
}

// --- Migrations ---

pub struct CreateBookmarksTable;

impl Migration for CreateBookmarksTable {
    fn identifier(&self) -> &str {
        "create bookmarks table"
    }

    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE bookmark (
                article_id INTEGER PRIMARY KEY,
                feed TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

pub struct CreateRecentsTable;

impl Migration for CreateRecentsTable {
    fn identifier(&self) -> &str {
        "create recents table"
    }

    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE recent (
                article_id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }
}

pub struct CreateCounterTable;

impl Migration for CreateCounterTable {
    fn identifier(&self) -> &str {
        "create counter table"
    }

    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute("CREATE TABLE counter (n INTEGER NOT NULL)", [])?;
        conn.execute("INSERT INTO counter (n) VALUES (0)", [])?;
        Ok(())
    }
}

/// Seeds one bookmark so tests can distinguish real data from an empty
/// default.
pub struct SeedBookmark;

impl Migration for SeedBookmark {
    fn identifier(&self) -> &str {
        "seed bookmark"
    }

    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO bookmark (article_id, feed, title, url, created_at)
             VALUES (999, 'seed', 'seeded', 'https://example.com/seed', 0)",
            [],
        )?;
        Ok(())
    }
}

pub struct FailingMigration;

impl Migration for FailingMigration {
    fn identifier(&self) -> &str {
        "broken migration"
    }

    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute("THIS IS NOT SQL", [])?;
        Ok(())
    }
}

/// The standard registry used by most tests.
pub fn migrations() -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(CreateBookmarksTable),
        Box::new(CreateRecentsTable),
        Box::new(CreateCounterTable),
    ]
}

// --- Models ---

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    pub article_id: i64,
    pub feed: String,
    pub title: String,
    pub url: String,
    pub created_at: i64,
}

pub fn make_bookmark(article_id: i64, created_at: i64) -> Bookmark {
    Bookmark {
        article_id,
        feed: "main".to_string(),
        title: format!("article {article_id}"),
        url: format!("https://example.com/{article_id}"),
        created_at,
    }
}

// --- Write operations ---

pub struct InsertBookmark(pub Bookmark);

impl Write for InsertBookmark {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO bookmark (article_id, feed, title, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                self.0.article_id,
                self.0.feed,
                self.0.title,
                self.0.url,
                self.0.created_at
            ],
        )?;
        Ok(())
    }

    fn touched_tables(&self) -> TableSet {
        TableSet::named(["bookmark"])
    }
}

pub struct DeleteBookmark(pub i64);

impl Write for DeleteBookmark {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute("DELETE FROM bookmark WHERE article_id = ?1", [self.0])?;
        Ok(())
    }

    fn touched_tables(&self) -> TableSet {
        TableSet::named(["bookmark"])
    }
}

/// Inserts `count` recents in one transaction.
pub struct InsertRecents(pub i64);

impl Write for InsertRecents {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        let base: i64 = conn.query_row(
            "SELECT COALESCE(MAX(article_id), 0) FROM recent",
            [],
            |row| row.get(0),
        )?;
        for i in 1..=self.0 {
            conn.execute(
                "INSERT INTO recent (article_id, title, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![base + i, format!("recent {}", base + i), base + i],
            )?;
        }
        Ok(())
    }

    fn touched_tables(&self) -> TableSet {
        TableSet::named(["recent"])
    }
}

/// Keeps only the `max_count` newest recents, mirroring a history cap.
pub struct TrimRecents(pub i64);

impl Write for TrimRecents {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "DELETE FROM recent WHERE article_id NOT IN (
                SELECT article_id FROM recent ORDER BY created_at DESC LIMIT ?1
            )",
            [self.0],
        )?;
        Ok(())
    }

    fn touched_tables(&self) -> TableSet {
        TableSet::named(["recent"])
    }
}

/// Read-modify-write increment, deliberately split into two statements so
/// interleaved writes would lose updates.
pub struct IncrementCounter;

impl Write for IncrementCounter {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        let n: i64 = conn.query_row("SELECT n FROM counter", [], |row| row.get(0))?;
        conn.execute("UPDATE counter SET n = ?1", [n + 1])?;
        Ok(())
    }

    fn touched_tables(&self) -> TableSet {
        TableSet::named(["counter"])
    }
}

/// A write that makes progress and then fails, to exercise rollback.
pub struct DuplicateBookmark(pub Bookmark);

impl Write for DuplicateBookmark {
    fn apply(&self, conn: &Connection) -> rusqlite::Result<()> {
        InsertBookmark(self.0.clone()).apply(conn)?;
        // Same primary key again: constraint violation
        InsertBookmark(self.0.clone()).apply(conn)?;
        Ok(())
    }

    fn touched_tables(&self) -> TableSet {
        TableSet::named(["bookmark"])
    }
}

// --- Read operations ---

pub struct GetBookmarks;

impl Read for GetBookmarks {
    type Model = Vec<Bookmark>;

    fn apply(&self, conn: &Connection) -> rusqlite::Result<Vec<Bookmark>> {
        let mut stmt = conn.prepare(
            "SELECT article_id, feed, title, url, created_at
             FROM bookmark ORDER BY created_at DESC, article_id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Bookmark {
                article_id: row.get(0)?,
                feed: row.get(1)?,
                title: row.get(2)?,
                url: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    fn tracked_tables(&self) -> TableSet {
        TableSet::named(["bookmark"])
    }
}

pub struct CountBookmarks;

impl Read for CountBookmarks {
    type Model = i64;

    fn apply(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM bookmark", [], |row| row.get(0))
    }

    fn tracked_tables(&self) -> TableSet {
        TableSet::named(["bookmark"])
    }
}

pub struct CountRecents;

impl Read for CountRecents {
    type Model = i64;

    fn apply(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM recent", [], |row| row.get(0))
    }

    fn tracked_tables(&self) -> TableSet {
        TableSet::named(["recent"])
    }
}

pub struct ReadCounter;

impl Read for ReadCounter {
    type Model = i64;

    fn apply(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT n FROM counter", [], |row| row.get(0))
    }

    fn tracked_tables(&self) -> TableSet {
        TableSet::named(["counter"])
    }
}

/// Counts applied migrations via the engine's own bookkeeping table.
pub struct CountAppliedMigrations;

impl Read for CountAppliedMigrations {
    type Model = i64;

    fn apply(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM weir_migrations", [], |row| row.get(0))
    }
}

/// A read that always fails: the table it queries does not exist.
pub struct ReadMissingTable;

impl Read for ReadMissingTable {
    type Model = i64;

    fn apply(&self, conn: &Connection) -> rusqlite::Result<i64> {
        conn.query_row("SELECT COUNT(*) FROM no_such_table", [], |row| row.get(0))
    }
}
