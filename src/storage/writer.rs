//! The serialized writer lane.
//!
//! One dedicated OS thread owns the sole write connection. Jobs arrive over
//! an unbounded channel and each runs inside its own `IMMEDIATE`
//! transaction: a write is fully committed or fully rolled back before the
//! next job starts, so no read ever observes a partially-applied write and
//! no two writes ever interleave. After every commit the touched-table set
//! is published on the commit bus.
//!
//! The thread exits when the last job sender is dropped, checkpointing the
//! WAL on the way out.

use std::sync::Arc;
use std::thread;

use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::migrate;
use crate::notify::CommitBus;
use crate::ops::{Migration, Write};
use crate::storage::schema::{self, Location};

/// Completion callback for a write job, invoked exactly once on the writer
/// thread.
pub(crate) type WriteReply = Box<dyn FnOnce(Result<(), Error>) + Send>;

/// A unit of work for the writer thread.
pub(crate) struct WriteJob {
    pub op: Box<dyn Write>,
    pub reply: WriteReply,
}

/// Sending half of the writer lane.
pub(crate) type WriterHandle = mpsc::UnboundedSender<WriteJob>;

/// Spawn the writer thread for `location`.
///
/// The thread opens the connection, applies pragmas, and runs the migration
/// registry before reporting readiness on the returned receiver. On any
/// setup failure the thread exits without processing jobs and the error is
/// delivered through the readiness channel instead.
pub(crate) fn spawn(
    location: Location,
    migrations: Arc<Vec<Box<dyn Migration>>>,
    bus: CommitBus,
) -> (WriterHandle, oneshot::Receiver<Result<(), Error>>) {
    let (tx, rx) = mpsc::unbounded_channel::<WriteJob>();
    let (ready_tx, ready_rx) = oneshot::channel();

    let spawned = thread::Builder::new()
        .name("weir-writer".into())
        .spawn(move || writer_loop(location, migrations, bus, rx, ready_tx));
    if spawned.is_err() {
        // The closure never ran, so ready_tx was dropped with it and the
        // caller observes a closed readiness channel.
        tracing::error!("failed to spawn writer thread");
    }

    (tx, ready_rx)
}

fn writer_loop(
    location: Location,
    migrations: Arc<Vec<Box<dyn Migration>>>,
    bus: CommitBus,
    mut rx: mpsc::UnboundedReceiver<WriteJob>,
    ready_tx: oneshot::Sender<Result<(), Error>>,
) {
    let mut conn = match schema::open_writer(&location) {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(error = %err, "failed to open write connection");
            let _ = ready_tx.send(Err(err));
            return;
        }
    };

    if let Err(err) = migrate::run(&mut conn, &migrations) {
        tracing::error!(error = %err, "migration failed, database not ready");
        let _ = ready_tx.send(Err(err));
        return;
    }

    if ready_tx.send(Ok(())).is_err() {
        // The load was abandoned before completion; nobody will ever hold
        // a sender, so stop instead of parking forever.
        return;
    }
    tracing::debug!("writer thread ready");

    while let Some(job) = rx.blocking_recv() {
        match execute(&mut conn, job.op.as_ref()) {
            Ok(()) => {
                bus.publish(job.op.touched_tables());
                (job.reply)(Ok(()));
            }
            Err(err) => {
                // Surfaced to this write's caller only; the lane moves on
                tracing::debug!(error = %err, "write rolled back");
                (job.reply)(Err(err));
            }
        }
    }

    // wal_checkpoint returns a result row; ignore it (and any error on
    // in-memory stores)
    let _ = conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_row| Ok(()));
    tracing::debug!("writer thread stopped");
}

/// Run one write inside an exclusive transaction. Dropping the transaction
/// on the error path rolls it back.
fn execute(conn: &mut Connection, op: &dyn Write) -> Result<(), Error> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    op.apply(&tx)?;
    tx.commit()?;
    Ok(())
}
