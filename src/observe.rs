//! Live observation of read results.
//!
//! `observe` turns a read into an infinite stream: the current result is
//! emitted immediately on subscription, then the read is re-evaluated and
//! re-emitted after every committed write whose touched tables intersect
//! the tables the read tracks. A lagged notification receiver is treated
//! as "anything might have changed": re-emitting unnecessarily is
//! acceptable, missing a real change is not.
//!
//! Each subscription is one task that runs its reads sequentially, so
//! successive emissions always reflect a non-decreasing sequence of
//! commits. Dropping the [`Observation`] cancels the task before any
//! further emission, even when racing a just-committed write.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::error::Error;
use crate::notify::Commit;
use crate::ops::Read;
use crate::storage::reader::ReaderPool;

/// A live, cancellable stream of read results.
///
/// Infinite and not restartable: the stream ends only on cancellation
/// (dropping it or calling [`cancel`](Observation::cancel)), on engine
/// teardown, or after yielding a single read error.
pub struct Observation<M> {
    stream: ReceiverStream<Result<M, Error>>,
    _cancel: DropGuard,
}

impl<M> Observation<M> {
    pub(crate) fn new(
        rx: mpsc::Receiver<Result<M, Error>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            stream: ReceiverStream::new(rx),
            _cancel: token.drop_guard(),
        }
    }

    /// Cancel the observation. Equivalent to dropping it; provided for
    /// call sites where the intent should be explicit. Idempotent in the
    /// sense that cancelling an already-finished observation is a no-op.
    pub fn cancel(self) {
        drop(self);
    }
}

impl<M> Stream for Observation<M> {
    type Item = Result<M, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }
}

/// Drive one subscription: initial snapshot, then re-read on relevant
/// commits. Runs until cancellation, engine teardown, sink closure, or a
/// read error.
pub(crate) async fn subscription_loop<R: Read>(
    pool: ReaderPool,
    mut commits: broadcast::Receiver<Commit>,
    op: Arc<R>,
    sink: mpsc::Sender<Result<R::Model, Error>>,
    cancel: CancellationToken,
) {
    let tracked = op.tracked_tables();
    tracing::debug!(tables = ?tracked, "observation started");

    // Initial emission: the commit receiver already exists, so any write
    // that lands while this first read runs is re-delivered afterwards.
    if !emit(&pool, &op, &sink, &cancel).await {
        return;
    }

    loop {
        let commit = tokio::select! {
            () = cancel.cancelled() => break,
            commit = commits.recv() => commit,
        };

        let relevant = match commit {
            Ok(commit) => commit.tables.intersects(&tracked),
            // Fell behind the bus: assume anything changed
            Err(RecvError::Lagged(_)) => true,
            // Engine torn down
            Err(RecvError::Closed) => break,
        };
        if !relevant {
            continue;
        }

        if !emit(&pool, &op, &sink, &cancel).await {
            break;
        }
    }
    tracing::debug!("observation ended");
}

/// Evaluate the read once and deliver the result. Returns false when the
/// subscription should end: cancellation, a closed sink, or a read error
/// (which is delivered first, then terminates the stream).
async fn emit<R: Read>(
    pool: &ReaderPool,
    op: &Arc<R>,
    sink: &mpsc::Sender<Result<R::Model, Error>>,
    cancel: &CancellationToken,
) -> bool {
    let pool = pool.clone();
    let op = Arc::clone(op);
    let result = tokio::select! {
        () = cancel.cancelled() => return false,
        joined = tokio::task::spawn_blocking(move || pool.execute(op.as_ref())) => match joined {
            Ok(result) => result,
            // The blocking read was aborted at runtime shutdown
            Err(_) => return false,
        },
    };
    let failed = result.is_err();

    tokio::select! {
        () = cancel.cancelled() => false,
        sent = sink.send(result) => sent.is_ok() && !failed,
    }
}
