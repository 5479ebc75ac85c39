//! Deferred dispatch gate.
//!
//! Callers may submit operations before the database has been loaded. The
//! gate buffers every such operation in one FIFO queue (reads, writes, and
//! observations share it) and releases the whole queue, in submission
//! order, the instant the database becomes ready. The gate is owned by the
//! engine instance; there is no process-global readiness state, so
//! multiple engines coexist safely.
//!
//! State machine: `Closed -> Loading -> Open`, with `Loading -> Closed` on
//! a failed load. Once `Open`, the gate never closes again.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::error::Error;

/// A queued unit of work: a closure that dispatches the operation onto the
/// execution lanes. Destroyed once dispatched.
pub(crate) type Pending<L> = Box<dyn FnOnce(&L) + Send>;

enum GateState<L> {
    /// No load in progress; operations queue up.
    Closed(VecDeque<Pending<L>>),
    /// A load is in flight; operations still queue up.
    Loading(VecDeque<Pending<L>>),
    /// The database is ready; operations dispatch immediately.
    Open(Arc<L>),
}

/// FIFO buffer in front of the execution lanes, generic over the lane
/// bundle so the state machine can be tested in isolation.
pub(crate) struct Gate<L> {
    state: Mutex<GateState<L>>,
}

impl<L> Gate<L> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Closed(VecDeque::new())),
        }
    }

    /// Claim the right to load. Fails if a load already succeeded or is in
    /// flight; the queue is untouched either way.
    pub fn begin_load(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            GateState::Closed(queue) => {
                let queue = std::mem::take(queue);
                *state = GateState::Loading(queue);
                Ok(())
            }
            GateState::Loading(_) | GateState::Open(_) => Err(Error::AlreadyLoaded),
        }
    }

    /// Roll back a failed load. Queued operations remain queued so a later
    /// `load` can release them.
    pub fn abort_load(&self) {
        let mut state = self.state.lock().unwrap();
        if let GateState::Loading(queue) = &mut *state {
            let queue = std::mem::take(queue);
            *state = GateState::Closed(queue);
        }
    }

    /// Open the gate and drain the queue in FIFO order.
    ///
    /// The queue is drained while the gate lock is held, so every queued
    /// operation is dispatched before any operation submitted after the
    /// flip. Dispatch closures only hand work to the lanes (channel sends,
    /// task spawns) and never block.
    pub fn open(&self, lanes: Arc<L>) {
        let mut state = self.state.lock().unwrap();
        let queued = match &mut *state {
            GateState::Closed(queue) | GateState::Loading(queue) => std::mem::take(queue),
            GateState::Open(_) => return,
        };
        let count = queued.len();
        *state = GateState::Open(Arc::clone(&lanes));
        for job in queued {
            job(&lanes);
        }
        if count > 0 {
            tracing::debug!(released = count, "released queued operations");
        }
    }

    /// Dispatch immediately if open, otherwise queue.
    pub fn submit(&self, job: Pending<L>) {
        let lanes = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                GateState::Closed(queue) | GateState::Loading(queue) => {
                    queue.push_back(job);
                    return;
                }
                GateState::Open(lanes) => Arc::clone(lanes),
            }
        };
        // Dispatch outside the lock
        job(&lanes);
    }

    /// The lane bundle, if the gate is open.
    pub fn lanes(&self) -> Option<Arc<L>> {
        match &*self.state.lock().unwrap() {
            GateState::Open(lanes) => Some(Arc::clone(lanes)),
            _ => None,
        }
    }
}
