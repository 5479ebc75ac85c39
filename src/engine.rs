//! The persistence engine: load, execute, observe.
//!
//! [`Engine`] funnels every operation through the deferred dispatch gate
//! onto two execution lanes: a single writer thread (writes serialized,
//! one transaction at a time) and a read-only connection pool (reads
//! concurrent, each on its own snapshot). Operations submitted before
//! [`Engine::load`] completes are queued and released in FIFO order the
//! moment the database becomes ready.
//!
//! Three call conventions cover the same semantics: a callback form
//! ([`Engine::write_with`] / [`Engine::read_with`]) as the primary path, an
//! async form bridged through a oneshot continuation, and a blocking
//! adapter for synchronous callers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Error;
use crate::gate::Gate;
use crate::notify::CommitBus;
use crate::observe::{self, Observation};
use crate::ops::{Migration, Read, Write};
use crate::storage::reader::ReaderPool;
use crate::storage::schema::Location;
use crate::storage::writer::{self, WriteJob, WriterHandle};

/// Everything a dispatched operation needs, available once the gate opens.
struct Lanes {
    writer: WriterHandle,
    readers: ReaderPool,
    bus: CommitBus,
    rt: tokio::runtime::Handle,
    path: Option<PathBuf>,
}

/// A reactive persistence engine over one embedded SQLite database.
///
/// Cheap to clone; clones share the same database, queue, and
/// subscriptions. Dropping the last clone tears the engine down: the
/// writer thread drains its queue and exits, and every live observation
/// stream terminates.
#[derive(Clone)]
pub struct Engine {
    migrations: Arc<Vec<Box<dyn Migration>>>,
    gate: Arc<Gate<Lanes>>,
    config: Config,
}

impl Engine {
    /// Create an engine with the given migration registry and default
    /// configuration. No database is opened until [`load`](Self::load).
    pub fn new(migrations: Vec<Box<dyn Migration>>) -> Self {
        Self::with_config(migrations, Config::default())
    }

    /// Create an engine with explicit tuning parameters.
    pub fn with_config(migrations: Vec<Box<dyn Migration>>, config: Config) -> Self {
        Self {
            migrations: Arc::new(migrations),
            gate: Arc::new(Gate::new()),
            config,
        }
    }

    /// Open (or create) the database and release every queued operation.
    ///
    /// `path` is a filesystem location, or `None` for a fresh ephemeral
    /// in-memory database. Migrations run in registration order before
    /// anything else touches the database; if one fails, the database
    /// never becomes ready, queued operations stay queued, and a later
    /// `load` may retry.
    ///
    /// Calling `load` on an engine that is already ready (or has a load in
    /// flight) returns [`Error::AlreadyLoaded`] and changes nothing.
    pub async fn load(&self, path: Option<PathBuf>) -> Result<(), Error> {
        self.gate.begin_load()?;
        // Reopen the gate for a retry if this future errors out or is
        // dropped mid-load.
        let mut guard = LoadGuard {
            gate: &self.gate,
            armed: true,
        };

        let location = Location::resolve(path);
        let bus = CommitBus::new(self.config.notify_capacity);
        let (writer_tx, ready_rx) =
            writer::spawn(location.clone(), Arc::clone(&self.migrations), bus.clone());

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            // Writer thread could not start at all
            Err(_) => return Err(Error::EngineClosed),
        }

        // Pool construction opens connections and touches the filesystem
        let pool_size = self.config.reader_pool_size;
        let pool_location = location.clone();
        let readers =
            tokio::task::spawn_blocking(move || ReaderPool::new(&pool_location, pool_size))
                .await
                .map_err(|_| Error::EngineClosed)??;

        let lanes = Lanes {
            writer: writer_tx,
            readers,
            bus,
            rt: tokio::runtime::Handle::current(),
            path: location.file_path().map(ToOwned::to_owned),
        };
        guard.armed = false;
        tracing::info!(path = ?lanes.path, "database loaded");
        self.gate.open(Arc::new(lanes));
        Ok(())
    }

    /// The database file path, once loaded. `None` before a successful
    /// [`load`](Self::load) and for in-memory databases.
    pub fn path(&self) -> Option<PathBuf> {
        self.gate.lanes().and_then(|lanes| lanes.path.clone())
    }

    // --- Callback convention ---

    /// Execute a write, delivering the outcome to `completion`.
    ///
    /// The completion is invoked exactly once, on the writer thread, and
    /// never synchronously on the caller's stack.
    pub fn write_with<W, F>(&self, write: W, completion: F)
    where
        W: Write,
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        let op: Box<dyn Write> = Box::new(write);
        let reply: Box<dyn FnOnce(Result<(), Error>) + Send> = Box::new(completion);
        self.gate.submit(Box::new(move |lanes: &Lanes| {
            if let Err(send_err) = lanes.writer.send(WriteJob { op, reply }) {
                (send_err.0.reply)(Err(Error::EngineClosed));
            }
        }));
    }

    /// Execute a read, delivering the model (or error) to `completion`.
    ///
    /// The completion is invoked exactly once, on a reader task, and never
    /// synchronously on the caller's stack.
    pub fn read_with<R, F>(&self, read: R, completion: F)
    where
        R: Read,
        F: FnOnce(Result<R::Model, Error>) + Send + 'static,
    {
        self.gate.submit(Box::new(move |lanes: &Lanes| {
            let pool = lanes.readers.clone();
            lanes.rt.spawn_blocking(move || completion(pool.execute(&read)));
        }));
    }

    // --- Async convention ---

    /// Execute a write, resolving when it has fully committed (or rolled
    /// back with an error). Suspends without blocking the thread; if the
    /// database is not loaded yet, the write waits in the dispatch queue.
    pub async fn write<W: Write>(&self, write: W) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.write_with(write, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(Error::EngineClosed))
    }

    /// Execute a read, resolving to its model. Suspends without blocking
    /// the thread; waits in the dispatch queue until the database loads.
    pub async fn read<R: Read>(&self, read: R) -> Result<R::Model, Error> {
        let (tx, rx) = oneshot::channel();
        self.read_with(read, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(Error::EngineClosed))
    }

    // --- Blocking adapters ---

    /// Execute a write, blocking the calling thread until it completes.
    /// If the database is not ready yet, this blocks until a
    /// [`load`](Self::load) succeeds and the queue drains to this write.
    ///
    /// Never call this from the execution context responsible for calling
    /// `load`, or from inside the async runtime: it will deadlock. This is
    /// a caller obligation the engine cannot enforce.
    pub fn write_sync<W: Write>(&self, write: W) -> Result<(), Error> {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.write_with(write, move |result| {
            let _ = tx.send(result);
        });
        rx.recv().unwrap_or(Err(Error::EngineClosed))
    }

    /// Execute a read, blocking the calling thread until it completes.
    /// Same deadlock obligation as [`write_sync`](Self::write_sync).
    pub fn read_sync<R: Read>(&self, read: R) -> Result<R::Model, Error> {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        self.read_with(read, move |result| {
            let _ = tx.send(result);
        });
        rx.recv().unwrap_or(Err(Error::EngineClosed))
    }

    // --- Observation ---

    /// Observe a read: an infinite stream that emits the current result
    /// immediately, then a fresh result after every committed write that
    /// touches the tables the read tracks.
    ///
    /// Dropping the returned [`Observation`] (or calling its `cancel`)
    /// stops re-evaluation and guarantees no further emission, even when
    /// racing a commit. If the read itself fails, the stream yields that
    /// one error and terminates.
    pub fn observe<R: Read>(&self, read: R) -> Observation<R::Model> {
        let op = Arc::new(read);
        let (sink, rx) = mpsc::channel(self.config.observation_buffer);
        let token = CancellationToken::new();
        let task_token = token.clone();

        self.gate.submit(Box::new(move |lanes: &Lanes| {
            // Subscribe before the initial snapshot so no commit is lost
            let commits = lanes.bus.subscribe();
            let pool = lanes.readers.clone();
            lanes
                .rt
                .spawn(observe::subscription_loop(pool, commits, op, sink, task_token));
        }));

        Observation::new(rx, token)
    }
}

/// Reverts the gate to its closed state unless the load completed.
struct LoadGuard<'a> {
    gate: &'a Gate<Lanes>,
    armed: bool,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.abort_load();
        }
    }
}
