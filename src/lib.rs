//! Weir: a reactive persistence engine over embedded SQLite.
//!
//! Weir owns one local SQLite database and runs caller-supplied operations
//! against it:
//!
//! - **Deferred dispatch**: operations submitted before [`Engine::load`]
//!   succeeds are buffered and released in FIFO order the instant the
//!   database becomes ready, so callers can issue work at application
//!   start without their own readiness tracking.
//! - **Writer lane / reader lane**: writes are serialized on a dedicated
//!   writer thread, one transaction at a time; reads run concurrently on a
//!   read-only connection pool, each inside its own WAL snapshot.
//! - **Live observation**: [`Engine::observe`] turns any read into an
//!   infinite stream that re-emits whenever a committed write touches the
//!   tables the read depends on, with clean cancellation on drop.
//!
//! The engine is generic over the operations themselves; see [`ops`] for
//! the [`Write`], [`Read`], and [`Migration`] contracts. Schema, queries,
//! and models are entirely the caller's concern.
//!
//! # Modules
//!
//! - [`config`]: engine tuning parameters
//! - [`engine`]: the caller-facing surface
//! - [`error`]: the error taxonomy
//! - [`observe`]: live observation streams
//! - [`ops`]: operation contracts

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // observe::Observation is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod engine;
pub mod error;
pub mod observe;
pub mod ops;

mod gate;
mod migrate;
mod notify;
mod storage;

pub use config::Config;
pub use engine::Engine;
pub use error::Error;
pub use observe::Observation;
pub use ops::{Migration, Read, TableSet, Write};
