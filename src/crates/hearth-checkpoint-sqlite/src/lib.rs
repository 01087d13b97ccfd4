//! # hearth-checkpoint-sqlite - Durable Checkpoint Store
//!
//! SQLite-backed implementation of the `hearth-checkpoint` facade: the store
//! that lets the assistant's stepwise workflows survive process restarts, be
//! inspected historically, and be resumed or forked from any prior step.
//!
//! ## What lives here
//!
//! - [`SqliteSaver`] - the `Checkpointer` implementation: atomic upserts at
//!   the `(thread_id, checkpoint_ns, checkpoint_id)` key, latest-by-step
//!   reads, reverse-step history listing, and positional staging of per-task
//!   pending writes
//! - [`RetentionPolicy`] - bounds the checkpoints kept per thread and
//!   namespace (default 100), cascading to staged writes
//! - [`DatabaseConnection`] - pool management, embedded migrations, health
//!   checks
//!
//! ## Recovery after a crash
//!
//! ```rust,no_run
//! use hearth_checkpoint::{CheckpointConfig, Checkpointer};
//! use hearth_checkpoint_sqlite::SqliteSaver;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let saver = SqliteSaver::connect("sqlite:hearth.db").await?;
//!
//! // Latest checkpoint plus the writes of tasks that finished mid-step:
//! // everything the engine needs to reconstruct in-flight work.
//! let config = CheckpointConfig::new().with_thread_id("evening-routine".to_string());
//! if let Some(tuple) = saver.get_tuple(&config).await? {
//!     let step = tuple.metadata.step;
//!     let staged = tuple.pending_writes.unwrap_or_default();
//!     println!("resuming step {:?} with {} staged writes", step, staged.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod models;
pub mod retention;
pub mod saver;

pub use connection::{DatabaseConnection, DatabasePool};
pub use error::SqliteSaverError;
pub use retention::RetentionPolicy;
pub use saver::SqliteSaver;
