//! # hearth-checkpoint - State Persistence for Agent Workflows
//!
//! **Trait-based checkpoint abstractions** for persisting and restoring the
//! stepwise workflow state of the hearth home-automation assistant. A run is a
//! graph of agent "turns" executed in supersteps; after each superstep the
//! engine snapshots the merged channel state as a [`Checkpoint`], and mid-step
//! it stages each finished task's output as pending writes so a crash cannot
//! lose completed-but-unmerged work.
//!
//! Checkpoints enable:
//!
//! - **Fault recovery** - resume a run from its latest step after a restart
//! - **History inspection** - walk any thread's state evolution step by step
//! - **Branching** - fork alternate timelines from any prior checkpoint
//! - **Human-in-the-loop** - pause on a step, inspect, modify, resume
//!
//! ## Core Concepts
//!
//! ### The Checkpointer trait
//!
//! [`Checkpointer`] is the facade storage backends implement. Four primary
//! operations: `put` (save a superstep's merged state), `put_writes` (stage
//! one task's mid-step output), `get_tuple` (load a checkpoint with parent
//! pointer and staged writes), `list` (page backward through history). All
//! operations are async-only; the `*_sync` variants fail immediately with
//! [`CheckpointError::Unsupported`].
//!
//! ### Identity and ordering
//!
//! A checkpoint is addressed by `(thread_id, checkpoint_ns, checkpoint_id)`.
//! `parent_checkpoint_id` links checkpoints into a tree - one parent, any
//! number of children. "Latest" always means the maximum metadata `step` for
//! the scope, never the newest wall-clock timestamp, so retried or delayed
//! writes under clock skew cannot corrupt latest-selection.
//!
//! ### Serialization boundary
//!
//! Channel values are opaque to the store and cross a type-tagged codec
//! ([`TypedSerializer`]): every persisted value carries the tag of the codec
//! that produced it, unknown tags fail fast, and rich in-memory types degrade
//! to their structural projection (a documented lossy boundary).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hearth_checkpoint::{
//!     Checkpoint, CheckpointConfig, CheckpointMetadata, Checkpointer, InMemorySaver,
//! };
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = InMemorySaver::new();
//!
//!     let config = CheckpointConfig::new().with_thread_id("evening-routine".to_string());
//!     let checkpoint = Checkpoint::empty();
//!     let metadata = CheckpointMetadata::new().with_step(0);
//!
//!     let saved = saver.put(&config, checkpoint, metadata, HashMap::new()).await?;
//!     println!("saved checkpoint {:?}", saved.checkpoint_id);
//!
//!     if let Some(tuple) = saver.get_tuple(&saved).await? {
//!         println!("step {:?}", tuple.metadata.step);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`checkpoint`] - [`Checkpoint`], [`CheckpointConfig`],
//!   [`CheckpointMetadata`], [`CheckpointTuple`]
//! - [`traits`] - [`Checkpointer`] trait and [`CheckpointStream`]
//! - [`serializer`] - [`SerializerProtocol`] and the type-tagged codec
//! - [`memory`] - [`InMemorySaver`] reference implementation
//! - [`error`] - [`CheckpointError`] taxonomy
//!
//! For durable storage see the `hearth-checkpoint-sqlite` crate, which
//! implements [`Checkpointer`] over a shared relational backend with bounded
//! per-thread retention.

pub mod checkpoint;
pub mod error;
pub mod memory;
pub mod serializer;
pub mod traits;

// Re-export main types
pub use checkpoint::{
    ChannelVersion, ChannelVersions, Checkpoint, CheckpointConfig, CheckpointId,
    CheckpointMetadata, CheckpointSource, CheckpointTuple, PendingWrite,
};
pub use error::{CheckpointError, Result};
pub use memory::InMemorySaver;
pub use serializer::{
    BincodeSerializer, JsonSerializer, SerializerProtocol, TypedSerializer, TYPE_TAG_JSON,
};
pub use traits::{CheckpointStream, Checkpointer};
