//! The checkpointer facade trait implemented by storage backends
//!
//! [`Checkpointer`] is the contract between the workflow engine and a
//! checkpoint store. It exposes exactly four primary operations - `get_tuple`,
//! `list`, `put`, `put_writes` - plus thread deletion for run cleanup. The
//! engine calls `put` once per superstep with the merged state, `put_writes`
//! as individual tasks complete mid-step, and `get_tuple`/`list` to resume or
//! inspect a run.
//!
//! All operations exist only in asynchronous form. The `*_sync` variants on
//! the trait fail immediately with [`CheckpointError::Unsupported`] rather
//! than silently blocking; callers must use the async path.
//!
//! Implementations perform no transaction management of their own: every
//! operation participates in the caller's ambient unit of work, so checkpoint
//! writes stay consistent with whatever else the engine mutates in the same
//! logical step.
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use hearth_checkpoint::{
//!     Checkpointer, Checkpoint, CheckpointConfig, CheckpointMetadata,
//!     CheckpointStream, CheckpointTuple, ChannelVersions,
//! };
//! use async_trait::async_trait;
//!
//! struct RedisCheckpointer { /* client */ }
//!
//! #[async_trait]
//! impl Checkpointer for RedisCheckpointer {
//!     async fn get_tuple(
//!         &self,
//!         config: &CheckpointConfig,
//!     ) -> hearth_checkpoint::Result<Option<CheckpointTuple>> {
//!         // look up by (thread, ns, id), or latest by step when id absent
//!         todo!()
//!     }
//!     // ... list / put / put_writes ...
//! }
//! ```

use crate::{
    checkpoint::{
        ChannelVersions, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple,
    },
    error::{CheckpointError, Result},
};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Type alias for async stream of checkpoint tuples
///
/// Lazy, finite, and restartable: each `list` call produces an independent
/// stream; no cursor state is held by the store between calls.
pub type CheckpointStream = Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

/// Core trait for checkpoint storage backends
///
/// Implementations must be `Send + Sync` and safe under concurrent calls;
/// isolation between runs derives entirely from the compound
/// `(thread_id, checkpoint_ns, checkpoint_id)` key, not from locks.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Fetch just the checkpoint for the given configuration
    ///
    /// Convenience over [`get_tuple`](Self::get_tuple) for callers that do
    /// not need metadata, parent navigation, or pending writes.
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        if let Some(tuple) = self.get_tuple(config).await? {
            Ok(Some(tuple.checkpoint))
        } else {
            Ok(None)
        }
    }

    /// Retrieve a complete checkpoint tuple
    ///
    /// With a `checkpoint_id`, returns that exact checkpoint. Without one,
    /// returns the checkpoint with the maximum metadata `step` for the
    /// `(thread, namespace)` - never the newest wall-clock timestamp. The
    /// returned tuple carries a navigable `parent_config` and the pending
    /// writes staged against the checkpoint.
    ///
    /// Returns `Ok(None)` when nothing matches; absence is recoverable and
    /// kept out of the error channel.
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// Stream checkpoints for a thread and namespace in reverse `step` order
    ///
    /// `before` restricts the result to checkpoints whose `step` is strictly
    /// less than the referenced checkpoint's step, for paging backward
    /// through history. `limit` caps the number of results. Listed tuples do
    /// not include pending writes.
    async fn list(
        &self,
        config: &CheckpointConfig,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Store a checkpoint, returning the configuration that addresses it
    ///
    /// Atomic upsert keyed by `(thread_id, checkpoint_ns, checkpoint_id)`:
    /// retrying a `put` with the same id never creates a duplicate and the
    /// last write wins. `new_versions` carries the channel versions the
    /// engine bumped in this step; the store persists them without
    /// interpretation.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig>;

    /// Stage intermediate writes produced by one task within one step
    ///
    /// Each `(channel, value)` pair is persisted at its positional index;
    /// resubmitting the same task's writes (e.g. after a task retry)
    /// overwrites in place rather than duplicating. Values cross the
    /// type-tagged serialization boundary and unserializable values fail
    /// fast before anything is stored.
    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()>;

    /// Delete all checkpoints and staged writes for a thread
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let _ = thread_id;
        Ok(())
    }

    /// Synchronous variant of [`get_tuple`](Self::get_tuple). Unsupported.
    fn get_tuple_sync(&self, _config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        Err(CheckpointError::Unsupported(
            "synchronous get_tuple is not supported; use the async variant",
        ))
    }

    /// Synchronous variant of [`list`](Self::list). Unsupported.
    fn list_sync(
        &self,
        _config: &CheckpointConfig,
        _before: Option<&CheckpointConfig>,
        _limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple>> {
        Err(CheckpointError::Unsupported(
            "synchronous list is not supported; use the async variant",
        ))
    }

    /// Synchronous variant of [`put`](Self::put). Unsupported.
    fn put_sync(
        &self,
        _config: &CheckpointConfig,
        _checkpoint: Checkpoint,
        _metadata: CheckpointMetadata,
        _new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig> {
        Err(CheckpointError::Unsupported(
            "synchronous put is not supported; use the async variant",
        ))
    }

    /// Synchronous variant of [`put_writes`](Self::put_writes). Unsupported.
    fn put_writes_sync(
        &self,
        _config: &CheckpointConfig,
        _writes: Vec<(String, serde_json::Value)>,
        _task_id: String,
    ) -> Result<()> {
        Err(CheckpointError::Unsupported(
            "synchronous put_writes is not supported; use the async variant",
        ))
    }
}
