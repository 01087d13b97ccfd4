//! Core checkpoint data structures for durable workflow state
//!
//! This module defines the fundamental data types of the checkpoint system:
//! **[`Checkpoint`]**, **[`CheckpointConfig`]**, **[`CheckpointMetadata`]**, and
//! **[`CheckpointTuple`]**. A checkpoint is one immutable snapshot of assistant
//! workflow state at a step boundary; a run's history is an append-only tree of
//! such snapshots, keyed by `(thread_id, checkpoint_ns, checkpoint_id)`.
//!
//! # Overview
//!
//! - **State snapshots** - complete point-in-time captures of all channel values
//! - **Version tracking** - per-channel version counters for change detection
//! - **Branching** - `parent_checkpoint_id` forms a tree; forking from any
//!   prior step is a first-class capability, not an error state
//! - **Logical ordering** - the metadata `step` counter, never wall-clock time,
//!   decides which checkpoint is "latest"
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use hearth_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource};
//! use std::collections::HashMap;
//! use serde_json::json;
//!
//! let mut channel_values = HashMap::new();
//! channel_values.insert("presence".to_string(), json!({"living_room": true}));
//! channel_values.insert("messages".to_string(), json!(["lights on in the den"]));
//!
//! let checkpoint = Checkpoint::new(
//!     "ckpt-001".to_string(),
//!     channel_values,
//!     HashMap::new(),
//!     HashMap::new(),
//! );
//!
//! let metadata = CheckpointMetadata::new()
//!     .with_source(CheckpointSource::Loop)
//!     .with_step(3);
//!
//! let config = CheckpointConfig::new().with_thread_id("kitchen-session".to_string());
//! ```
//!
//! # Ordering
//!
//! For a fixed `(thread_id, checkpoint_ns)`, "latest" means the checkpoint with
//! the maximum metadata `step`. `created_at` is informational only: retried or
//! delayed writes may arrive with skewed clocks, and only the engine's own
//! counter is trusted. Ties on `step` are broken by insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// Pending write tuple: (task_id, channel, value)
///
/// One not-yet-checkpointed channel write produced by one task within one
/// step. Staged so a crash mid-step cannot lose completed task output.
pub type PendingWrite = (String, String, serde_json::Value);

/// Channel version type - can be int, float, or string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelVersion {
    Int(i64),
    Float(f64),
    String(String),
}

impl ChannelVersion {
    /// Get the next version (increments integers by 1)
    pub fn next(&self) -> Self {
        match self {
            ChannelVersion::Int(v) => ChannelVersion::Int(v + 1),
            ChannelVersion::Float(v) => ChannelVersion::Float(v + 1.0),
            ChannelVersion::String(_) => {
                panic!("String versions must be explicitly managed")
            }
        }
    }
}

/// Mapping from channel name to version
pub type ChannelVersions = HashMap<String, ChannelVersion>;

/// Metadata source type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Checkpoint created from an input to invoke/stream
    Input,
    /// Checkpoint created from inside the step loop
    Loop,
    /// Checkpoint created from a manual state update
    Update,
    /// Checkpoint created as a copy of another checkpoint
    Fork,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// The step number of the checkpoint.
    /// -1 for the first "input" checkpoint, 0 for the first "loop"
    /// checkpoint, n for the nth checkpoint afterwards. Per-branch counter,
    /// not globally unique; the primary ordering key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// The channel writes recorded for this step, keyed by node name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writes: Option<HashMap<String, serde_json::Value>>,

    /// The IDs of the parent checkpoints, keyed by checkpoint namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<HashMap<String, String>>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    /// Create a new checkpoint metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the step number
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Set the writes recorded for this step
    pub fn with_writes(mut self, writes: HashMap<String, serde_json::Value>) -> Self {
        self.writes = Some(writes);
        self
    }

    /// Set parent checkpoints
    pub fn with_parents(mut self, parents: HashMap<String, String>) -> Self {
        self.parents = Some(parents);
        self
    }

    /// Add custom metadata
    pub fn with_extra(mut self, key: String, value: serde_json::Value) -> Self {
        self.extra.insert(key, value);
        self
    }
}

/// State snapshot at a given point in time
///
/// Created once and never mutated: superseding state is a *new* checkpoint
/// referencing this one as parent, never an in-place update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// The version of the checkpoint format (currently 1)
    pub v: i32,

    /// The ID of the checkpoint, unique within its thread and namespace
    pub id: CheckpointId,

    /// The timestamp of the checkpoint. Informational only; never used for
    /// "latest" selection.
    pub ts: DateTime<Utc>,

    /// The values of the channels at the time of the checkpoint.
    /// Opaque to the store; the engine interprets them.
    pub channel_values: HashMap<String, serde_json::Value>,

    /// The versions of the channels at the time of the checkpoint.
    /// Persisted but not interpreted; the engine uses them for conflict
    /// detection.
    pub channel_versions: ChannelVersions,

    /// Map from node ID to map from channel name to version seen.
    /// Tracks which channel versions each node has already processed.
    pub versions_seen: HashMap<String, ChannelVersions>,

    /// Task dispatches produced during the step but not yet delivered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_sends: Vec<serde_json::Value>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a new checkpoint
    pub fn new(
        id: CheckpointId,
        channel_values: HashMap<String, serde_json::Value>,
        channel_versions: ChannelVersions,
        versions_seen: HashMap<String, ChannelVersions>,
    ) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id,
            ts: Utc::now(),
            channel_values,
            channel_versions,
            versions_seen,
            pending_sends: Vec::new(),
        }
    }

    /// Create an empty checkpoint with a generated ID
    pub fn empty() -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            channel_values: HashMap::new(),
            channel_versions: HashMap::new(),
            versions_seen: HashMap::new(),
            pending_sends: Vec::new(),
        }
    }

    /// Set the pending task dispatches
    pub fn with_pending_sends(mut self, pending_sends: Vec<serde_json::Value>) -> Self {
        self.pending_sends = pending_sends;
        self
    }
}

/// Configuration for checkpoint operations
///
/// Carries the compound identity `(thread_id, checkpoint_ns, checkpoint_id)`.
/// Reads with no `checkpoint_id` resolve to the latest checkpoint for the
/// thread and namespace.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointConfig {
    /// Thread ID identifying one independently-checkpointed workflow run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Specific checkpoint ID to address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,

    /// Checkpoint namespace, a sub-scope within the thread (e.g. for nested
    /// sub-workflows). Absent means the root namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_ns: Option<String>,

    /// Additional configuration
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointConfig {
    /// Create a new checkpoint configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread ID
    pub fn with_thread_id(mut self, thread_id: String) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    /// Set the checkpoint ID
    pub fn with_checkpoint_id(mut self, checkpoint_id: CheckpointId) -> Self {
        self.checkpoint_id = Some(checkpoint_id);
        self
    }

    /// Set the checkpoint namespace
    pub fn with_checkpoint_ns(mut self, checkpoint_ns: String) -> Self {
        self.checkpoint_ns = Some(checkpoint_ns);
        self
    }

    /// The effective namespace: the configured one, or the root namespace
    pub fn ns(&self) -> &str {
        self.checkpoint_ns.as_deref().unwrap_or("")
    }
}

/// A tuple containing a checkpoint and its associated data
#[derive(Debug, Clone)]
pub struct CheckpointTuple {
    /// Configuration addressing this checkpoint
    pub config: CheckpointConfig,

    /// The checkpoint itself
    pub checkpoint: Checkpoint,

    /// Metadata associated with the checkpoint
    pub metadata: CheckpointMetadata,

    /// Parent configuration, navigable reference to the previous checkpoint
    /// on this branch (if any)
    pub parent_config: Option<CheckpointConfig>,

    /// Pending writes staged against this checkpoint, ordered by
    /// (task_id, idx)
    pub pending_writes: Option<Vec<PendingWrite>>,
}

impl CheckpointTuple {
    /// Create a new checkpoint tuple
    pub fn new(
        config: CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
            parent_config: None,
            pending_writes: None,
        }
    }

    /// Set the parent configuration
    pub fn with_parent_config(mut self, parent_config: CheckpointConfig) -> Self {
        self.parent_config = Some(parent_config);
        self
    }

    /// Set the pending writes
    pub fn with_pending_writes(mut self, pending_writes: Vec<PendingWrite>) -> Self {
        self.pending_writes = Some(pending_writes);
        self
    }
}
