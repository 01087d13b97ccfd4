//! In-memory checkpoint storage for development and testing
//!
//! [`InMemorySaver`] is the reference implementation of the [`Checkpointer`]
//! trait: all state lives in a thread-safe map keyed by
//! `(thread_id, checkpoint_ns)`, with the same latest-by-step, idempotent-put,
//! and write-ordering semantics as the durable backends. Data is lost on
//! restart, which makes it suitable for unit tests, prototypes, and
//! short-lived sessions - and nothing else.
//!
//! ```rust,no_run
//! use hearth_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, Checkpointer, InMemorySaver};
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = InMemorySaver::new();
//!     let config = CheckpointConfig::new().with_thread_id("porch-session".to_string());
//!
//!     let saved = saver
//!         .put(&config, Checkpoint::empty(), CheckpointMetadata::new().with_step(0), HashMap::new())
//!         .await?;
//!
//!     let tuple = saver.get_tuple(&saved).await?;
//!     assert!(tuple.is_some());
//!     Ok(())
//! }
//! ```

use crate::{
    checkpoint::{
        ChannelVersions, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple,
        PendingWrite,
    },
    error::{CheckpointError, Result},
    traits::{CheckpointStream, Checkpointer},
};
use async_trait::async_trait;
use futures::stream;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Storage entry for one in-memory checkpoint
#[derive(Debug, Clone)]
struct CheckpointEntry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    config: CheckpointConfig,
    parent_config: Option<CheckpointConfig>,
    /// Staged writes keyed by (task_id, idx); the BTreeMap ordering is the
    /// deterministic replay order regardless of arrival order.
    writes: BTreeMap<(String, usize), (String, serde_json::Value)>,
}

impl CheckpointEntry {
    fn step(&self) -> i64 {
        self.metadata.step.unwrap_or(-1)
    }

    fn tuple(&self) -> CheckpointTuple {
        CheckpointTuple {
            config: self.config.clone(),
            checkpoint: self.checkpoint.clone(),
            metadata: self.metadata.clone(),
            parent_config: self.parent_config.clone(),
            pending_writes: None,
        }
    }

    fn tuple_with_writes(&self) -> CheckpointTuple {
        let pending: Vec<PendingWrite> = self
            .writes
            .iter()
            .map(|((task_id, _), (channel, value))| {
                (task_id.clone(), channel.clone(), value.clone())
            })
            .collect();
        self.tuple().with_pending_writes(pending)
    }
}

/// Key identifying one independently-checkpointed scope
type ThreadKey = (String, String); // (thread_id, checkpoint_ns)

/// Thread-safe in-memory checkpoint storage
type CheckpointStorage = Arc<RwLock<HashMap<ThreadKey, Vec<CheckpointEntry>>>>;

/// In-memory checkpointer implementation
///
/// Entries per scope are kept in insertion order, which doubles as the
/// deterministic tie-break when two checkpoints share a `step`.
#[derive(Debug, Clone, Default)]
pub struct InMemorySaver {
    storage: CheckpointStorage,
}

impl InMemorySaver {
    /// Create a new in-memory saver
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of distinct threads being tracked
    pub async fn thread_count(&self) -> usize {
        let storage = self.storage.read().await;
        let mut threads: Vec<&str> = storage.keys().map(|(t, _)| t.as_str()).collect();
        threads.sort_unstable();
        threads.dedup();
        threads.len()
    }

    /// Total number of checkpoints across all threads and namespaces
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Clear all checkpoints (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }

    fn thread_key(config: &CheckpointConfig) -> Result<ThreadKey> {
        let thread_id = config
            .thread_id
            .as_ref()
            .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))?;
        Ok((thread_id.clone(), config.ns().to_string()))
    }
}

#[async_trait]
impl Checkpointer for InMemorySaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let key = Self::thread_key(config)?;
        let storage = self.storage.read().await;

        let Some(entries) = storage.get(&key) else {
            return Ok(None);
        };

        if let Some(checkpoint_id) = &config.checkpoint_id {
            return Ok(entries
                .iter()
                .find(|e| &e.checkpoint.id == checkpoint_id)
                .map(CheckpointEntry::tuple_with_writes));
        }

        // Latest means maximum step; entry index breaks ties by insertion order.
        Ok(entries
            .iter()
            .enumerate()
            .max_by_key(|(idx, entry)| (entry.step(), *idx))
            .map(|(_, entry)| entry.tuple_with_writes()))
    }

    async fn list(
        &self,
        config: &CheckpointConfig,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let key = Self::thread_key(config)?;
        let storage = self.storage.read().await;

        let Some(entries) = storage.get(&key) else {
            return Ok(Box::pin(stream::iter(Vec::<Result<CheckpointTuple>>::new())));
        };

        // `before` bounds results to steps strictly below the referenced
        // checkpoint's step; an unresolvable reference bounds out everything.
        let step_bound = match before.and_then(|cfg| cfg.checkpoint_id.as_ref()) {
            Some(before_id) => {
                match entries.iter().find(|e| &e.checkpoint.id == before_id) {
                    Some(entry) => Some(entry.step()),
                    None => {
                        return Ok(Box::pin(stream::iter(
                            Vec::<Result<CheckpointTuple>>::new(),
                        )))
                    }
                }
            }
            None => None,
        };

        let mut ordered: Vec<(usize, &CheckpointEntry)> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| step_bound.map_or(true, |bound| e.step() < bound))
            .collect();
        ordered.sort_by_key(|(idx, entry)| std::cmp::Reverse((entry.step(), *idx)));

        let results: Vec<Result<CheckpointTuple>> = ordered
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, entry)| Ok(entry.tuple()))
            .collect();

        Ok(Box::pin(stream::iter(results)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        _new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig> {
        let key = Self::thread_key(config)?;

        let checkpoint_config = CheckpointConfig {
            thread_id: Some(key.0.clone()),
            checkpoint_id: Some(checkpoint.id.clone()),
            checkpoint_ns: config.checkpoint_ns.clone(),
            extra: HashMap::new(),
        };

        // The incoming config addresses the checkpoint this one descends from.
        let parent_config = config.checkpoint_id.as_ref().map(|parent_id| {
            CheckpointConfig {
                thread_id: Some(key.0.clone()),
                checkpoint_id: Some(parent_id.clone()),
                checkpoint_ns: config.checkpoint_ns.clone(),
                extra: HashMap::new(),
            }
        });

        let mut storage = self.storage.write().await;
        let entries = storage.entry(key).or_default();

        match entries
            .iter()
            .position(|e| e.checkpoint.id == checkpoint.id)
        {
            // Idempotent upsert: same identity replaces the payload in place
            // (keeping insertion order and staged writes), last write wins.
            Some(pos) => {
                let existing = &mut entries[pos];
                existing.checkpoint = checkpoint;
                existing.metadata = metadata;
                existing.config = checkpoint_config.clone();
                existing.parent_config = parent_config;
            }
            None => entries.push(CheckpointEntry {
                checkpoint,
                metadata,
                config: checkpoint_config.clone(),
                parent_config,
                writes: BTreeMap::new(),
            }),
        }

        Ok(checkpoint_config)
    }

    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()> {
        let key = Self::thread_key(config)?;
        let checkpoint_id = config
            .checkpoint_id
            .as_ref()
            .ok_or_else(|| CheckpointError::Invalid("checkpoint_id is required".to_string()))?;

        let mut storage = self.storage.write().await;

        if let Some(entries) = storage.get_mut(&key) {
            if let Some(entry) = entries
                .iter_mut()
                .find(|e| &e.checkpoint.id == checkpoint_id)
            {
                for (idx, (channel, value)) in writes.into_iter().enumerate() {
                    entry.writes.insert((task_id.clone(), idx), (channel, value));
                }
                return Ok(());
            }
        }

        Err(CheckpointError::NotFound(format!(
            "Checkpoint not found: {}",
            checkpoint_id
        )))
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.retain(|(thread, _), _| thread != thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointSource;
    use futures::StreamExt;
    use serde_json::json;

    fn config(thread: &str) -> CheckpointConfig {
        CheckpointConfig::new().with_thread_id(thread.to_string())
    }

    async fn put_step(saver: &InMemorySaver, cfg: &CheckpointConfig, step: i64) -> CheckpointConfig {
        saver
            .put(
                cfg,
                Checkpoint::empty(),
                CheckpointMetadata::new().with_step(step),
                HashMap::new(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_load_checkpoint() {
        let saver = InMemorySaver::new();
        let checkpoint = Checkpoint::empty();
        let metadata = CheckpointMetadata::new().with_source(CheckpointSource::Input);

        let saved = saver
            .put(&config("thread-1"), checkpoint.clone(), metadata, HashMap::new())
            .await
            .unwrap();

        assert!(saved.checkpoint_id.is_some());

        let tuple = saver.get_tuple(&saved).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint.id, checkpoint.id);
        assert_eq!(tuple.pending_writes.as_deref(), Some(&[][..]));
    }

    #[tokio::test]
    async fn test_latest_is_max_step_not_insertion_order() {
        let saver = InMemorySaver::new();
        let cfg = config("thread-1");

        for step in [1, 3, 2] {
            put_step(&saver, &cfg, step).await;
        }

        let tuple = saver.get_tuple(&cfg).await.unwrap().unwrap();
        assert_eq!(tuple.metadata.step, Some(3));
    }

    #[tokio::test]
    async fn test_put_is_idempotent_upsert() {
        let saver = InMemorySaver::new();
        let cfg = config("thread-1");

        let mut checkpoint = Checkpoint::empty();
        checkpoint.channel_values.insert("mode".into(), json!("away"));
        saver
            .put(&cfg, checkpoint.clone(), CheckpointMetadata::new().with_step(1), HashMap::new())
            .await
            .unwrap();

        checkpoint.channel_values.insert("mode".into(), json!("home"));
        let saved = saver
            .put(&cfg, checkpoint.clone(), CheckpointMetadata::new().with_step(1), HashMap::new())
            .await
            .unwrap();

        assert_eq!(saver.checkpoint_count().await, 1);
        let tuple = saver.get_tuple(&saved).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint.channel_values["mode"], json!("home"));
    }

    #[tokio::test]
    async fn test_list_reverse_step_order_with_before_and_limit() {
        let saver = InMemorySaver::new();
        let cfg = config("thread-1");

        let mut by_step = HashMap::new();
        for step in 0..5 {
            by_step.insert(step, put_step(&saver, &cfg, step).await);
        }

        let stream = saver.list(&cfg, None, None).await.unwrap();
        let steps: Vec<i64> = stream
            .map(|t| t.unwrap().metadata.step.unwrap())
            .collect()
            .await;
        assert_eq!(steps, vec![4, 3, 2, 1, 0]);

        let stream = saver
            .list(&cfg, Some(&by_step[&3]), Some(2))
            .await
            .unwrap();
        let steps: Vec<i64> = stream
            .map(|t| t.unwrap().metadata.step.unwrap())
            .collect()
            .await;
        assert_eq!(steps, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_put_writes_replay_order() {
        let saver = InMemorySaver::new();
        let cfg = config("thread-1");
        let saved = put_step(&saver, &cfg, 0).await;

        saver
            .put_writes(
                &saved,
                vec![("x".to_string(), json!(1)), ("y".to_string(), json!(2))],
                "t1".to_string(),
            )
            .await
            .unwrap();
        saver
            .put_writes(&saved, vec![("z".to_string(), json!(3))], "t0".to_string())
            .await
            .unwrap();

        let tuple = saver.get_tuple(&saved).await.unwrap().unwrap();
        let writes = tuple.pending_writes.unwrap();
        assert_eq!(
            writes,
            vec![
                ("t0".to_string(), "z".to_string(), json!(3)),
                ("t1".to_string(), "x".to_string(), json!(1)),
                ("t1".to_string(), "y".to_string(), json!(2)),
            ]
        );
    }

    #[tokio::test]
    async fn test_put_writes_unknown_checkpoint() {
        let saver = InMemorySaver::new();
        let cfg = config("thread-1").with_checkpoint_id("missing".to_string());

        let err = saver
            .put_writes(&cfg, vec![("x".to_string(), json!(1))], "t0".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let saver = InMemorySaver::new();
        let root = config("thread-1");
        let nested = config("thread-1").with_checkpoint_ns("climate".to_string());

        put_step(&saver, &root, 4).await;
        put_step(&saver, &nested, 1).await;

        let tuple = saver.get_tuple(&nested).await.unwrap().unwrap();
        assert_eq!(tuple.metadata.step, Some(1));
        assert_eq!(saver.thread_count().await, 1);
        assert_eq!(saver.checkpoint_count().await, 2);
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let saver = InMemorySaver::new();
        put_step(&saver, &config("thread-1"), 0).await;
        put_step(
            &saver,
            &config("thread-1").with_checkpoint_ns("climate".to_string()),
            0,
        )
        .await;
        put_step(&saver, &config("thread-2"), 0).await;

        saver.delete_thread("thread-1").await.unwrap();

        assert_eq!(saver.thread_count().await, 1);
        assert!(saver.get_tuple(&config("thread-1")).await.unwrap().is_none());
        assert!(saver.get_tuple(&config("thread-2")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_variants_are_unsupported() {
        let saver = InMemorySaver::new();
        let cfg = config("thread-1");

        assert!(matches!(
            saver.get_tuple_sync(&cfg),
            Err(CheckpointError::Unsupported(_))
        ));
        assert!(matches!(
            saver.put_sync(&cfg, Checkpoint::empty(), CheckpointMetadata::new(), HashMap::new()),
            Err(CheckpointError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let saver = InMemorySaver::new();
        put_step(&saver, &config("thread-1"), 0).await;

        assert_eq!(saver.checkpoint_count().await, 1);
        saver.clear().await;
        assert_eq!(saver.checkpoint_count().await, 0);
    }
}
