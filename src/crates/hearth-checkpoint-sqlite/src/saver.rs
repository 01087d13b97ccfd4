//! SQLite-backed checkpointer
//!
//! [`SqliteSaver`] is the durable implementation of the
//! [`Checkpointer`] facade over the shared relational backend: two tables
//! (`checkpoints`, `checkpoint_writes`), upsert-on-conflict at the compound
//! identity key, latest-by-step selection, and bounded per-thread retention
//! applied after every successful `put`.
//!
//! Concurrency safety derives entirely from the backend's atomic upsert at
//! `(thread_id, checkpoint_ns, checkpoint_id)` - no application-level locks.
//! Two writers targeting different checkpoint ids for the same thread proceed
//! independently and both succeed, which is what makes branching possible. A
//! cancelled in-flight operation leaves the store in a safe partial state
//! (each statement is singly atomic, so a row was either written or it
//! wasn't), though retention triggered by a cancelled `put` may not run until
//! the next one.
//!
//! Ordering by the logical `step` counter rather than timestamp keeps
//! "latest" well-defined under clock skew or out-of-order arrival: only the
//! engine's own counter matters.

use crate::connection::{DatabaseConnection, DatabasePool};
use crate::error::SqliteSaverError;
use crate::models::{CheckpointRow, CheckpointWriteRow};
use crate::retention::RetentionPolicy;
use async_trait::async_trait;
use futures::stream;
use hearth_checkpoint::{
    ChannelVersions, Checkpoint, CheckpointConfig, CheckpointError, CheckpointMetadata,
    CheckpointStream, CheckpointTuple, Checkpointer, PendingWrite, Result, TypedSerializer,
};
use std::collections::HashMap;
use tracing::instrument;

/// Durable checkpointer over a shared SQLite backend
///
/// ```rust,no_run
/// use hearth_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, Checkpointer};
/// use hearth_checkpoint_sqlite::SqliteSaver;
/// use std::collections::HashMap;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let saver = SqliteSaver::connect("sqlite:hearth.db").await?;
///
/// let config = CheckpointConfig::new().with_thread_id("morning-routine".to_string());
/// let saved = saver
///     .put(&config, Checkpoint::empty(), CheckpointMetadata::new().with_step(0), HashMap::new())
///     .await?;
///
/// // Recovery after a restart: latest checkpoint plus its staged writes.
/// let tuple = saver.get_tuple(&config).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteSaver {
    pool: DatabasePool,
    serializer: TypedSerializer,
    retention: RetentionPolicy,
}

impl std::fmt::Debug for SqliteSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteSaver")
            .field("retention", &self.retention)
            .finish()
    }
}

impl SqliteSaver {
    /// Create a saver over an existing pool
    ///
    /// The caller owns schema setup (see
    /// [`DatabaseConnection::run_migrations`]).
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            serializer: TypedSerializer::new(),
            retention: RetentionPolicy::default(),
        }
    }

    /// Connect to `database_url`, run the embedded migrations, and return a
    /// ready saver with the default retention policy
    pub async fn connect(database_url: &str) -> Result<Self> {
        let conn = DatabaseConnection::new(database_url)
            .await
            .map_err(SqliteSaverError::from)?;
        conn.run_migrations()
            .await
            .map_err(SqliteSaverError::from)?;

        Ok(Self::new(conn.pool().clone()))
    }

    /// Replace the retention policy
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    /// The underlying pool, shared across all threads and namespaces
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    fn require_thread(config: &CheckpointConfig) -> Result<&str> {
        config
            .thread_id
            .as_deref()
            .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))
    }

    async fn fetch_row(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: Option<&str>,
    ) -> std::result::Result<Option<CheckpointRow>, SqliteSaverError> {
        let row = match checkpoint_id {
            Some(id) => {
                sqlx::query_as::<_, CheckpointRow>(
                    "SELECT * FROM checkpoints
                     WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id = ?3",
                )
                .bind(thread_id)
                .bind(checkpoint_ns)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, CheckpointRow>(
                    "SELECT * FROM checkpoints
                     WHERE thread_id = ?1 AND checkpoint_ns = ?2
                     ORDER BY step DESC, id DESC
                     LIMIT 1",
                )
                .bind(thread_id)
                .bind(checkpoint_ns)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        Ok(row)
    }

    async fn fetch_writes(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> std::result::Result<Vec<PendingWrite>, SqliteSaverError> {
        let rows = sqlx::query_as::<_, CheckpointWriteRow>(
            "SELECT task_id, idx, channel, value_type, value_data
             FROM checkpoint_writes
             WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id = ?3
             ORDER BY task_id ASC, idx ASC",
        )
        .bind(thread_id)
        .bind(checkpoint_ns)
        .bind(checkpoint_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| row.decode(&self.serializer)).collect()
    }

    async fn step_of(
        &self,
        thread_id: &str,
        checkpoint_ns: &str,
        checkpoint_id: &str,
    ) -> std::result::Result<Option<i64>, SqliteSaverError> {
        let step = sqlx::query_scalar::<_, i64>(
            "SELECT step FROM checkpoints
             WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND checkpoint_id = ?3",
        )
        .bind(thread_id)
        .bind(checkpoint_ns)
        .bind(checkpoint_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(step)
    }
}

#[async_trait]
impl Checkpointer for SqliteSaver {
    #[instrument(skip(self, config), err)]
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let thread_id = Self::require_thread(config)?;
        let ns = config.ns();

        let Some(row) = self
            .fetch_row(thread_id, ns, config.checkpoint_id.as_deref())
            .await
            .map_err(CheckpointError::from)?
        else {
            return Ok(None);
        };

        let (checkpoint, metadata) = row.decode().map_err(CheckpointError::from)?;
        let pending_writes = self
            .fetch_writes(thread_id, ns, &row.checkpoint_id)
            .await
            .map_err(CheckpointError::from)?;

        let mut tuple = CheckpointTuple::new(row.config(), checkpoint, metadata)
            .with_pending_writes(pending_writes);
        if let Some(parent_config) = row.parent_config() {
            tuple = tuple.with_parent_config(parent_config);
        }

        Ok(Some(tuple))
    }

    #[instrument(skip(self, config, before), err)]
    async fn list(
        &self,
        config: &CheckpointConfig,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let thread_id = Self::require_thread(config)?;
        let ns = config.ns();
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        // `before` bounds results to steps strictly below the referenced
        // checkpoint's step; an unresolvable reference bounds out everything.
        let step_bound = match before.and_then(|cfg| cfg.checkpoint_id.as_deref()) {
            Some(before_id) => {
                match self
                    .step_of(thread_id, ns, before_id)
                    .await
                    .map_err(CheckpointError::from)?
                {
                    Some(step) => Some(step),
                    None => {
                        return Ok(Box::pin(stream::iter(
                            Vec::<Result<CheckpointTuple>>::new(),
                        )))
                    }
                }
            }
            None => None,
        };

        let rows = match step_bound {
            Some(bound) => {
                sqlx::query_as::<_, CheckpointRow>(
                    "SELECT * FROM checkpoints
                     WHERE thread_id = ?1 AND checkpoint_ns = ?2 AND step < ?3
                     ORDER BY step DESC, id DESC
                     LIMIT ?4",
                )
                .bind(thread_id)
                .bind(ns)
                .bind(bound)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, CheckpointRow>(
                    "SELECT * FROM checkpoints
                     WHERE thread_id = ?1 AND checkpoint_ns = ?2
                     ORDER BY step DESC, id DESC
                     LIMIT ?3",
                )
                .bind(thread_id)
                .bind(ns)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| CheckpointError::from(SqliteSaverError::from(e)))?;

        let results: Vec<Result<CheckpointTuple>> = rows
            .into_iter()
            .map(|row| {
                let (checkpoint, metadata) = row.decode().map_err(CheckpointError::from)?;
                let mut tuple = CheckpointTuple::new(row.config(), checkpoint, metadata);
                if let Some(parent_config) = row.parent_config() {
                    tuple = tuple.with_parent_config(parent_config);
                }
                Ok(tuple)
            })
            .collect();

        Ok(Box::pin(stream::iter(results)))
    }

    #[instrument(skip(self, config, checkpoint, metadata, new_versions), err)]
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig> {
        let thread_id = Self::require_thread(config)?;
        let ns = config.ns();
        let step = metadata.step.unwrap_or(-1);

        let checkpoint_data = serde_json::to_string(&checkpoint)?;
        let metadata_data = serde_json::to_string(&metadata)?;
        let channel_values = serde_json::to_string(&checkpoint.channel_values)?;
        // The engine's freshly bumped versions supersede the snapshot's in
        // the denormalized column; the snapshot itself stays verbatim.
        let mut versions = checkpoint.channel_versions.clone();
        versions.extend(new_versions);
        let channel_versions = serde_json::to_string(&versions)?;

        sqlx::query(
            "INSERT INTO checkpoints (
                 thread_id, checkpoint_ns, checkpoint_id, parent_checkpoint_id,
                 checkpoint_data, metadata_data, channel_versions, channel_values,
                 step, checkpoint_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id) DO UPDATE SET
                 parent_checkpoint_id = excluded.parent_checkpoint_id,
                 checkpoint_data = excluded.checkpoint_data,
                 metadata_data = excluded.metadata_data,
                 channel_versions = excluded.channel_versions,
                 channel_values = excluded.channel_values,
                 step = excluded.step,
                 checkpoint_at = excluded.checkpoint_at",
        )
        .bind(thread_id)
        .bind(ns)
        .bind(&checkpoint.id)
        .bind(config.checkpoint_id.as_deref())
        .bind(&checkpoint_data)
        .bind(&metadata_data)
        .bind(&channel_versions)
        .bind(&channel_values)
        .bind(step)
        .bind(checkpoint.ts.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CheckpointError::from(SqliteSaverError::from(e)))?;

        self.retention
            .enforce(&self.pool, thread_id, ns)
            .await
            .map_err(CheckpointError::from)?;

        Ok(CheckpointConfig {
            thread_id: Some(thread_id.to_string()),
            checkpoint_id: Some(checkpoint.id),
            checkpoint_ns: config.checkpoint_ns.clone(),
            extra: HashMap::new(),
        })
    }

    #[instrument(skip(self, config, writes), err)]
    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
    ) -> Result<()> {
        let thread_id = Self::require_thread(config)?;
        let ns = config.ns();
        let checkpoint_id = config
            .checkpoint_id
            .as_deref()
            .ok_or_else(|| CheckpointError::Invalid("checkpoint_id is required".to_string()))?;

        // Serialize everything first so an unserializable value fails fast
        // before any row is written.
        let mut encoded = Vec::with_capacity(writes.len());
        for (idx, (channel, value)) in writes.iter().enumerate() {
            let (value_type, value_data) = self.serializer.dumps_typed(value)?;
            encoded.push((idx as i64, channel.as_str(), value_type, value_data));
        }

        for (idx, channel, value_type, value_data) in encoded {
            sqlx::query(
                "INSERT INTO checkpoint_writes (
                     thread_id, checkpoint_ns, checkpoint_id, task_id, idx,
                     channel, value_type, value_data
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (thread_id, checkpoint_ns, checkpoint_id, task_id, idx)
                 DO UPDATE SET
                     channel = excluded.channel,
                     value_type = excluded.value_type,
                     value_data = excluded.value_data",
            )
            .bind(thread_id)
            .bind(ns)
            .bind(checkpoint_id)
            .bind(&task_id)
            .bind(idx)
            .bind(channel)
            .bind(&value_type)
            .bind(&value_data)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::from(SqliteSaverError::from(e)))?;
        }

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_thread(&self, thread_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM checkpoints WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::from(SqliteSaverError::from(e)))?;

        sqlx::query("DELETE FROM checkpoint_writes WHERE thread_id = ?1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(|e| CheckpointError::from(SqliteSaverError::from(e)))?;

        Ok(())
    }
}
