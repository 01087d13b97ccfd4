//! Bounded per-thread checkpoint retention
//!
//! After each successful `put`, the store keeps only the N highest-step
//! checkpoints for the affected `(thread, namespace)` and deletes the rest
//! together with their staged writes. Cleanup runs synchronously but is not
//! transactionally bound to the triggering `put`: if the process dies between
//! the two, extra checkpoints persist until the next successful `put`
//! re-triggers cleanup. That is safe - no data loss, storage bounded but
//! occasionally exceeded - and never corrupting.

use crate::connection::DatabasePool;
use crate::error::SqliteSaverError;
use tracing::{debug, instrument};

/// Policy bounding how many historical checkpoints are kept per thread and
/// namespace
///
/// Retention is not branch-aware: it can delete an ancestor checkpoint that
/// is still the parent of a more recent checkpoint on another branch of the
/// tree, severing that branch's lineage pointer. Readers tolerate the
/// dangling pointer (resolving it yields no checkpoint).
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Checkpoints kept per `(thread, namespace)`; the highest-step rows win
    pub max_checkpoints_per_thread: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_checkpoints_per_thread: 100,
        }
    }
}

impl RetentionPolicy {
    /// Create a policy keeping at most `max_checkpoints_per_thread` rows
    pub fn new(max_checkpoints_per_thread: usize) -> Self {
        Self {
            max_checkpoints_per_thread,
        }
    }

    /// Apply the policy to one `(thread, namespace)` scope
    ///
    /// Deletes every checkpoint outside the N highest steps (ties broken by
    /// insertion order), then cascades to staged writes whose checkpoint no
    /// longer exists in the scope. Returns the number of checkpoints removed.
    #[instrument(skip(self, pool), err)]
    pub async fn enforce(
        &self,
        pool: &DatabasePool,
        thread_id: &str,
        checkpoint_ns: &str,
    ) -> Result<u64, SqliteSaverError> {
        let removed = sqlx::query(
            r#"
            DELETE FROM checkpoints
            WHERE thread_id = ?1 AND checkpoint_ns = ?2
              AND checkpoint_id NOT IN (
                  SELECT checkpoint_id FROM checkpoints
                  WHERE thread_id = ?1 AND checkpoint_ns = ?2
                  ORDER BY step DESC, id DESC
                  LIMIT ?3
              )
            "#,
        )
        .bind(thread_id)
        .bind(checkpoint_ns)
        .bind(self.max_checkpoints_per_thread as i64)
        .execute(pool)
        .await?
        .rows_affected();

        if removed > 0 {
            // Orphaned staged writes go with their checkpoints.
            sqlx::query(
                r#"
                DELETE FROM checkpoint_writes
                WHERE thread_id = ?1 AND checkpoint_ns = ?2
                  AND checkpoint_id NOT IN (
                      SELECT checkpoint_id FROM checkpoints
                      WHERE thread_id = ?1 AND checkpoint_ns = ?2
                  )
                "#,
            )
            .bind(thread_id)
            .bind(checkpoint_ns)
            .execute(pool)
            .await?;

            debug!(thread_id, checkpoint_ns, removed, "retention removed checkpoints");
        }

        Ok(removed)
    }
}
