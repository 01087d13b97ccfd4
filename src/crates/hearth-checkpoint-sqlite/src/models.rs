//! Row models for the checkpoint tables

use crate::error::SqliteSaverError;
use hearth_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, PendingWrite, TypedSerializer,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// One persisted checkpoint row
///
/// `checkpoint_data` and `metadata_data` are the authoritative serialized
/// forms; `channel_values` and `channel_versions` are denormalized copies
/// kept for inspection tooling and never read back on the hot path.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckpointRow {
    /// Surrogate rowid; insertion order, the tie-break for equal steps
    pub id: i64,

    /// Owning workflow run
    pub thread_id: String,

    /// Sub-scope within the thread; empty string is the root namespace
    pub checkpoint_ns: String,

    /// Checkpoint identifier, unique within (thread_id, checkpoint_ns)
    pub checkpoint_id: String,

    /// Parent checkpoint in the same scope, if any
    pub parent_checkpoint_id: Option<String>,

    /// Serialized checkpoint (JSON)
    pub checkpoint_data: String,

    /// Serialized metadata (JSON)
    pub metadata_data: String,

    /// Denormalized channel versions (JSON)
    pub channel_versions: String,

    /// Denormalized channel values (JSON)
    pub channel_values: String,

    /// Logical step counter; the ordering key for "latest"
    pub step: i64,

    /// Creation timestamp (RFC 3339), informational only
    pub checkpoint_at: String,
}

impl CheckpointRow {
    /// Decode the authoritative checkpoint and metadata payloads
    pub fn decode(&self) -> Result<(Checkpoint, CheckpointMetadata), SqliteSaverError> {
        let checkpoint: Checkpoint = serde_json::from_str(&self.checkpoint_data)?;
        let metadata: CheckpointMetadata = serde_json::from_str(&self.metadata_data)?;
        Ok((checkpoint, metadata))
    }

    /// The configuration addressing this row
    pub fn config(&self) -> CheckpointConfig {
        CheckpointConfig {
            thread_id: Some(self.thread_id.clone()),
            checkpoint_id: Some(self.checkpoint_id.clone()),
            checkpoint_ns: self.ns_option(),
            extra: HashMap::new(),
        }
    }

    /// Navigable reference to the parent checkpoint, if the row has one
    ///
    /// Resolved lazily by the reader; retention may have deleted the target,
    /// in which case following the pointer yields no checkpoint.
    pub fn parent_config(&self) -> Option<CheckpointConfig> {
        self.parent_checkpoint_id
            .as_ref()
            .map(|parent_id| CheckpointConfig {
                thread_id: Some(self.thread_id.clone()),
                checkpoint_id: Some(parent_id.clone()),
                checkpoint_ns: self.ns_option(),
                extra: HashMap::new(),
            })
    }

    fn ns_option(&self) -> Option<String> {
        if self.checkpoint_ns.is_empty() {
            None
        } else {
            Some(self.checkpoint_ns.clone())
        }
    }
}

/// One staged pending write row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CheckpointWriteRow {
    /// Task that produced the write
    pub task_id: String,

    /// Position of the write within the task's batch
    pub idx: i64,

    /// Target channel name
    pub channel: String,

    /// Serializer type tag for `value_data`
    pub value_type: String,

    /// Serialized channel value
    pub value_data: Vec<u8>,
}

impl CheckpointWriteRow {
    /// Decode into the facade's pending-write triple
    pub fn decode(&self, serializer: &TypedSerializer) -> Result<PendingWrite, SqliteSaverError> {
        let value = serializer.loads_typed(&self.value_type, &self.value_data)?;
        Ok((self.task_id.clone(), self.channel.clone(), value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_row_decode_and_config() {
        let checkpoint = Checkpoint::empty();
        let metadata = CheckpointMetadata::new().with_step(2);
        let row = CheckpointRow {
            id: 1,
            thread_id: "t1".to_string(),
            checkpoint_ns: String::new(),
            checkpoint_id: checkpoint.id.clone(),
            parent_checkpoint_id: Some("parent".to_string()),
            checkpoint_data: serde_json::to_string(&checkpoint).unwrap(),
            metadata_data: serde_json::to_string(&metadata).unwrap(),
            channel_versions: "{}".to_string(),
            channel_values: "{}".to_string(),
            step: 2,
            checkpoint_at: checkpoint.ts.to_rfc3339(),
        };

        let (decoded, decoded_meta) = row.decode().unwrap();
        assert_eq!(decoded.id, checkpoint.id);
        assert_eq!(decoded_meta.step, Some(2));

        assert_eq!(row.config().checkpoint_id, Some(checkpoint.id));
        assert_eq!(row.config().ns(), "");
        assert_eq!(
            row.parent_config().unwrap().checkpoint_id,
            Some("parent".to_string())
        );
    }

    #[test]
    fn test_write_row_decode() {
        let serializer = TypedSerializer::new();
        let (value_type, value_data) = serializer.dumps_typed(&json!({"on": true})).unwrap();

        let row = CheckpointWriteRow {
            task_id: "t0".to_string(),
            idx: 0,
            channel: "lights".to_string(),
            value_type,
            value_data,
        };

        let (task_id, channel, value) = row.decode(&serializer).unwrap();
        assert_eq!(task_id, "t0");
        assert_eq!(channel, "lights");
        assert_eq!(value, json!({"on": true}));
    }
}
