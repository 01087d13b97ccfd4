//! Demonstrates crash recovery: checkpoints written by one process survive a
//! restart, and the latest checkpoint plus its staged writes reconstruct the
//! in-flight step.
//!
//! Run with: `cargo run --example resume_after_restart`

use hearth_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSource, Checkpointer,
};
use hearth_checkpoint_sqlite::SqliteSaver;
use serde_json::json;
use std::collections::HashMap;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let database_url = format!("sqlite://{}/hearth.db?mode=rwc", dir.path().display());

    let thread = CheckpointConfig::new().with_thread_id("evening-routine".to_string());

    // "First process": run two steps, then crash mid-step 2 after one task
    // finished but before the step's checkpoint was written.
    {
        let saver = SqliteSaver::connect(&database_url).await?;

        let mut step0 = Checkpoint::empty();
        step0
            .channel_values
            .insert("presence".to_string(), json!({"living_room": true}));
        let saved0 = saver
            .put(
                &thread,
                step0,
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Input)
                    .with_step(0),
                HashMap::new(),
            )
            .await?;

        let mut step1 = Checkpoint::empty();
        step1
            .channel_values
            .insert("lighting".to_string(), json!({"scene": "dusk"}));
        let saved1 = saver
            .put(
                &saved0,
                step1,
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Loop)
                    .with_step(1),
                HashMap::new(),
            )
            .await?;

        // Mid-step task output, durably staged before the step completes.
        saver
            .put_writes(
                &saved1,
                vec![("climate".to_string(), json!({"target": 19.0}))],
                "thermostat_agent".to_string(),
            )
            .await?;

        println!("first process wrote steps 0 and 1, then staged one mid-step write");
    }

    // "Second process": reconnect and reconstruct in-flight work.
    {
        let saver = SqliteSaver::connect(&database_url).await?;

        let tuple = saver
            .get_tuple(&thread)
            .await?
            .expect("checkpoint should have survived the restart");

        println!(
            "resumed at step {:?} (checkpoint {})",
            tuple.metadata.step, tuple.checkpoint.id
        );
        for (task_id, channel, value) in tuple.pending_writes.unwrap_or_default() {
            println!("  staged write from {}: {} = {}", task_id, channel, value);
        }
        if let Some(parent) = tuple.parent_config {
            println!("  parent checkpoint: {:?}", parent.checkpoint_id);
        }
    }

    Ok(())
}
