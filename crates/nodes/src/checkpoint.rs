//! [`CheckpointStore`] implementations.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{Checkpoint, CheckpointError, CheckpointStore, PipelineRunId};
use tokio::sync::RwLock;
use tracing::debug;

/// Keeps checkpoints for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    runs: RwLock<HashMap<PipelineRunId, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self, run_id: PipelineRunId) -> Result<Checkpoint, CheckpointError> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(CheckpointError::NotFound { run_id })
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.runs
            .write()
            .await
            .insert(checkpoint.run_id, checkpoint.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per run, `<dir>/<run_id>.json`.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so a crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct JsonFileCheckpointStore {
    dir: PathBuf,
}

fn io_error(context: &str, path: &Path, e: std::io::Error) -> CheckpointError {
    CheckpointError::Io {
        message: format!("{context} {}: {e}", path.display()),
    }
}

impl JsonFileCheckpointStore {
    /// A store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, run_id: PipelineRunId) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn load(&self, run_id: PipelineRunId) -> Result<Checkpoint, CheckpointError> {
        let path = self.path_for(run_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound { run_id })
            }
            Err(e) => return Err(io_error("reading", &path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| CheckpointError::Serialization {
            message: format!("{}: {e}", path.display()),
        })
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error("creating", &self.dir, e))?;
        let body =
            serde_json::to_vec_pretty(checkpoint).map_err(|e| CheckpointError::Serialization {
                message: e.to_string(),
            })?;
        let path = self.path_for(checkpoint.run_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error("writing", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error("replacing", &path, e))?;
        debug!(run_id = %checkpoint.run_id, phase = %checkpoint.phase, "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{EpochId, GraphName, GraphSchema, RunInputs, RunPhase};

    use super::*;

    fn checkpoint() -> Checkpoint {
        Checkpoint::new(
            PipelineRunId::new_random(),
            EpochId::new_random(),
            RunInputs {
                schema: GraphSchema {
                    database_name: "retail".into(),
                    graph_name: GraphName::new("customers").unwrap(),
                    vertex_collections: Vec::new(),
                    edge_collections: Vec::new(),
                },
                documents: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn file_store_replaces_previous_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCheckpointStore::new(dir.path().join("runs"));
        let mut cp = checkpoint();
        store.save(&cp).await.unwrap();
        cp.phase = RunPhase::TemplateGeneration;
        store.save(&cp).await.unwrap();

        let loaded = store.load(cp.run_id).await.unwrap();
        assert_eq!(loaded, cp);
        assert!(!store.path_for(cp.run_id).with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn unknown_runs_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFileCheckpointStore::new(dir.path());
        let memory = MemoryCheckpointStore::new();
        let run_id = PipelineRunId::new_random();
        assert_eq!(
            file.load(run_id).await.unwrap_err(),
            CheckpointError::NotFound { run_id }
        );
        assert_eq!(
            memory.load(run_id).await.unwrap_err(),
            CheckpointError::NotFound { run_id }
        );
    }
}
