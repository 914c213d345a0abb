//! Append-only JSON lines log file backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{Result, SagaId, StateRepository, TransitionRecord};

/// Writes one JSON object per line to a log file.
///
/// Each line carries the record plus its coarse `status`. Writers in the
/// same process are serialized so lines never interleave.
#[derive(Clone)]
pub struct JsonLinesStateRepository {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

#[derive(Serialize)]
struct LogLine<'a> {
    status: &'static str,
    #[serde(flatten)]
    record: &'a TransitionRecord,
}

impl JsonLinesStateRepository {
    /// Creates a repository appending to `path`. The file is created on the
    /// first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads back every record of one saga instance, in file order.
    ///
    /// Intended for operators; a missing file reads as empty history.
    pub async fn history(&self, saga_id: &SagaId) -> Result<Vec<TransitionRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let record: TransitionRecord = serde_json::from_str(line)?;
            if &record.saga_id == saga_id {
                records.push(record);
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl StateRepository for JsonLinesStateRepository {
    async fn record(&self, record: TransitionRecord) -> Result<()> {
        let mut line = serde_json::to_vec(&LogLine {
            status: record.status(),
            record: &record,
        })?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        tracing::trace!(
            saga_id = %record.saga_id,
            transition = %record.transition,
            path = %self.path.display(),
            "transition appended"
        );
        Ok(())
    }
}
