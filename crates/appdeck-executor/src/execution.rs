//! Execution records and their on-disk lifecycle.
//!
//! A record lives at `<app_dir>/executions/<id>.json` and is mutated only
//! by the subprocess that owns the execution. Writers replace the whole
//! file atomically (temp file, then rename), so readers always observe a
//! complete record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appdeck_controls::View;

pub const EXECUTIONS_DIR: &str = "executions";

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("i/o error on execution record {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed execution record {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to spawn runner {runner}: {source}")]
    Spawn {
        runner: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no runner binary configured and none staged with the application")]
    NoRunner,
}

/// Lifecycle states, serialized as lowercase strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// A refresh completed; views are current, nothing was applied.
    Ready,
    /// Persisted by the parent before the subprocess takes over.
    Scheduled,
    /// The subprocess is resolving and applying.
    Running,
    Finished,
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Finished | Self::Failed)
    }
}

/// The applied function's output, carried inline in the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedOutput {
    pub application: String,
    pub content_type: String,
    /// Base64 payload bytes.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExecutionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One execution of a packaged application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<EncodedOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,
}

impl Execution {
    pub fn scheduled(id: ExecutionId, views: Vec<View>) -> Self {
        Self {
            id,
            status: ExecutionStatus::Scheduled,
            views,
            output: None,
            logs: None,
        }
    }
}

pub fn record_path(app_dir: &Path, id: &ExecutionId) -> PathBuf {
    app_dir
        .join(EXECUTIONS_DIR)
        .join(format!("{}.json", id.as_str()))
}

/// Reads a persisted record; `Ok(None)` when no record exists yet.
pub fn read_record(app_dir: &Path, id: &ExecutionId) -> Result<Option<Execution>, ExecuteError> {
    let path = record_path(app_dir, id);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(ExecuteError::Io { path, source }),
    };
    let execution =
        serde_json::from_slice(&bytes).map_err(|source| ExecuteError::Malformed { path, source })?;
    Ok(Some(execution))
}

/// Atomically replaces the record file.
pub fn write_record(app_dir: &Path, execution: &Execution) -> Result<(), ExecuteError> {
    let path = record_path(app_dir, &execution.id);
    let dir = app_dir.join(EXECUTIONS_DIR);
    fs::create_dir_all(&dir).map_err(|source| ExecuteError::Io {
        path: dir.clone(),
        source,
    })?;
    let bytes = serde_json::to_vec_pretty(execution).map_err(|source| ExecuteError::Malformed {
        path: path.clone(),
        source,
    })?;
    let temp = dir.join(format!(".{}.tmp", execution.id.as_str()));
    fs::write(&temp, bytes).map_err(|source| ExecuteError::Io {
        path: temp.clone(),
        source,
    })?;
    fs::rename(&temp, &path).map_err(|source| ExecuteError::Io { path, source })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn scratch(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("appdeck-exec-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn status_uses_lowercase_wire_strings() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Scheduled).unwrap(),
            "\"scheduled\""
        );
        assert_eq!(
            serde_json::from_str::<ExecutionStatus>("\"finished\"").unwrap(),
            ExecutionStatus::Finished
        );
    }

    #[test]
    fn record_round_trips_through_disk() {
        let dir = scratch("roundtrip");
        let execution = Execution {
            id: ExecutionId::new("e1"),
            status: ExecutionStatus::Finished,
            views: vec![View::text_edit("c1", "10")],
            output: Some(EncodedOutput {
                application: "application/json".to_string(),
                content_type: "application/json".to_string(),
                data: "MTA=".to_string(),
            }),
            logs: None,
        };
        write_record(&dir, &execution).unwrap();
        let loaded = read_record(&dir, &execution.id).unwrap().unwrap();
        assert_eq!(loaded.status, ExecutionStatus::Finished);
        assert_eq!(loaded.views, execution.views);
        assert_eq!(loaded.output, execution.output);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_record_reads_as_none() {
        let dir = scratch("missing");
        assert!(read_record(&dir, &ExecutionId::new("ghost"))
            .unwrap()
            .is_none());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn absent_output_and_logs_are_omitted() {
        let execution = Execution::scheduled(ExecutionId::new("e2"), Vec::new());
        let value = serde_json::to_value(&execution).unwrap();
        assert!(value.get("output").is_none());
        assert!(value.get("logs").is_none());
        assert_eq!(value["status"], "scheduled");
    }
}
