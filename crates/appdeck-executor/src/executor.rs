//! The unpacked application and its execution entry points.
//!
//! The executor never resolves controls itself. It persists a record,
//! spawns the runner subprocess over the application directory, and reads
//! the record back. The record file is the only channel between the two
//! processes.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use log::{debug, warn};

use appdeck_controls::View;

use crate::encode::{FunctionManifest, Manifest, RUNNER_FILE};
use crate::execution::{
    read_record, write_record, ExecuteError, Execution, ExecutionId, ExecutionStatus,
};

/// Injected runtime settings for spawning and waiting on executions.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Runner executable; when unset, the staged binary is used if the
    /// artifact captured one.
    pub runner: Option<PathBuf>,
    /// How long a fire-and-forget apply waits for the record to leave
    /// `scheduled` before returning it as-is.
    pub startup_wait: Duration,
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            runner: None,
            startup_wait: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
        }
    }
}

pub struct AppExecutor {
    app_dir: PathBuf,
    manifest: Manifest,
    config: ExecutorConfig,
}

impl AppExecutor {
    pub fn new(app_dir: PathBuf, manifest: Manifest, config: ExecutorConfig) -> Self {
        Self {
            app_dir,
            manifest,
            config,
        }
    }

    pub fn app_dir(&self) -> &PathBuf {
        &self.app_dir
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn config_mut(&mut self) -> &mut ExecutorConfig {
        &mut self.config
    }

    fn runner_path(&self) -> Result<PathBuf, ExecuteError> {
        if let Some(runner) = &self.config.runner {
            return Ok(runner.clone());
        }
        if let FunctionManifest::Binary(name) = &self.manifest.function {
            return Ok(self.app_dir.join(name));
        }
        let staged = self.app_dir.join(RUNNER_FILE);
        if staged.is_file() {
            return Ok(staged);
        }
        Err(ExecuteError::NoRunner)
    }

    /// Starts one execution. With `apply` false this is a synchronous view
    /// refresh: the subprocess runs to completion before the refreshed
    /// record is returned. With `apply` true the subprocess is left running
    /// and the call returns once the record moves past `scheduled` (or the
    /// startup wait elapses).
    pub fn execute(&self, views: &[View], apply: bool) -> Result<Execution, ExecuteError> {
        let id = ExecutionId::generate();
        let mut initial = Execution::scheduled(id.clone(), views.to_vec());
        if !apply {
            initial.status = ExecutionStatus::Ready;
        }
        // Persisting before the spawn means a poll racing the subprocess
        // still sees the execution.
        write_record(&self.app_dir, &initial)?;

        let runner = self.runner_path()?;
        debug!(
            "spawning {} for execution {} (apply: {apply})",
            runner.display(),
            id
        );
        let mut child = Command::new(&runner)
            .arg(id.as_str())
            .arg(if apply { "true" } else { "false" })
            .current_dir(&self.app_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ExecuteError::Spawn {
                runner: runner.clone(),
                source,
            })?;

        if !apply {
            let status = child.wait().map_err(|source| ExecuteError::Spawn {
                runner,
                source,
            })?;
            if !status.success() {
                warn!("runner exited with {status} for execution {id}");
            }
            return self.current(&id, &initial);
        }

        let deadline = Instant::now() + self.config.startup_wait;
        loop {
            if let Some(record) = read_record(&self.app_dir, &id)? {
                if record.status != ExecutionStatus::Scheduled {
                    return Ok(record);
                }
            }
            if Instant::now() >= deadline {
                return self.current(&id, &initial);
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }

    /// Reads the current state of an execution. An id with no record yet
    /// reads as a synthetic `scheduled` execution, never an error.
    pub fn poll(&self, id: &ExecutionId) -> Result<Execution, ExecuteError> {
        Ok(read_record(&self.app_dir, id)?
            .unwrap_or_else(|| Execution::scheduled(id.clone(), Vec::new())))
    }

    fn current(&self, id: &ExecutionId, fallback: &Execution) -> Result<Execution, ExecuteError> {
        Ok(read_record(&self.app_dir, id)?.unwrap_or_else(|| fallback.clone()))
    }
}
