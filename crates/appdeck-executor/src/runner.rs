//! The subprocess side of an execution.
//!
//! The runner owns the record for its execution id: it reconciles the
//! control graph, persists the refreshed views, and, when applying, runs
//! the target function and persists the outcome. Every failure is
//! downgraded to a `failed` record so the polling parent never sees a
//! crashed process with no explanation.

use std::error::Error as StdError;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{error, info};
use thiserror::Error;

use appdeck_controls::{ConfigurationError, ControlError, Controller, Registry};

use crate::content::ValueEncoder;
use crate::encode::{FunctionManifest, Manifest, CONTROLLER_FILE, MANIFEST_FILE};
use crate::execution::{
    read_record, write_record, EncodedOutput, ExecuteError, Execution, ExecutionId,
    ExecutionStatus,
};

/// Registry name a captured-binary artifact's function resolves under.
pub const CAPTURED_FUNCTION: &str = "app.main";

#[derive(Debug, Error)]
pub enum RunError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigurationError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Record(#[from] ExecuteError),
}

/// Runs one execution against an unpacked application directory. Errors
/// are persisted, not returned; the exit is clean either way.
pub fn run(
    registry: &Registry,
    encoder: &dyn ValueEncoder,
    app_dir: &Path,
    id: &ExecutionId,
    apply: bool,
) {
    if let Err(e) = try_run(registry, encoder, app_dir, id, apply) {
        error!("execution {id} failed: {e}");
        let failed = Execution {
            id: id.clone(),
            status: ExecutionStatus::Failed,
            views: read_record(app_dir, id)
                .ok()
                .flatten()
                .map(|record| record.views)
                .unwrap_or_default(),
            output: None,
            logs: Some(error_chain(&e)),
        };
        if let Err(write_error) = write_record(app_dir, &failed) {
            error!("could not persist failure for {id}: {write_error}");
        }
    }
}

fn try_run(
    registry: &Registry,
    encoder: &dyn ValueEncoder,
    app_dir: &Path,
    id: &ExecutionId,
    apply: bool,
) -> Result<(), RunError> {
    let manifest = read_manifest(app_dir)?;
    let mut controller = read_controller(app_dir, registry)?;

    let pending = read_record(app_dir, id)?
        .map(|record| record.views)
        .unwrap_or_default();
    let views = controller.list(&pending)?;

    let mut execution = Execution {
        id: id.clone(),
        status: if apply {
            ExecutionStatus::Running
        } else {
            ExecutionStatus::Ready
        },
        views,
        output: None,
        logs: None,
    };
    write_record(app_dir, &execution)?;
    info!("execution {id} reconciled ({} views)", execution.views.len());

    if !apply {
        return Ok(());
    }

    let name = match &manifest.function {
        FunctionManifest::Registry(name) => name.as_str(),
        FunctionManifest::Binary(_) => CAPTURED_FUNCTION,
    };
    let func = registry.function(name)?;
    let views = execution.views.clone();
    let output = controller.apply(&func, &views)?;

    let frame = encoder.encode(&output, None);
    execution.status = ExecutionStatus::Finished;
    execution.output = Some(EncodedOutput {
        application: frame.media_type.application,
        content_type: frame.media_type.content_type,
        data: BASE64.encode(&frame.data),
    });
    write_record(app_dir, &execution)?;
    info!("execution {id} finished");
    Ok(())
}

fn read_manifest(app_dir: &Path) -> Result<Manifest, RunError> {
    let path = app_dir.join(MANIFEST_FILE);
    let bytes = fs::read(&path).map_err(|source| RunError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| RunError::Malformed { path, source })
}

fn read_controller(app_dir: &Path, registry: &Registry) -> Result<Controller, RunError> {
    let path = app_dir.join(CONTROLLER_FILE);
    let bytes = fs::read(&path).map_err(|source| RunError::Io {
        path: path.clone(),
        source,
    })?;
    let doc = serde_json::from_slice(&bytes)
        .map_err(|source| RunError::Malformed { path, source })?;
    Ok(Controller::from_value(&doc, registry)?)
}

/// Renders the full error chain, one cause per line.
fn error_chain(error: &dyn StdError) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let _ = write!(rendered, "\ncaused by: {cause}");
        source = cause.source();
    }
    rendered
}
