//! Packaging a controller and its dependencies into a portable artifact.
//!
//! The encoder works from an explicit binding table: every target-function
//! parameter names the control it binds to, and carries an optional
//! structured type descriptor. Nothing is inferred by inspecting the
//! function.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use appdeck_controls::{ConfigurationError, Control, Controller};

use crate::content::{FrameData, MediaType};
use crate::stage::{self, Dependency, StageError};

pub const CONTROLLER_FILE: &str = "controller.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const RUNNER_FILE: &str = "runner";
pub const ARCHIVE_FORMAT: &str = "tar.gz";
pub const CONTENT_TYPE: &str = "application/octet-stream";
pub const APPLICATION: &str = "application/x-appdeck";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("parameter {0} has no bound control")]
    UnboundParameter(String),
    #[error("parameter {0} is required but its control is optional")]
    OptionalityMismatch(String),
    #[error("captured-binary packaging requires a runner executable")]
    NoRunner,
    #[error(transparent)]
    Config(#[from] ConfigurationError),
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> EncodeError {
    let path = path.into();
    move |source| EncodeError::Io { path, source }
}

/// Structured value-shape description of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Integer,
    Float,
    Text,
    Boolean,
    /// Any JSON value.
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub kind: TypeKind,
    pub optional: bool,
}

impl TypeDescriptor {
    pub fn required(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    pub fn optional(kind: TypeKind) -> Self {
        Self {
            kind,
            optional: true,
        }
    }
}

/// One target-function parameter in the binding table.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub descriptor: Option<TypeDescriptor>,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: None,
        }
    }

    pub fn with_descriptor(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor: Some(descriptor),
        }
    }
}

/// How the packaged artifact references its target function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionStrategy {
    /// A durable name resolved against the runner's registry.
    Registry { name: String },
    /// The runner executable itself is copied into the artifact, so the
    /// package is self-contained.
    CapturedBinary,
}

/// Everything needed to package one application.
pub struct AppSpec {
    pub function: FunctionStrategy,
    pub parameters: Vec<Parameter>,
    /// Parameter name to the control bound to it. Iteration order is the
    /// controller registration order.
    pub controls: IndexMap<String, Control>,
    pub dependencies: Vec<Dependency>,
}

/// Encoder configuration; injected, never read from globals.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Where staging directories are created.
    pub work_dir: PathBuf,
    /// Fail on an optional control bound to a required parameter instead
    /// of silently tightening it.
    pub strict_signature: bool,
    /// Package with [`FunctionStrategy::CapturedBinary`] regardless of the
    /// strategy named in the [`AppSpec`].
    pub force_capture: bool,
    /// Runner executable to copy when capturing.
    pub runner: Option<PathBuf>,
}

impl EncodeOptions {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            strict_signature: false,
            force_capture: false,
            runner: None,
        }
    }
}

/// The artifact's embedded manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub format: String,
    pub function: FunctionManifest,
    pub controller: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum FunctionManifest {
    /// Resolved by name against the runner's registry.
    Registry(String),
    /// Artifact-relative path of the captured runner executable.
    Binary(String),
}

pub struct AppEncoder {
    options: EncodeOptions,
}

impl AppEncoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Packages the application: binds parameters to controls, builds the
    /// controller, stages dependencies, and archives the tree.
    pub fn encode(&self, spec: AppSpec) -> Result<FrameData, EncodeError> {
        let AppSpec {
            function,
            parameters,
            mut controls,
            dependencies,
        } = spec;

        let mut ordered = Vec::with_capacity(parameters.len());
        for parameter in &parameters {
            let mut control = controls
                .shift_remove(&parameter.name)
                .ok_or_else(|| EncodeError::UnboundParameter(parameter.name.clone()))?;
            self.reconcile_optionality(parameter, &mut control)?;
            ordered.push(control);
        }
        let controller = Controller::new(ordered)?;

        let staging = self.options.work_dir.join(format!("stage-{}", Uuid::new_v4()));
        stage::stage(&dependencies, &staging)?;

        let controller_doc = controller.to_value();
        write_json(&staging.join(CONTROLLER_FILE), &controller_doc)?;

        let capture = self.options.force_capture
            || matches!(function, FunctionStrategy::CapturedBinary);
        let function = if capture {
            let runner = self
                .options
                .runner
                .as_ref()
                .ok_or(EncodeError::NoRunner)?;
            let target = staging.join(RUNNER_FILE);
            fs::copy(runner, &target).map_err(io_err(runner.clone()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&target, fs::Permissions::from_mode(0o755))
                    .map_err(io_err(target.clone()))?;
            }
            FunctionManifest::Binary(RUNNER_FILE.to_string())
        } else {
            match function {
                FunctionStrategy::Registry { name } => FunctionManifest::Registry(name),
                FunctionStrategy::CapturedBinary => return Err(EncodeError::NoRunner),
            }
        };

        let manifest = Manifest {
            format: ARCHIVE_FORMAT.to_string(),
            function,
            controller: CONTROLLER_FILE.to_string(),
        };
        let manifest_value =
            serde_json::to_value(&manifest).unwrap_or(Value::Null);
        write_json(&staging.join(MANIFEST_FILE), &manifest_value)?;

        let archive = archive_tree(&staging)?;
        if let Err(e) = fs::remove_dir_all(&staging) {
            debug!("staging tree {} not removed: {e}", staging.display());
        }
        info!("encoded application: {} bytes", archive.len());

        Ok(
            FrameData::new(archive, MediaType::new(CONTENT_TYPE, APPLICATION))
                .with_settings(manifest_value),
        )
    }

    fn reconcile_optionality(
        &self,
        parameter: &Parameter,
        control: &mut Control,
    ) -> Result<(), EncodeError> {
        let Some(descriptor) = parameter.descriptor else {
            return Ok(());
        };
        match control.optional() {
            None => control.set_optional(Some(descriptor.optional)),
            Some(true) if !descriptor.optional => {
                if self.options.strict_signature {
                    return Err(EncodeError::OptionalityMismatch(parameter.name.clone()));
                }
                debug!(
                    "tightening optional control for required parameter {}",
                    parameter.name
                );
                control.set_optional(Some(false));
            }
            Some(_) => {}
        }
        Ok(())
    }
}

fn write_json(path: &Path, value: &Value) -> Result<(), EncodeError> {
    let bytes =
        serde_json::to_vec_pretty(value).map_err(|e| EncodeError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
    fs::write(path, bytes).map_err(io_err(path))
}

fn archive_tree(root: &Path) -> Result<Vec<u8>, EncodeError> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(".", root)
        .map_err(io_err(root))?;
    let encoder = builder.into_inner().map_err(io_err(root))?;
    encoder.finish().map_err(io_err(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use appdeck_controls::TextField;
    use std::env;

    fn options(name: &str) -> EncodeOptions {
        let dir = env::temp_dir().join(format!("appdeck-encode-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        EncodeOptions::new(dir)
    }

    fn single_control_spec() -> AppSpec {
        let mut controls = IndexMap::new();
        controls.insert("x".to_string(), TextField::new().id("x").data("1").build());
        AppSpec {
            function: FunctionStrategy::Registry {
                name: "samples.sum".to_string(),
            },
            parameters: vec![Parameter::new("x")],
            controls,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn unbound_parameter_is_rejected() {
        let encoder = AppEncoder::new(options("unbound"));
        let mut spec = single_control_spec();
        spec.parameters.push(Parameter::new("missing"));
        assert!(matches!(
            encoder.encode(spec),
            Err(EncodeError::UnboundParameter(name)) if name == "missing"
        ));
    }

    #[test]
    fn strict_mode_rejects_optional_control_for_required_parameter() {
        let mut options = options("strict");
        options.strict_signature = true;
        let encoder = AppEncoder::new(options);
        let mut controls = IndexMap::new();
        controls.insert(
            "x".to_string(),
            TextField::new().id("x").optional(true).build(),
        );
        let spec = AppSpec {
            function: FunctionStrategy::Registry {
                name: "samples.sum".to_string(),
            },
            parameters: vec![Parameter::with_descriptor(
                "x",
                TypeDescriptor::required(TypeKind::Integer),
            )],
            controls,
            dependencies: Vec::new(),
        };
        assert!(matches!(
            encoder.encode(spec),
            Err(EncodeError::OptionalityMismatch(name)) if name == "x"
        ));
    }

    #[test]
    fn lenient_mode_tightens_optionality() {
        let encoder = AppEncoder::new(options("lenient"));
        let mut controls = IndexMap::new();
        controls.insert(
            "x".to_string(),
            TextField::new().id("x").data("1").optional(true).build(),
        );
        let spec = AppSpec {
            function: FunctionStrategy::Registry {
                name: "samples.sum".to_string(),
            },
            parameters: vec![Parameter::with_descriptor(
                "x",
                TypeDescriptor::required(TypeKind::Integer),
            )],
            controls,
            dependencies: Vec::new(),
        };
        let frame = encoder.encode(spec).unwrap();
        assert_eq!(frame.media_type.application, APPLICATION);
        assert_eq!(frame.settings["function"]["type"], "registry");
    }

    #[test]
    fn staging_tree_is_removed_after_encode() {
        let options = options("cleanup");
        let work_dir = options.work_dir.clone();
        AppEncoder::new(options).encode(single_control_spec()).unwrap();
        let leftovers: Vec<_> = fs::read_dir(&work_dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("stage-"))
            .collect();
        assert!(leftovers.is_empty(), "staging trees left behind: {leftovers:?}");
    }

    #[test]
    fn capture_without_runner_is_rejected() {
        let mut options = options("capture");
        options.force_capture = true;
        let encoder = AppEncoder::new(options);
        assert!(matches!(
            encoder.encode(single_control_spec()),
            Err(EncodeError::NoRunner)
        ));
    }

    #[test]
    fn unset_optionality_adopts_descriptor() {
        let encoder = AppEncoder::new(options("adopt"));
        let mut control = TextField::new().id("x").build();
        let parameter =
            Parameter::with_descriptor("x", TypeDescriptor::optional(TypeKind::Text));
        encoder.reconcile_optionality(&parameter, &mut control).unwrap();
        assert_eq!(control.optional(), Some(true));
    }
}
