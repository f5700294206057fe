//! Packaging and out-of-process execution for appdeck controllers.
//!
//! The encoder stages a controller, its dependencies, and a function
//! reference into a tar.gz artifact; the decoder unpacks it into a working
//! directory; the executor spawns the runner subprocess per execution and
//! exchanges state with it through file-backed JSON records.

pub mod content;
pub mod decode;
pub mod encode;
pub mod execution;
pub mod executor;
pub mod runner;
pub mod samples;
pub mod stage;

pub use content::{FrameData, JsonValueEncoder, MediaType, ValueEncoder};
pub use decode::{AppDecoder, DecodeError};
pub use encode::{
    AppEncoder, AppSpec, EncodeError, EncodeOptions, FunctionManifest, FunctionStrategy, Manifest,
    Parameter, TypeDescriptor, TypeKind,
};
pub use execution::{
    EncodedOutput, ExecuteError, Execution, ExecutionId, ExecutionStatus,
};
pub use executor::{AppExecutor, ExecutorConfig};
pub use stage::{Dependency, StageError, StagedSource};
