//! Error taxonomy for the control graph.
//!
//! [`ConfigurationError`] covers construction-time mistakes and is never
//! retried; [`ControlError`] covers per-control failures raised while
//! queueing edits or resolving values, and always names the originating
//! control so a caller can correlate the failure with a form field.

use thiserror::Error;

use crate::ControlId;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("duplicate control id: {0}")]
    DuplicateId(ControlId),
    #[error("Apply must appear only once")]
    DuplicateApply,
    #[error("control {control} depends on unknown control {parent}")]
    UnknownParent { control: ControlId, parent: ControlId },
    #[error("dependency cycle through control {0}")]
    DependencyCycle(ControlId),
    #[error("unknown registry function: {0}")]
    UnknownFunction(String),
    #[error("invalid controller document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Error)]
pub enum ControlError {
    /// A queued view failed its bound validator; the control's prior state
    /// is untouched.
    #[error("validation failed for control {id}: {message}")]
    Validation { id: ControlId, message: String },
    /// A control's update function failed; the dirty flag stays set, so the
    /// function is retried on the next resolution.
    #[error("update failed for control {id}: {message}")]
    Update { id: ControlId, message: String },
    #[error("unknown control id: {0}")]
    UnknownControl(ControlId),
    #[error("view id {view} does not match control {control}")]
    ViewIdMismatch { control: ControlId, view: ControlId },
    #[error("view kind does not match control {0}")]
    ViewKindMismatch(ControlId),
    #[error("app function failed: {0}")]
    Function(String),
    #[error(transparent)]
    Config(#[from] ConfigurationError),
}

impl ControlError {
    /// The id of the control the error is bound to, when there is one.
    pub fn control_id(&self) -> Option<&ControlId> {
        match self {
            Self::Validation { id, .. } | Self::Update { id, .. } => Some(id),
            Self::UnknownControl(id) => Some(id),
            Self::ViewIdMismatch { control, .. } => Some(control),
            Self::ViewKindMismatch(id) => Some(id),
            Self::Function(_) | Self::Config(_) => None,
        }
    }
}
