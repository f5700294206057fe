//! Reactive form-control dependency graph.
//!
//! A caller describes a parameterized function as a set of [`Control`]s —
//! text fields, combo boxes, sliders, file uploads — linked by dependency
//! edges and resolved on demand by a [`Controller`]. Control values are
//! memoized behind a per-control dirty flag: a control recomputes only when
//! it received a new edit, never because a parent's data changed (see
//! [`InvalidationPolicy`] for the transitive alternative).
//!
//! Controls live in an arena indexed by [`ControlId`]; dependency edges are
//! stored as ids, so a serialized controller round-trips without any
//! pointer fixup. Functions (update hooks, custom validators, combo-box
//! item producers, app entry points) are referenced by name and resolved
//! through an explicit [`Registry`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod codec;
pub mod control;
pub mod controller;
pub mod error;
pub mod list_model;
pub mod registry;
pub mod validate;
pub mod view;

pub use control::{Apply, ComboBox, Control, ControlData, FileUpload, Slider, TextField};
pub use controller::{Controller, InvalidationPolicy};
pub use error::{ConfigurationError, ControlError};
pub use registry::{Registry, UpdateHook};
pub use validate::Validator;
pub use view::View;

/// Identifier of a control, unique within one [`Controller`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(String);

impl ControlId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Issues a fresh random id for controls constructed without one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ControlId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

impl From<String> for ControlId {
    fn from(v: String) -> Self {
        Self(v)
    }
}
