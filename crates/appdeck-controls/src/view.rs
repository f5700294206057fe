//! Immutable control snapshots exchanged with the caller.
//!
//! Wire form is a tagged record:
//! `{"id", "enabled", "label", "optional", "type": <variant>, ...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigurationError;
use crate::ControlId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum View {
    TextFieldView {
        id: ControlId,
        enabled: bool,
        label: Option<String>,
        optional: bool,
        data: Option<String>,
    },
    ComboBoxView {
        id: ControlId,
        enabled: bool,
        label: Option<String>,
        optional: bool,
        titles: Vec<String>,
        selected: i64,
    },
    SliderView {
        id: ControlId,
        enabled: bool,
        label: Option<String>,
        optional: bool,
        data: Vec<f64>,
        selected: i64,
    },
    FileUploadView {
        id: ControlId,
        enabled: bool,
        label: Option<String>,
        optional: bool,
        is_text: bool,
        /// Base64 upload contents; absent until the caller supplies them.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
    ApplyView {
        id: ControlId,
        enabled: bool,
        label: Option<String>,
        optional: bool,
    },
}

impl View {
    pub fn id(&self) -> &ControlId {
        match self {
            Self::TextFieldView { id, .. }
            | Self::ComboBoxView { id, .. }
            | Self::SliderView { id, .. }
            | Self::FileUploadView { id, .. }
            | Self::ApplyView { id, .. } => id,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Self::TextFieldView { enabled, .. }
            | Self::ComboBoxView { enabled, .. }
            | Self::SliderView { enabled, .. }
            | Self::FileUploadView { enabled, .. }
            | Self::ApplyView { enabled, .. } => *enabled,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Self::TextFieldView { label, .. }
            | Self::ComboBoxView { label, .. }
            | Self::SliderView { label, .. }
            | Self::FileUploadView { label, .. }
            | Self::ApplyView { label, .. } => label.as_deref(),
        }
    }

    pub fn optional(&self) -> bool {
        match self {
            Self::TextFieldView { optional, .. }
            | Self::ComboBoxView { optional, .. }
            | Self::SliderView { optional, .. }
            | Self::FileUploadView { optional, .. }
            | Self::ApplyView { optional, .. } => *optional,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::TextFieldView { .. } => "TextFieldView",
            Self::ComboBoxView { .. } => "ComboBoxView",
            Self::SliderView { .. } => "SliderView",
            Self::FileUploadView { .. } => "FileUploadView",
            Self::ApplyView { .. } => "ApplyView",
        }
    }

    /// Packs the view into its tagged wire record.
    pub fn pack(&self) -> Value {
        // Serialization of the tagged enum cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Rebuilds a view from a packed record.
    pub fn unpack(source: &Value) -> Result<Self, ConfigurationError> {
        serde_json::from_value(source.clone())
            .map_err(|e| ConfigurationError::InvalidDocument(e.to_string()))
    }

    /// A caller-side text edit with default presentation fields.
    pub fn text_edit(id: impl Into<ControlId>, data: impl Into<String>) -> Self {
        Self::TextFieldView {
            id: id.into(),
            enabled: true,
            label: None,
            optional: false,
            data: Some(data.into()),
        }
    }

    /// A caller-side combo-box selection with default presentation fields.
    pub fn selection_edit(id: impl Into<ControlId>, selected: i64) -> Self {
        Self::ComboBoxView {
            id: id.into(),
            enabled: true,
            label: None,
            optional: false,
            titles: Vec::new(),
            selected,
        }
    }
}
