//! Graph nodes.
//!
//! A [`Control`] owns its identity, dependency edges (parent ids), an
//! optional named update function, a pending-edit buffer, and the dirty
//! flag driving memoization. Kind-specific state lives in [`ControlData`],
//! which is what update functions see: their own data mutably, parent data
//! as snapshots.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::error::ControlError;
use crate::list_model::{self, ListItems};
use crate::registry::{HookError, ProducerFn, TitleHook, UpdateHook};
use crate::validate::Validator;
use crate::view::View;
use crate::ControlId;

#[derive(Debug, Clone)]
pub enum ControlData {
    TextField {
        data: Option<String>,
        validator: Option<Validator>,
        validated: Option<Value>,
    },
    ComboBox {
        items: ListItems,
        selected: i64,
        title: Option<TitleHook>,
    },
    Slider {
        data: Vec<f64>,
        selected: i64,
    },
    FileUpload {
        is_text: bool,
        content: Option<Vec<u8>>,
    },
    Apply,
}

impl ControlData {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::TextField { .. } => "TextField",
            Self::ComboBox { .. } => "ComboBox",
            Self::Slider { .. } => "Slider",
            Self::FileUpload { .. } => "FileUpload",
            Self::Apply => "Apply",
        }
    }

    /// Whether the value space is a bounded enumeration. Free-form input
    /// (text, uploads) is not.
    pub fn finite_state(&self) -> bool {
        !matches!(self, Self::TextField { .. } | Self::FileUpload { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::TextField { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    pub fn set_text(&mut self, value: impl Into<String>) {
        if let Self::TextField { data, validated, .. } = self {
            *data = Some(value.into());
            *validated = None;
        }
    }

    pub fn clear_text(&mut self) {
        if let Self::TextField { data, validated, .. } = self {
            *data = None;
            *validated = None;
        }
    }

    pub fn selected(&self) -> Option<i64> {
        match self {
            Self::ComboBox { selected, .. } | Self::Slider { selected, .. } => Some(*selected),
            _ => None,
        }
    }

    pub fn set_selected(&mut self, index: i64) {
        match self {
            Self::ComboBox { selected, .. } | Self::Slider { selected, .. } => *selected = index,
            _ => {}
        }
    }

    pub fn set_items(&mut self, new_items: Vec<Value>) {
        if let Self::ComboBox { items, .. } = self {
            *items = ListItems::Fixed(new_items);
        }
    }

    pub fn content(&self) -> Option<&[u8]> {
        match self {
            Self::FileUpload { content, .. } => content.as_deref(),
            _ => None,
        }
    }
}

/// One node of the dependency graph.
#[derive(Debug, Clone)]
pub struct Control {
    pub(crate) id: ControlId,
    pub(crate) label: Option<String>,
    pub(crate) enabled: bool,
    pub(crate) optional: Option<bool>,
    pub(crate) parents: Vec<ControlId>,
    pub(crate) update: Option<UpdateHook>,
    pub(crate) pending: Option<View>,
    pub(crate) dirty: bool,
    pub(crate) data: ControlData,
}

impl Control {
    pub(crate) fn assemble(
        id: Option<ControlId>,
        label: Option<String>,
        optional: Option<bool>,
        parents: Vec<ControlId>,
        update: Option<UpdateHook>,
        mut data: ControlData,
    ) -> Self {
        let id = id.unwrap_or_else(ControlId::generate);
        if let ControlData::TextField {
            validator: Some(validator),
            ..
        } = &mut data
        {
            validator.bind(&id);
        }
        Self {
            id,
            label,
            enabled: true,
            optional,
            parents,
            update,
            pending: None,
            dirty: true,
            data,
        }
    }

    pub fn id(&self) -> &ControlId {
        &self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn optional(&self) -> Option<bool> {
        self.optional
    }

    /// Tri-state reconciliation hook used by the encoder: unset adopts the
    /// parameter's optionality.
    pub fn set_optional(&mut self, optional: Option<bool>) {
        self.optional = optional;
    }

    pub fn parents(&self) -> &[ControlId] {
        &self.parents
    }

    pub fn update_hook(&self) -> Option<&UpdateHook> {
        self.update.as_ref()
    }

    pub fn data(&self) -> &ControlData {
        &self.data
    }

    pub fn kind_name(&self) -> &'static str {
        self.data.kind_name()
    }

    pub fn is_dependent(&self) -> bool {
        !self.parents.is_empty()
    }

    pub fn requires_apply(&self) -> bool {
        self.is_dependent() || !self.data.finite_state()
    }

    pub(crate) fn effective_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Queues an edit for the next resolution. Validation runs here, before
    /// the buffer is stored; on failure nothing is mutated.
    pub(crate) fn queue(&mut self, view: View) -> Result<(), ControlError> {
        if view.id() != &self.id {
            return Err(ControlError::ViewIdMismatch {
                control: self.id.clone(),
                view: view.id().clone(),
            });
        }
        if !self.accepts(&view) {
            return Err(ControlError::ViewKindMismatch(self.id.clone()));
        }
        if let (
            ControlData::TextField {
                validator: Some(validator),
                validated,
                ..
            },
            View::TextFieldView { data, .. },
        ) = (&mut self.data, &view)
        {
            *validated = match data {
                Some(raw) => Some(validator.validate(raw)?),
                None => None,
            };
        }
        if let (
            ControlData::FileUpload { content, .. },
            View::FileUploadView {
                data: Some(encoded),
                ..
            },
        ) = (&mut self.data, &view)
        {
            let decoded =
                BASE64
                    .decode(encoded.as_bytes())
                    .map_err(|e| ControlError::Validation {
                        id: self.id.clone(),
                        message: e.to_string(),
                    })?;
            *content = Some(decoded);
        }
        self.pending = Some(view);
        Ok(())
    }

    fn accepts(&self, view: &View) -> bool {
        matches!(
            (&self.data, view),
            (ControlData::TextField { .. }, View::TextFieldView { .. })
                | (ControlData::ComboBox { .. }, View::ComboBoxView { .. })
                | (ControlData::Slider { .. }, View::SliderView { .. })
                | (ControlData::FileUpload { .. }, View::FileUploadView { .. })
                | (ControlData::Apply, View::ApplyView { .. })
        )
    }

    /// Copies a previously queued edit into the control's data. Kind and id
    /// agreement were checked when the edit was queued.
    pub(crate) fn absorb(&mut self, view: View) {
        match (&mut self.data, view) {
            (ControlData::TextField { data, validator, validated }, View::TextFieldView { data: new, .. }) => {
                if validator.is_none() || new.is_none() {
                    *validated = None;
                }
                *data = new;
            }
            (ControlData::ComboBox { selected, .. }, View::ComboBoxView { selected: new, .. }) => {
                *selected = new;
            }
            (ControlData::Slider { selected, .. }, View::SliderView { selected: new, .. }) => {
                *selected = new;
            }
            (
                ControlData::FileUpload { is_text, .. },
                View::FileUploadView {
                    is_text: new_is_text,
                    ..
                },
            ) => {
                // Upload content was decoded when the edit was queued.
                *is_text = new_is_text;
            }
            _ => {}
        }
    }

    /// Snapshot of the current state. Apply controls are rendered by the
    /// controller, which owns the gating scan.
    pub(crate) fn render_view(&self) -> Result<View, ControlError> {
        let id = self.id.clone();
        let label = self.label.clone();
        let optional = self.effective_optional();
        match &self.data {
            ControlData::TextField { data, .. } => Ok(View::TextFieldView {
                id,
                enabled: self.enabled,
                label,
                optional,
                data: data.clone(),
            }),
            ControlData::ComboBox { items, selected, title } => {
                let resolved = items.resolve().map_err(|e| self.update_error(e))?;
                Ok(View::ComboBoxView {
                    id,
                    enabled: self.enabled,
                    label,
                    optional,
                    titles: list_model::titles(&resolved, title.as_ref()),
                    selected: *selected,
                })
            }
            ControlData::Slider { data, selected } => Ok(View::SliderView {
                id,
                enabled: self.enabled,
                label,
                optional: false,
                data: data.clone(),
                selected: *selected,
            }),
            ControlData::FileUpload { is_text, content } => Ok(View::FileUploadView {
                id,
                enabled: self.enabled,
                label,
                optional,
                is_text: *is_text,
                data: content.as_ref().map(|bytes| BASE64.encode(bytes)),
            }),
            ControlData::Apply => Ok(View::ApplyView {
                id,
                enabled: self.enabled,
                label,
                optional: false,
            }),
        }
    }

    /// The resolved domain value, `None` when nothing has been supplied.
    pub(crate) fn current_value(&self) -> Result<Option<Value>, ControlError> {
        match &self.data {
            ControlData::TextField { data, validated, .. } => Ok(validated
                .clone()
                .or_else(|| data.clone().map(Value::String))),
            ControlData::ComboBox { items, selected, .. } => {
                let resolved = items.resolve().map_err(|e| self.update_error(e))?;
                if *selected >= 0 {
                    Ok(resolved.get(*selected as usize).cloned())
                } else {
                    Ok(None)
                }
            }
            ControlData::Slider { data, selected } => {
                if *selected >= 0 {
                    Ok(data.get(*selected as usize).copied().map(Value::from))
                } else {
                    Ok(None)
                }
            }
            ControlData::FileUpload { content, .. } => {
                Ok(content.as_ref().map(|bytes| Value::String(BASE64.encode(bytes))))
            }
            ControlData::Apply => Ok(None),
        }
    }

    fn update_error(&self, cause: HookError) -> ControlError {
        ControlError::Update {
            id: self.id.clone(),
            message: cause.to_string(),
        }
    }
}

// ── Builders ───────────────────────────────────────────────────────────────

macro_rules! builder_common {
    () => {
        pub fn label(mut self, label: impl Into<String>) -> Self {
            self.label = Some(label.into());
            self
        }

        pub fn id(mut self, id: impl Into<ControlId>) -> Self {
            self.id = Some(id.into());
            self
        }

        pub fn depends_on(mut self, parent: &Control) -> Self {
            self.parents.push(parent.id().clone());
            self
        }

        pub fn depends_on_id(mut self, parent: impl Into<ControlId>) -> Self {
            self.parents.push(parent.into());
            self
        }

        pub fn update(
            mut self,
            name: impl Into<String>,
            func: impl Fn(&mut ControlData, &[ControlData]) -> Result<(), HookError>
                + Send
                + Sync
                + 'static,
        ) -> Self {
            self.update = Some(UpdateHook::named(name, func));
            self
        }

        pub fn update_hook(mut self, hook: UpdateHook) -> Self {
            self.update = Some(hook);
            self
        }
    };
}

/// Free-form text input, optionally validated.
#[derive(Debug, Default)]
pub struct TextField {
    data: Option<String>,
    label: Option<String>,
    id: Option<ControlId>,
    parents: Vec<ControlId>,
    update: Option<UpdateHook>,
    validator: Option<Validator>,
    optional: Option<bool>,
}

impl TextField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    builder_common!();

    pub fn build(self) -> Control {
        Control::assemble(
            self.id,
            self.label,
            self.optional,
            self.parents,
            self.update,
            ControlData::TextField {
                data: self.data,
                validator: self.validator,
                validated: None,
            },
        )
    }
}

/// Bounded selection over a fixed list or a named producer.
pub struct ComboBox {
    items: ListItems,
    selected: i64,
    title: Option<TitleHook>,
    label: Option<String>,
    id: Option<ControlId>,
    parents: Vec<ControlId>,
    update: Option<UpdateHook>,
    optional: Option<bool>,
}

impl ComboBox {
    pub fn new(items: Vec<Value>) -> Self {
        Self::with_items(ListItems::Fixed(items))
    }

    pub fn producer(name: impl Into<String>, func: ProducerFn) -> Self {
        Self::with_items(ListItems::Producer {
            name: name.into(),
            func,
        })
    }

    fn with_items(items: ListItems) -> Self {
        Self {
            items,
            selected: 0,
            title: None,
            label: None,
            id: None,
            parents: Vec::new(),
            update: None,
            optional: None,
        }
    }

    pub fn selected(mut self, selected: i64) -> Self {
        self.selected = selected;
        self
    }

    pub fn title(mut self, hook: TitleHook) -> Self {
        self.title = Some(hook);
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    builder_common!();

    pub fn build(self) -> Control {
        Control::assemble(
            self.id,
            self.label,
            self.optional,
            self.parents,
            self.update,
            ControlData::ComboBox {
                items: self.items,
                selected: self.selected,
                title: self.title,
            },
        )
    }
}

/// Bounded numeric selection; never optional.
#[derive(Debug, Default)]
pub struct Slider {
    data: Vec<f64>,
    selected: i64,
    label: Option<String>,
    id: Option<ControlId>,
    parents: Vec<ControlId>,
    update: Option<UpdateHook>,
}

impl Slider {
    pub fn new(data: impl IntoIterator<Item = f64>) -> Self {
        Self {
            data: data.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn selected(mut self, selected: i64) -> Self {
        self.selected = selected;
        self
    }

    builder_common!();

    pub fn build(self) -> Control {
        Control::assemble(
            self.id,
            self.label,
            Some(false),
            self.parents,
            self.update,
            ControlData::Slider {
                data: self.data,
                selected: self.selected,
            },
        )
    }
}

/// Free-form byte input supplied by the caller.
#[derive(Debug)]
pub struct FileUpload {
    is_text: bool,
    label: Option<String>,
    id: Option<ControlId>,
    parents: Vec<ControlId>,
    update: Option<UpdateHook>,
    optional: Option<bool>,
}

impl FileUpload {
    pub fn new() -> Self {
        Self {
            is_text: true,
            label: None,
            id: None,
            parents: Vec::new(),
            update: None,
            optional: None,
        }
    }

    pub fn is_text(mut self, is_text: bool) -> Self {
        self.is_text = is_text;
        self
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    builder_common!();

    pub fn build(self) -> Control {
        Control::assemble(
            self.id,
            self.label,
            self.optional,
            self.parents,
            self.update,
            ControlData::FileUpload {
                is_text: self.is_text,
                content: None,
            },
        )
    }
}

impl Default for FileUpload {
    fn default() -> Self {
        Self::new()
    }
}

/// The gating control: enabled once every non-optional sibling resolves.
#[derive(Debug, Default)]
pub struct Apply {
    label: Option<String>,
    id: Option<ControlId>,
}

impl Apply {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(mut self, id: impl Into<ControlId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn build(self) -> Control {
        Control::assemble(
            self.id,
            self.label,
            Some(false),
            Vec::new(),
            None,
            ControlData::Apply,
        )
    }
}
