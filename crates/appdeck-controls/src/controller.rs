//! The control arena and the update propagation algorithm.
//!
//! Resolution is demand-driven: a control's parents resolve to completion
//! before its own update function runs, and the dirty flag is the only
//! recompute trigger. A node becomes dirty when it is freshly constructed
//! or when a new edit is queued onto it; a parent's data changing does not
//! by itself invalidate a child (see [`InvalidationPolicy`]).

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::control::{Apply, Control, ControlData};
use crate::error::{ConfigurationError, ControlError};
use crate::registry::AppFn;
use crate::view::View;
use crate::ControlId;

/// What queueing an edit invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Only the edited control recomputes. Downstream controls keep their
    /// memoized state until they receive an edit of their own.
    #[default]
    EditOnly,
    /// Queueing an edit also marks every transitive descendant dirty.
    Transitive,
}

pub struct Controller {
    controls: IndexMap<ControlId, Control>,
    /// Registration order of the supplied controls; a synthesized Apply is
    /// not part of it, so `apply` argument order matches what the caller
    /// registered.
    order: Vec<ControlId>,
    policy: InvalidationPolicy,
}

impl Controller {
    pub fn new(controls: Vec<Control>) -> Result<Self, ConfigurationError> {
        Self::with_policy(controls, InvalidationPolicy::default())
    }

    pub fn with_policy(
        controls: Vec<Control>,
        policy: InvalidationPolicy,
    ) -> Result<Self, ConfigurationError> {
        let order: Vec<ControlId> = controls.iter().map(|c| c.id().clone()).collect();
        let mut arena: IndexMap<ControlId, Control> = IndexMap::with_capacity(controls.len() + 1);

        let mut requires_apply = false;
        let mut has_apply = false;
        for control in controls {
            requires_apply = requires_apply || control.requires_apply();
            if matches!(control.data(), ControlData::Apply) {
                if has_apply {
                    return Err(ConfigurationError::DuplicateApply);
                }
                has_apply = true;
            }
            let id = control.id().clone();
            if arena.insert(id.clone(), control).is_some() {
                return Err(ConfigurationError::DuplicateId(id));
            }
        }

        for (id, control) in &arena {
            for parent in control.parents() {
                if !arena.contains_key(parent) {
                    return Err(ConfigurationError::UnknownParent {
                        control: id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        check_acyclic(&arena)?;

        if requires_apply && !has_apply {
            let apply = Apply::new().build();
            arena.insert(apply.id().clone(), apply);
        }

        Ok(Self {
            controls: arena,
            order,
            policy,
        })
    }

    /// Rebuilds a controller from deserialized parts; the Apply control, if
    /// required, is already present in `controls`.
    pub(crate) fn from_parts(
        controls: Vec<Control>,
        order: Vec<ControlId>,
        policy: InvalidationPolicy,
    ) -> Result<Self, ConfigurationError> {
        let mut controller = Self::with_policy(controls, policy)?;
        for id in &order {
            if !controller.controls.contains_key(id) {
                return Err(ConfigurationError::InvalidDocument(format!(
                    "order references unknown control {id}"
                )));
            }
        }
        controller.order = order;
        Ok(controller)
    }

    pub fn policy(&self) -> InvalidationPolicy {
        self.policy
    }

    /// Registration order of the supplied controls.
    pub fn order(&self) -> &[ControlId] {
        &self.order
    }

    pub fn control(&self, id: &ControlId) -> Option<&Control> {
        self.controls.get(id)
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Queues the supplied edits, then snapshots every control in insertion
    /// order. This is the one pull entry point for refreshing the form.
    pub fn list(&mut self, views: &[View]) -> Result<Vec<View>, ControlError> {
        for view in views {
            self.queue_view(view.clone())?;
        }
        let ids: Vec<ControlId> = self.controls.keys().cloned().collect();
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in &ids {
            snapshots.push(self.view_of(id)?);
        }
        Ok(snapshots)
    }

    /// Queues the supplied edits, resolves every registered control's value
    /// in registration order, and invokes `func` positionally.
    pub fn apply(&mut self, func: &AppFn, views: &[View]) -> Result<Value, ControlError> {
        for view in views {
            self.queue_view(view.clone())?;
        }
        let order = self.order.clone();
        let mut values = Vec::with_capacity(order.len());
        for id in &order {
            values.push(self.value_of(id)?);
        }
        (func)(&values).map_err(|e| ControlError::Function(e.to_string()))
    }

    /// Resolves one control's current value, updating it (and its ancestry)
    /// first.
    pub fn value_of(&mut self, id: &ControlId) -> Result<Option<Value>, ControlError> {
        self.update(id)?;
        self.controls
            .get(id)
            .ok_or_else(|| ControlError::UnknownControl(id.clone()))?
            .current_value()
    }

    /// Resolves one control's current view, updating it first. For the
    /// Apply control this scans every sibling's value to compute the gate.
    pub fn view_of(&mut self, id: &ControlId) -> Result<View, ControlError> {
        self.update(id)?;
        let control = self
            .controls
            .get(id)
            .ok_or_else(|| ControlError::UnknownControl(id.clone()))?;
        if !matches!(control.data(), ControlData::Apply) {
            return control.render_view();
        }

        let siblings: Vec<ControlId> = self
            .controls
            .keys()
            .filter(|other| *other != id)
            .cloned()
            .collect();
        let mut enabled = true;
        for sibling in &siblings {
            let optional = self
                .controls
                .get(sibling)
                .map(Control::effective_optional)
                .unwrap_or(false);
            if !optional && self.value_of(sibling)?.is_none() {
                enabled = false;
                break;
            }
        }
        let control = self
            .controls
            .get(id)
            .ok_or_else(|| ControlError::UnknownControl(id.clone()))?;
        Ok(View::ApplyView {
            id: id.clone(),
            enabled,
            label: control.label().map(str::to_string),
            optional: false,
        })
    }

    fn queue_view(&mut self, view: View) -> Result<(), ControlError> {
        let id = view.id().clone();
        let control = self
            .controls
            .get_mut(&id)
            .ok_or_else(|| ControlError::UnknownControl(id.clone()))?;
        control.queue(view)?;
        if self.policy == InvalidationPolicy::Transitive {
            self.mark_descendants_dirty(&id);
        }
        Ok(())
    }

    /// The update propagation algorithm: absorb any pending edit, then run
    /// the update function once parents have resolved, guarded by the dirty
    /// flag. A failed update function leaves the flag set, so it is retried
    /// on the next resolution.
    fn update(&mut self, id: &ControlId) -> Result<(), ControlError> {
        {
            let control = self
                .controls
                .get_mut(id)
                .ok_or_else(|| ControlError::UnknownControl(id.clone()))?;
            if let Some(view) = control.pending.take() {
                control.absorb(view);
                control.dirty = true;
            }
        }

        let (has_update, parents) = {
            let control = self
                .controls
                .get(id)
                .ok_or_else(|| ControlError::UnknownControl(id.clone()))?;
            (control.update.is_some(), control.parents.clone())
        };
        if !has_update {
            return Ok(());
        }

        for parent in &parents {
            self.update(parent)?;
        }

        let dirty = self
            .controls
            .get(id)
            .ok_or_else(|| ControlError::UnknownControl(id.clone()))?
            .dirty;
        if !dirty {
            return Ok(());
        }

        let mut snapshots: Vec<ControlData> = Vec::with_capacity(parents.len());
        for parent in &parents {
            let data = self
                .controls
                .get(parent)
                .ok_or_else(|| ControlError::UnknownControl(parent.clone()))?
                .data()
                .clone();
            snapshots.push(data);
        }

        let control = self
            .controls
            .get_mut(id)
            .ok_or_else(|| ControlError::UnknownControl(id.clone()))?;
        if let Some(hook) = control.update.clone() {
            trace!("running update {} for control {}", hook.name, id);
            (hook.func)(&mut control.data, &snapshots).map_err(|e| ControlError::Update {
                id: id.clone(),
                message: e.to_string(),
            })?;
            control.dirty = false;
        }
        Ok(())
    }

    fn mark_descendants_dirty(&mut self, id: &ControlId) {
        let mut reached: HashSet<ControlId> = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let children: Vec<ControlId> = self
                .controls
                .iter()
                .filter(|(_, c)| c.parents().contains(&current))
                .map(|(cid, _)| cid.clone())
                .collect();
            for child in children {
                if reached.insert(child.clone()) {
                    stack.push(child);
                }
            }
        }
        for child in reached {
            if let Some(control) = self.controls.get_mut(&child) {
                control.dirty = true;
            }
        }
    }
}

fn check_acyclic(arena: &IndexMap<ControlId, Control>) -> Result<(), ConfigurationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    fn visit(
        id: &ControlId,
        arena: &IndexMap<ControlId, Control>,
        marks: &mut HashMap<ControlId, Mark>,
    ) -> Result<(), ConfigurationError> {
        match marks.get(id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Active) => return Err(ConfigurationError::DependencyCycle(id.clone())),
            None => {}
        }
        marks.insert(id.clone(), Mark::Active);
        if let Some(control) = arena.get(id) {
            for parent in control.parents() {
                visit(parent, arena, marks)?;
            }
        }
        marks.insert(id.clone(), Mark::Done);
        Ok(())
    }

    let mut marks = HashMap::new();
    for id in arena.keys() {
        visit(id, arena, &mut marks)?;
    }
    Ok(())
}
