//! Named function tables.
//!
//! Closures cannot travel inside a serialized controller, so every function
//! a control graph needs — update hooks, custom validators, combo-box item
//! producers, title derivations, and the target app functions themselves —
//! is registered under a stable name. The serialized document stores names;
//! deserialization resolves them against a [`Registry`] supplied by the
//! host.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::control::ControlData;
use crate::error::ConfigurationError;

/// Error type surfaced by user-supplied functions.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Update function: mutates the control's own data given parent snapshots.
pub type UpdateFn = Arc<dyn Fn(&mut ControlData, &[ControlData]) -> Result<(), HookError> + Send + Sync>;

/// Custom validator: converts raw text into a domain value.
pub type ValidateFn = Arc<dyn Fn(&str) -> Result<Value, HookError> + Send + Sync>;

/// Combo-box item producer.
pub type ProducerFn = Arc<dyn Fn() -> Result<Vec<Value>, HookError> + Send + Sync>;

/// Title derivation for one combo-box element.
pub type TitleFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Target app function, invoked positionally with resolved control values.
pub type AppFn = Arc<dyn Fn(&[Option<Value>]) -> Result<Value, HookError> + Send + Sync>;

/// A named update function attached to a control.
#[derive(Clone)]
pub struct UpdateHook {
    pub name: String,
    pub func: UpdateFn,
}

impl UpdateHook {
    pub fn named(
        name: impl Into<String>,
        func: impl Fn(&mut ControlData, &[ControlData]) -> Result<(), HookError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for UpdateHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateHook").field("name", &self.name).finish()
    }
}

/// A named title function attached to a combo box.
#[derive(Clone)]
pub struct TitleHook {
    pub name: String,
    pub func: TitleFn,
}

impl TitleHook {
    pub fn named(name: impl Into<String>, func: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for TitleHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TitleHook").field("name", &self.name).finish()
    }
}

/// Name → function tables, injected wherever a serialized controller or app
/// manifest must be brought back to life.
#[derive(Default, Clone)]
pub struct Registry {
    updates: HashMap<String, UpdateFn>,
    validators: HashMap<String, ValidateFn>,
    producers: HashMap<String, ProducerFn>,
    titles: HashMap<String, TitleFn>,
    functions: HashMap<String, AppFn>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with named aliases of the built-in
    /// validators, for documents that reference them by name.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_validator("builtin.int", |raw| {
            Ok(Value::from(raw.trim().parse::<i64>()?))
        });
        registry.register_validator("builtin.float", |raw| {
            Ok(Value::from(raw.trim().parse::<f64>()?))
        });
        registry
    }

    pub fn register_update(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&mut ControlData, &[ControlData]) -> Result<(), HookError> + Send + Sync + 'static,
    ) {
        self.updates.insert(name.into(), Arc::new(func));
    }

    pub fn register_validator(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&str) -> Result<Value, HookError> + Send + Sync + 'static,
    ) {
        self.validators.insert(name.into(), Arc::new(func));
    }

    pub fn register_producer(
        &mut self,
        name: impl Into<String>,
        func: impl Fn() -> Result<Vec<Value>, HookError> + Send + Sync + 'static,
    ) {
        self.producers.insert(name.into(), Arc::new(func));
    }

    pub fn register_title(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&Value) -> String + Send + Sync + 'static,
    ) {
        self.titles.insert(name.into(), Arc::new(func));
    }

    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&[Option<Value>]) -> Result<Value, HookError> + Send + Sync + 'static,
    ) {
        self.functions.insert(name.into(), Arc::new(func));
    }

    pub fn update(&self, name: &str) -> Result<UpdateFn, ConfigurationError> {
        self.updates
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction(name.to_string()))
    }

    pub fn validator(&self, name: &str) -> Result<ValidateFn, ConfigurationError> {
        self.validators
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction(name.to_string()))
    }

    pub fn producer(&self, name: &str) -> Result<ProducerFn, ConfigurationError> {
        self.producers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction(name.to_string()))
    }

    pub fn title(&self, name: &str) -> Result<TitleFn, ConfigurationError> {
        self.titles
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction(name.to_string()))
    }

    pub fn function(&self, name: &str) -> Result<AppFn, ConfigurationError> {
        self.functions
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFunction(name.to_string()))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("updates", &self.updates.keys().collect::<Vec<_>>())
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("producers", &self.producers.keys().collect::<Vec<_>>())
            .field("titles", &self.titles.keys().collect::<Vec<_>>())
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_name_is_a_configuration_error() {
        let registry = Registry::new();
        assert!(matches!(
            registry.update("nope"),
            Err(ConfigurationError::UnknownFunction(name)) if name == "nope"
        ));
    }

    #[test]
    fn builtin_validators_parse() {
        let registry = Registry::with_builtins();
        let int = registry.validator("builtin.int").unwrap();
        assert_eq!(int("42").unwrap(), Value::from(42));
        assert!(int("abc").is_err());
        let float = registry.validator("builtin.float").unwrap();
        assert_eq!(float("2.5").unwrap(), Value::from(2.5));
    }
}
