//! Combo-box item strategies.
//!
//! Items come either as a fixed list or from a named zero-argument producer
//! resolved through the registry. Titles use the explicit title function if
//! one is attached, else each element's natural string form.

use serde_json::Value;

use crate::registry::{HookError, ProducerFn, TitleHook};

#[derive(Clone)]
pub enum ListItems {
    Fixed(Vec<Value>),
    Producer { name: String, func: ProducerFn },
}

impl std::fmt::Debug for ListItems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(items) => f.debug_tuple("Fixed").field(&items.len()).finish(),
            Self::Producer { name, .. } => f.debug_struct("Producer").field("name", name).finish(),
        }
    }
}

impl ListItems {
    pub fn resolve(&self) -> Result<Vec<Value>, HookError> {
        match self {
            Self::Fixed(items) => Ok(items.clone()),
            Self::Producer { func, .. } => (func)(),
        }
    }
}

/// The natural string form of one element: the bare text of a JSON string,
/// the JSON rendering of anything else.
pub fn natural_title(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn titles(items: &[Value], title: Option<&TitleHook>) -> Vec<String> {
    items
        .iter()
        .map(|item| match title {
            Some(hook) => (hook.func)(item),
            None => natural_title(item),
        })
        .collect()
}
