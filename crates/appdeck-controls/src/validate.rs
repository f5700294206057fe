//! Input validation for free-form controls.
//!
//! A [`Validator`] is a stateless conversion from raw text to a domain
//! value, bound to its owning control id exactly once when the control is
//! built. Validation runs when an edit is queued, never during graph
//! resolution, and a failure leaves the control's prior state untouched.

use std::fmt;

use serde_json::Value;

use crate::error::ControlError;
use crate::registry::ValidateFn;
use crate::ControlId;

#[derive(Clone)]
pub enum ValidatorKind {
    Int,
    Float,
    Named { name: String, func: ValidateFn },
}

impl fmt::Debug for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("Int"),
            Self::Float => f.write_str("Float"),
            Self::Named { name, .. } => f.debug_struct("Named").field("name", name).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    owner: Option<ControlId>,
    kind: ValidatorKind,
}

impl Validator {
    pub fn int() -> Self {
        Self {
            owner: None,
            kind: ValidatorKind::Int,
        }
    }

    pub fn float() -> Self {
        Self {
            owner: None,
            kind: ValidatorKind::Float,
        }
    }

    pub fn named(name: impl Into<String>, func: ValidateFn) -> Self {
        Self {
            owner: None,
            kind: ValidatorKind::Named {
                name: name.into(),
                func,
            },
        }
    }

    pub fn kind(&self) -> &ValidatorKind {
        &self.kind
    }

    pub fn owner(&self) -> Option<&ControlId> {
        self.owner.as_ref()
    }

    /// Binds the validator to its owning control. Called once, at build time.
    pub(crate) fn bind(&mut self, id: &ControlId) {
        self.owner = Some(id.clone());
    }

    /// Converts raw text, wrapping any failure with the owning control's id.
    pub fn validate(&self, raw: &str) -> Result<Value, ControlError> {
        let id = self
            .owner
            .clone()
            .unwrap_or_else(|| ControlId::new("<unbound>"));
        let wrap = |message: String| ControlError::Validation { id: id.clone(), message };
        match &self.kind {
            ValidatorKind::Int => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|e| wrap(e.to_string())),
            ValidatorKind::Float => raw
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|e| wrap(e.to_string())),
            ValidatorKind::Named { func, .. } => (func)(raw).map_err(|e| wrap(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(mut validator: Validator) -> Validator {
        validator.bind(&ControlId::new("field"));
        validator
    }

    #[test]
    fn int_validator_parses_and_wraps_failures() {
        let validator = bound(Validator::int());
        assert_eq!(validator.validate("10").unwrap(), Value::from(10));
        match validator.validate("abc") {
            Err(ControlError::Validation { id, .. }) => assert_eq!(id.as_str(), "field"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn float_validator_parses() {
        let validator = bound(Validator::float());
        assert_eq!(validator.validate(" 1.5 ").unwrap(), Value::from(1.5));
    }

    #[test]
    fn named_validator_runs_custom_conversion() {
        let func: ValidateFn = std::sync::Arc::new(|raw| Ok(Value::from(raw.to_uppercase())));
        let validator = bound(Validator::named("upper", func));
        assert_eq!(validator.validate("ab").unwrap(), Value::from("AB"));
    }
}
