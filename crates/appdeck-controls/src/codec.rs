//! Controller document codec.
//!
//! The serialized form is a plain JSON document: dependency edges are ids
//! and functions are registry names, so loading a document never patches
//! object references after the fact. Pending edits and dirty flags are not
//! persisted; a loaded controller starts fully dirty, exactly like a
//! freshly constructed one.

use serde_json::{json, Map, Value};

use crate::control::{Control, ControlData};
use crate::controller::{Controller, InvalidationPolicy};
use crate::error::ConfigurationError;
use crate::list_model::ListItems;
use crate::registry::{Registry, TitleHook, UpdateHook};
use crate::validate::{Validator, ValidatorKind};
use crate::ControlId;

impl Controller {
    /// Serializes the controller to its JSON document.
    pub fn to_value(&self) -> Value {
        json!({
            "policy": serde_json::to_value(self.policy()).unwrap_or(Value::Null),
            "order": self.order(),
            "controls": self.controls().map(pack_control).collect::<Vec<_>>(),
        })
    }

    /// Rebuilds a controller from its JSON document, resolving named
    /// functions against `registry`.
    pub fn from_value(source: &Value, registry: &Registry) -> Result<Self, ConfigurationError> {
        let root = source
            .as_object()
            .ok_or_else(|| invalid("document is not an object"))?;
        let policy = match root.get("policy") {
            None | Some(Value::Null) => InvalidationPolicy::default(),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|e| invalid(&format!("bad policy: {e}")))?,
        };
        let order = root
            .get("order")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("missing order"))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(ControlId::from)
                    .ok_or_else(|| invalid("order entries must be strings"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let controls = root
            .get("controls")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid("missing controls"))?
            .iter()
            .map(|v| unpack_control(v, registry))
            .collect::<Result<Vec<_>, _>>()?;
        Controller::from_parts(controls, order, policy)
    }
}

fn invalid(message: &str) -> ConfigurationError {
    ConfigurationError::InvalidDocument(message.to_string())
}

fn pack_control(control: &Control) -> Value {
    let mut record = Map::new();
    record.insert("id".into(), json!(control.id()));
    record.insert("type".into(), json!(control.kind_name()));
    record.insert("label".into(), json!(control.label()));
    record.insert("optional".into(), json!(control.optional()));
    record.insert("parents".into(), json!(control.parents()));
    record.insert(
        "update".into(),
        json!(control.update_hook().map(|h| h.name.clone())),
    );
    match control.data() {
        ControlData::TextField { data, validator, .. } => {
            record.insert("data".into(), json!(data));
            record.insert(
                "validator".into(),
                validator
                    .as_ref()
                    .map(|v| pack_validator(v.kind()))
                    .unwrap_or(Value::Null),
            );
        }
        ControlData::ComboBox { items, selected, title } => {
            record.insert("items".into(), pack_items(items));
            record.insert("selected".into(), json!(selected));
            record.insert("title".into(), json!(title.as_ref().map(|t| t.name.clone())));
        }
        ControlData::Slider { data, selected } => {
            record.insert("data".into(), json!(data));
            record.insert("selected".into(), json!(selected));
        }
        ControlData::FileUpload { is_text, .. } => {
            record.insert("is_text".into(), json!(is_text));
        }
        ControlData::Apply => {}
    }
    Value::Object(record)
}

fn pack_validator(kind: &ValidatorKind) -> Value {
    match kind {
        ValidatorKind::Int => json!({"kind": "int"}),
        ValidatorKind::Float => json!({"kind": "float"}),
        ValidatorKind::Named { name, .. } => json!({"kind": "named", "name": name}),
    }
}

fn pack_items(items: &ListItems) -> Value {
    match items {
        ListItems::Fixed(data) => json!({"kind": "fixed", "data": data}),
        ListItems::Producer { name, .. } => json!({"kind": "producer", "name": name}),
    }
}

fn unpack_control(source: &Value, registry: &Registry) -> Result<Control, ConfigurationError> {
    let record = source
        .as_object()
        .ok_or_else(|| invalid("control record is not an object"))?;
    let id = record
        .get("id")
        .and_then(Value::as_str)
        .map(ControlId::from)
        .ok_or_else(|| invalid("control record missing id"))?;
    let kind = record
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("control record missing type"))?;
    let label = record
        .get("label")
        .and_then(Value::as_str)
        .map(str::to_string);
    let optional = record.get("optional").and_then(Value::as_bool);
    let parents = record
        .get("parents")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .map(|v| {
                    v.as_str()
                        .map(ControlId::from)
                        .ok_or_else(|| invalid("parent ids must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    let update = record
        .get("update")
        .and_then(Value::as_str)
        .map(|name| {
            registry.update(name).map(|func| UpdateHook {
                name: name.to_string(),
                func,
            })
        })
        .transpose()?;

    let data = match kind {
        "TextField" => ControlData::TextField {
            data: record
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string),
            validator: record
                .get("validator")
                .filter(|v| !v.is_null())
                .map(|v| unpack_validator(v, registry))
                .transpose()?,
            validated: None,
        },
        "ComboBox" => ControlData::ComboBox {
            items: unpack_items(
                record.get("items").ok_or_else(|| invalid("missing items"))?,
                registry,
            )?,
            selected: record
                .get("selected")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            title: record
                .get("title")
                .and_then(Value::as_str)
                .map(|name| {
                    registry.title(name).map(|func| TitleHook {
                        name: name.to_string(),
                        func,
                    })
                })
                .transpose()?,
        },
        "Slider" => ControlData::Slider {
            data: record
                .get("data")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(Value::as_f64).collect())
                .unwrap_or_default(),
            selected: record
                .get("selected")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        },
        "FileUpload" => ControlData::FileUpload {
            is_text: record
                .get("is_text")
                .and_then(Value::as_bool)
                .unwrap_or(true),
            content: None,
        },
        "Apply" => ControlData::Apply,
        other => return Err(invalid(&format!("unsupported control type: {other}"))),
    };

    Ok(Control::assemble(
        Some(id),
        label,
        optional,
        parents,
        update,
        data,
    ))
}

fn unpack_validator(source: &Value, registry: &Registry) -> Result<Validator, ConfigurationError> {
    let kind = source
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("validator record missing kind"))?;
    match kind {
        "int" => Ok(Validator::int()),
        "float" => Ok(Validator::float()),
        "named" => {
            let name = source
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("named validator missing name"))?;
            Ok(Validator::named(name, registry.validator(name)?))
        }
        other => Err(invalid(&format!("unsupported validator kind: {other}"))),
    }
}

fn unpack_items(source: &Value, registry: &Registry) -> Result<ListItems, ConfigurationError> {
    let kind = source
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("items record missing kind"))?;
    match kind {
        "fixed" => Ok(ListItems::Fixed(
            source
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        )),
        "producer" => {
            let name = source
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("producer items missing name"))?;
            Ok(ListItems::Producer {
                name: name.to_string(),
                func: registry.producer(name)?,
            })
        }
        other => Err(invalid(&format!("unsupported items kind: {other}"))),
    }
}
