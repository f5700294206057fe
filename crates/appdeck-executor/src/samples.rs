//! Sample hooks and target functions for the reference runner.

use serde_json::Value;

use appdeck_controls::Registry;

use crate::runner::CAPTURED_FUNCTION;

/// Registers every sample under its durable name. `samples.sum` also backs
/// the captured-binary entry point.
pub fn register(registry: &mut Registry) {
    registry.register_update("samples.double_text", |data, parents| {
        let n: i64 = parents
            .first()
            .and_then(|p| p.text())
            .unwrap_or("0")
            .trim()
            .parse()?;
        data.set_text((n * 2).to_string());
        Ok(())
    });

    registry.register_function("samples.sum", sum);
    registry.register_function(CAPTURED_FUNCTION, sum);

    registry.register_function("samples.join", |values| {
        let joined = values
            .iter()
            .map(|value| match value {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Value::String(joined))
    });

    registry.register_function("samples.fail", |_| Err("sample failure".into()));
}

fn sum(values: &[Option<Value>]) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
    let mut total = 0i64;
    for value in values.iter().flatten() {
        total += match value {
            Value::Number(n) => n.as_i64().unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        };
    }
    Ok(Value::from(total))
}
