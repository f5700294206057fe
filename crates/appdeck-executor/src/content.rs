//! Content contracts shared by the encoder and the execution engine.

use serde_json::Value;

/// A MIME pairing: the raw transfer type plus the application-level type
/// it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub content_type: String,
    pub application: String,
}

impl MediaType {
    pub fn new(content_type: impl Into<String>, application: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            application: application.into(),
        }
    }
}

/// An encoded payload: raw bytes, their media type, an optional human
/// description, and producer-specific settings.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub data: Vec<u8>,
    pub media_type: MediaType,
    pub description: Option<String>,
    pub settings: Value,
}

impl FrameData {
    pub fn new(data: Vec<u8>, media_type: MediaType) -> Self {
        Self {
            data,
            media_type,
            description: None,
            settings: Value::Null,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }
}

/// Turns a domain value into an encoded payload.
pub trait ValueEncoder {
    fn encode(&self, value: &Value, description: Option<&str>) -> FrameData;
}

/// Default encoder: the value as compact JSON text.
#[derive(Debug, Default)]
pub struct JsonValueEncoder;

impl ValueEncoder for JsonValueEncoder {
    fn encode(&self, value: &Value, description: Option<&str>) -> FrameData {
        let data = serde_json::to_vec(value).unwrap_or_default();
        let mut frame = FrameData::new(
            data,
            MediaType::new("application/json", "application/json"),
        );
        if let Some(description) = description {
            frame = frame.with_description(description);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_encoder_emits_compact_payload() {
        let frame = JsonValueEncoder.encode(&json!({"a": 1}), Some("result"));
        assert_eq!(frame.data, br#"{"a":1}"#);
        assert_eq!(frame.media_type.content_type, "application/json");
        assert_eq!(frame.description.as_deref(), Some("result"));
    }
}
