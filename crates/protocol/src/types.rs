//! Core types shared across the protocol

use serde::{Deserialize, Serialize};

/// An image attachment for a prompt.
///
/// `input_type` is either `"path"` (value is a filesystem path the backend
/// can read) or `"data"` (value is a `data:` URI carrying base64 content).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    #[serde(rename = "type")]
    pub input_type: String,
    pub value: String,
}

impl ImageInput {
    pub fn path(value: impl Into<String>) -> Self {
        Self {
            input_type: "path".to_string(),
            value: value.into(),
        }
    }

    pub fn data_uri(value: impl Into<String>) -> Self {
        Self {
            input_type: "data".to_string(),
            value: value.into(),
        }
    }
}

/// Token usage telemetry reported by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default)]
    pub context_window: u64,
}

impl TokenUsage {
    /// Calculate context fill percentage
    pub fn context_fill_percent(&self) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        (self.input_tokens as f64 / self.context_window as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_fill_handles_zero_window() {
        let usage = TokenUsage::default();
        assert_eq!(usage.context_fill_percent(), 0.0);
    }

    #[test]
    fn context_fill_percent() {
        let usage = TokenUsage {
            input_tokens: 50_000,
            output_tokens: 0,
            cached_tokens: 0,
            context_window: 200_000,
        };
        assert_eq!(usage.context_fill_percent(), 25.0);
    }

    #[test]
    fn image_input_serializes_with_type_field() {
        let img = ImageInput::data_uri("data:image/png;base64,AAAA");
        let json = serde_json::to_value(&img).expect("serialize");
        assert_eq!(json["type"], "data");
        assert_eq!(json["value"], "data:image/png;base64,AAAA");
    }
}
