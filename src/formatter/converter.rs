//! Value to text conversion for CSV fields

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::store::Value;

/// Core trait for bin value conversion
///
/// Different strategies can render values for different outputs.
pub trait ValueConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a value to the output type
    fn convert(&self, value: &Value) -> Self::Output;

    /// Convert an optional value; a missing value converts to the default.
    fn convert_optional(&self, value: Option<&Value>) -> Self::Output
    where
        Self::Output: Default,
    {
        value.map(|v| self.convert(v)).unwrap_or_default()
    }
}

/// Plain text rendering used for exported CSV fields
///
/// - `Nil` is the empty string
/// - bytes are base64 (standard alphabet, padded)
/// - lists render as `[a, b]`, maps as `{k=v, k2=v2}`
/// - GeoJSON is kept verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn new() -> Self {
        Self
    }

    /// Encode raw bytes the way the `_digest` column and byte bins are written.
    pub fn encode_bytes(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    fn format_float(f: f64) -> String {
        if f.is_finite() {
            // Debug keeps a trailing `.0` on integral values.
            format!("{f:?}")
        } else if f.is_nan() {
            "NaN".to_string()
        } else if f.is_sign_positive() {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    }
}

impl ValueConverter for PlainTextConverter {
    type Output = String;

    fn convert(&self, value: &Value) -> String {
        match value {
            Value::Nil => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => Self::format_float(*f),
            Value::String(s) => s.clone(),
            Value::Bytes(bytes) => Self::encode_bytes(bytes),
            Value::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.convert(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}={}", self.convert(k), self.convert(v)))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Value::GeoJson(text) => text.clone(),
        }
    }
}
