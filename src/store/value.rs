//! Bin values
//!
//! The store is schema-less; every bin holds one of a closed set of value
//! kinds. Rendering to text lives in [`crate::formatter::PlainTextConverter`].

/// A bin value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Ordered key/value pairs; keys are values too.
    Map(Vec<(Value, Value)>),
    /// GeoJSON text, kept verbatim.
    GeoJson(String),
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<serde_json::Value> for Value {
    /// JSON objects of the form `{"$bytes": "<hex>"}` become [`Value::Bytes`]
    /// and `{"$geojson": {...}}` becomes [`Value::GeoJson`].
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Nil,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some(Json::String(encoded)) = map.get("$bytes") {
                        if let Ok(bytes) = hex::decode(encoded) {
                            return Value::Bytes(bytes);
                        }
                    }
                    if let Some(geo) = map.get("$geojson") {
                        return Value::GeoJson(geo.to_string());
                    }
                }
                Value::Map(
                    map.into_iter()
                        .map(|(k, v)| (Value::String(k), Value::from(v)))
                        .collect(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from(json!(null)), Value::Nil);
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(json!("x")), Value::String("x".to_string()));
        assert_eq!(Value::from(json!(true)), Value::Bool(true));
    }

    #[test]
    fn test_from_json_tagged_objects() {
        assert_eq!(
            Value::from(json!({"$bytes": "0aff"})),
            Value::Bytes(vec![0x0a, 0xff])
        );
        let geo = Value::from(json!({"$geojson": {"type": "Point", "coordinates": [1, 2]}}));
        assert!(matches!(geo, Value::GeoJson(_)));
    }

    #[test]
    fn test_from_json_nested() {
        let value = Value::from(json!({"k": [1, "two"]}));
        assert_eq!(
            value,
            Value::Map(vec![(
                Value::String("k".to_string()),
                Value::List(vec![Value::Int(1), Value::String("two".to_string())])
            )])
        );
    }
}
