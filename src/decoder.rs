use crate::error::DecodeError;
use crate::types::ScanResult;
use serde_json::Value;

/// A stream payload turned into a device map plus the forms the renderer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub result: ScanResult,
    /// Two-space indented JSON; this is what the live view and history show.
    /// Numbers keep the spelling serde_json gives them, so `1.0` stays `1.0`
    /// instead of collapsing to `1`.
    pub pretty: String,
    pub device_count: usize,
}

/// Decode one event payload.
///
/// The payload must be a JSON object. Key order is preserved, and a repeated
/// key keeps its last value, so `device_count` equals the number of distinct keys.
pub fn decode(payload: &str) -> Result<DecodedEvent, DecodeError> {
    let value: Value = serde_json::from_str(payload)?;
    let result = match value {
        Value::Object(map) => map,
        other => return Err(DecodeError::NotAnObject(kind_of(&other))),
    };
    let pretty = serde_json::to_string_pretty(&result)?;
    let device_count = result.len();
    Ok(DecodedEvent {
        result,
        pretty,
        device_count,
    })
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_keys_and_pretty_prints() {
        let ev = decode(r#"{"a":1,"b":2}"#).unwrap();
        assert_eq!(ev.device_count, 2);
        assert_eq!(ev.pretty, "{\n  \"a\": 1,\n  \"b\": 2\n}");
    }

    #[test]
    fn empty_object_is_zero_devices() {
        let ev = decode("{}").unwrap();
        assert_eq!(ev.device_count, 0);
        assert_eq!(ev.pretty, "{}");
    }

    #[test]
    fn keeps_arrival_key_order() {
        let ev = decode(r#"{"zz:01":"phone","aa:02":"watch"}"#).unwrap();
        let keys: Vec<&str> = ev.result.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zz:01", "aa:02"]);
    }

    #[test]
    fn duplicate_keys_count_once() {
        let ev = decode(r#"{"a":1,"a":2}"#).unwrap();
        assert_eq!(ev.device_count, 1);
        assert_eq!(ev.result["a"], 2);
    }

    #[test]
    fn float_values_keep_their_fraction() {
        let ev = decode(r#"{"a":1.0,"b":-0.5,"c":1e3}"#).unwrap();
        assert_eq!(ev.pretty, "{\n  \"a\": 1.0,\n  \"b\": -0.5,\n  \"c\": 1000.0\n}");
    }

    #[test]
    fn rejects_non_json() {
        assert!(matches!(decode("not json"), Err(DecodeError::Json(_))));
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(decode("[1,2]"), Err(DecodeError::NotAnObject("array"))));
        assert!(matches!(decode("42"), Err(DecodeError::NotAnObject("number"))));
        assert!(matches!(decode("null"), Err(DecodeError::NotAnObject("null"))));
    }
}
