// Typed access to task payload fields
//
// Every accessor maps an absent or ill-typed field to
// `AgentError::InvalidPayload` so agents can use `?` throughout.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{AgentError, AgentResult};
use super::types::Payload;

/// A string field that must be present and non-blank
pub fn required_str<'a>(payload: &'a Payload, field: &str) -> AgentResult<&'a str> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(AgentError::missing_field(field)),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(AgentError::invalid_field(field, "must not be empty"))
        }
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err(AgentError::invalid_field(field, "must be a string")),
    }
}

/// A string field that may be absent; blank strings count as absent
pub fn optional_str<'a>(payload: &'a Payload, field: &str) -> AgentResult<Option<&'a str>> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(AgentError::invalid_field(field, "must be a string")),
    }
}

/// An unsigned integer field that may be absent
pub fn optional_u64(payload: &Payload, field: &str) -> AgentResult<Option<u64>> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| AgentError::invalid_field(field, "must be a non-negative integer")),
    }
}

/// A structured field that must be present
pub fn required<T: DeserializeOwned>(payload: &Payload, field: &str) -> AgentResult<T> {
    optional(payload, field)?.ok_or_else(|| AgentError::missing_field(field))
}

/// A structured field that may be absent
pub fn optional<T: DeserializeOwned>(payload: &Payload, field: &str) -> AgentResult<Option<T>> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| AgentError::invalid_field(field, format!("is malformed: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    #[test]
    fn required_str_rejects_missing_blank_and_wrong_type() {
        let p = payload(json!({"blank": "  ", "number": 3, "ok": "text"}));

        assert_eq!(required_str(&p, "ok").unwrap(), "text");
        assert!(matches!(required_str(&p, "absent"), Err(AgentError::InvalidPayload(_))));
        assert!(matches!(required_str(&p, "blank"), Err(AgentError::InvalidPayload(_))));
        assert!(matches!(required_str(&p, "number"), Err(AgentError::InvalidPayload(_))));
    }

    #[test]
    fn optional_str_treats_blank_as_absent() {
        let p = payload(json!({"blank": "", "ok": "x", "null": null}));

        assert_eq!(optional_str(&p, "ok").unwrap(), Some("x"));
        assert_eq!(optional_str(&p, "blank").unwrap(), None);
        assert_eq!(optional_str(&p, "null").unwrap(), None);
        assert_eq!(optional_str(&p, "absent").unwrap(), None);
    }

    #[test]
    fn optional_u64_rejects_negative() {
        let p = payload(json!({"count": 3, "neg": -1}));

        assert_eq!(optional_u64(&p, "count").unwrap(), Some(3));
        assert!(optional_u64(&p, "neg").is_err());
    }

    #[test]
    fn structured_fields_deserialize() {
        let p = payload(json!({"items": ["a", "b"], "bad": {"x": 1}}));

        let items: Vec<String> = required(&p, "items").unwrap();
        assert_eq!(items, vec!["a", "b"]);
        assert!(required::<Vec<String>>(&p, "bad").is_err());
        assert!(required::<Vec<String>>(&p, "absent").is_err());
        assert_eq!(optional::<Vec<String>>(&p, "absent").unwrap(), None);
    }
}
