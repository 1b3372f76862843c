//! Frame validation and decoding
//!
//! Decoding is pure: every failure comes back as a [`DecodeError`] so the
//! caller decides how to surface it. Checks run in a fixed order. The payload
//! must parse as JSON, then be an object, then carry the fields its event
//! type requires.

use crate::error::DecodeError;
use crate::event::{EventKind, Frame, StreamEvent};
use crate::types::{ComponentType, Role};
use serde_json::{Map, Value};

/// Decode the payload of an event with a known kind
pub fn decode(kind: EventKind, data: &str) -> Result<StreamEvent, DecodeError> {
    let value: Value = serde_json::from_str(data)
        .map_err(|source| DecodeError::MalformedPayload { event: kind, source })?;

    let record = match value {
        Value::Object(record) => record,
        other => {
            return Err(DecodeError::UnexpectedShape {
                event: kind,
                found: json_type_name(&other),
            });
        }
    };

    let fields = Fields { kind, record };
    let message_id = fields.required_str("messageId")?;

    let event = match kind {
        EventKind::MessageStart => {
            let role = Role::parse(&fields.required_str("role")?)
                .ok_or_else(|| fields.missing("role"))?;
            StreamEvent::MessageStart { message_id, role }
        }
        EventKind::TextChunk => StreamEvent::TextChunk {
            message_id,
            chunk: fields.defined_text("chunk")?,
        },
        EventKind::ComponentStart => StreamEvent::ComponentStart {
            message_id,
            component_type: ComponentType::from_label(&fields.required_str("componentType")?),
        },
        EventKind::ComponentField => StreamEvent::ComponentField {
            message_id,
            field: fields.required_str("field")?,
            value: fields.defined_text("value")?,
        },
        EventKind::ComponentEnd => StreamEvent::ComponentEnd { message_id },
        EventKind::MessageEnd => StreamEvent::MessageEnd { message_id },
    };

    Ok(event)
}

/// Decode a raw frame.
///
/// Returns `Ok(None)` for frames whose label is not a protocol event; those
/// are not failures, the stream is free to carry other traffic.
pub fn decode_frame(frame: &Frame) -> Result<Option<StreamEvent>, DecodeError> {
    match frame.kind() {
        Some(kind) => decode(kind, &frame.data).map(Some),
        None => {
            tracing::trace!(event = %frame.event, "ignoring unknown event label");
            Ok(None)
        }
    }
}

struct Fields {
    kind: EventKind,
    record: Map<String, Value>,
}

impl Fields {
    fn missing(&self, name: &'static str) -> DecodeError {
        DecodeError::IncompleteEvent {
            event: self.kind,
            missing: name,
        }
    }

    /// A field that must be a non-empty string
    fn required_str(&self, name: &'static str) -> Result<String, DecodeError> {
        match self.record.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(self.missing(name)),
        }
    }

    /// A field that only has to be present; its value is coerced to text
    fn defined_text(&self, name: &'static str) -> Result<String, DecodeError> {
        match self.record.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Null) => Ok(String::new()),
            Some(other) => Ok(other.to_string()),
            None => Err(self.missing(name)),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
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
    use crate::error::FailureKind;

    fn kind_of(result: Result<StreamEvent, DecodeError>) -> FailureKind {
        result.expect_err("expected a decode failure").kind()
    }

    #[test]
    fn test_message_start() {
        let event = decode(
            EventKind::MessageStart,
            r#"{"messageId":"m1","role":"agent"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::MessageStart {
                message_id: "m1".into(),
                role: Role::Agent
            }
        );
    }

    #[test]
    fn test_malformed_json() {
        assert_eq!(
            kind_of(decode(EventKind::TextChunk, "{not json")),
            FailureKind::MalformedPayload
        );
        assert_eq!(
            kind_of(decode(EventKind::TextChunk, "")),
            FailureKind::MalformedPayload
        );
    }

    #[test]
    fn test_non_object_payloads() {
        for data in ["null", "42", "\"m1\"", "true", r#"[{"messageId":"m1"}]"#] {
            assert_eq!(
                kind_of(decode(EventKind::MessageEnd, data)),
                FailureKind::UnexpectedShape,
                "payload {data}"
            );
        }
        let err = decode(EventKind::MessageEnd, "[]").unwrap_err();
        assert!(err.to_string().contains("got array"), "got: {err}");
    }

    #[test]
    fn test_message_id_required_everywhere() {
        for kind in EventKind::ALL {
            let err = decode(kind, r#"{"role":"agent","chunk":"x"}"#).unwrap_err();
            assert!(
                matches!(err, DecodeError::IncompleteEvent { missing: "messageId", .. }),
                "{kind}: {err}"
            );
        }
    }

    #[test]
    fn test_empty_or_non_string_message_id() {
        assert_eq!(
            kind_of(decode(EventKind::MessageEnd, r#"{"messageId":""}"#)),
            FailureKind::IncompleteEvent
        );
        assert_eq!(
            kind_of(decode(EventKind::MessageEnd, r#"{"messageId":null}"#)),
            FailureKind::IncompleteEvent
        );
    }

    #[test]
    fn test_message_start_requires_known_role() {
        assert_eq!(
            kind_of(decode(EventKind::MessageStart, r#"{"messageId":"m1"}"#)),
            FailureKind::IncompleteEvent
        );
        assert_eq!(
            kind_of(decode(
                EventKind::MessageStart,
                r#"{"messageId":"m1","role":"robot"}"#
            )),
            FailureKind::IncompleteEvent
        );
    }

    #[test]
    fn test_text_chunk_allows_empty_chunk() {
        let event = decode(EventKind::TextChunk, r#"{"messageId":"m1","chunk":""}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::TextChunk {
                message_id: "m1".into(),
                chunk: String::new()
            }
        );
        assert_eq!(
            kind_of(decode(EventKind::TextChunk, r#"{"messageId":"m1"}"#)),
            FailureKind::IncompleteEvent
        );
    }

    #[test]
    fn test_component_start() {
        let event = decode(
            EventKind::ComponentStart,
            r#"{"messageId":"m1","componentType":"contact_badge"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::ComponentStart {
                message_id: "m1".into(),
                component_type: ComponentType::ContactBadge
            }
        );
        assert_eq!(
            kind_of(decode(EventKind::ComponentStart, r#"{"messageId":"m1"}"#)),
            FailureKind::IncompleteEvent
        );
    }

    #[test]
    fn test_component_field_value_coercion() {
        let decode_value = |raw: &str| match decode(
            EventKind::ComponentField,
            &format!(r#"{{"messageId":"m1","field":"seats","value":{raw}}}"#),
        )
        .unwrap()
        {
            StreamEvent::ComponentField { value, .. } => value,
            other => panic!("expected ComponentField, got {:?}", other),
        };

        assert_eq!(decode_value("\"3\""), "3");
        assert_eq!(decode_value("3"), "3");
        assert_eq!(decode_value("false"), "false");
        assert_eq!(decode_value("null"), "");
    }

    #[test]
    fn test_component_field_requires_field_and_value() {
        assert_eq!(
            kind_of(decode(
                EventKind::ComponentField,
                r#"{"messageId":"m1","value":"x"}"#
            )),
            FailureKind::IncompleteEvent
        );
        assert_eq!(
            kind_of(decode(
                EventKind::ComponentField,
                r#"{"messageId":"m1","field":"title"}"#
            )),
            FailureKind::IncompleteEvent
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let event = decode(
            EventKind::ComponentEnd,
            r#"{"messageId":"m1","seq":7,"extra":{"a":1}}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            StreamEvent::ComponentEnd {
                message_id: "m1".into()
            }
        );
    }

    #[test]
    fn test_decode_frame_skips_unknown_labels() {
        assert!(decode_frame(&Frame::new("heartbeat", "not json")).unwrap().is_none());
        assert!(
            decode_frame(&Frame::new("message_end", r#"{"messageId":"m1"}"#))
                .unwrap()
                .is_some()
        );
        assert!(decode_frame(&Frame::new("message_end", "oops")).is_err());
    }
}
