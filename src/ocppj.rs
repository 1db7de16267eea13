use crate::errors::{EngineError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The first element of every OCPP-J array frame (OCPP 1.6-J Part 4 ,Appendix).
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize, Deserialize, Default)]
#[serde(into = "i32", try_from = "i32")]
pub enum MessageTypeId {
    #[default]
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

impl TryFrom<i32> for MessageTypeId {
    type Error = String;
    fn try_from(i: i32) -> Result<Self, Self::Error> {
        match i {
            2 => Ok(MessageTypeId::Call),
            3 => Ok(MessageTypeId::CallResult),
            4 => Ok(MessageTypeId::CallError),
            other => Err(format!("unknown messageTypeId {other}")),
        }
    }
}

impl From<MessageTypeId> for i32 {
    fn from(val: MessageTypeId) -> Self {
        val as i32
    }
}

/// An outgoing CALL: `[2, messageId, action, payload]`.
///
/// `payload` is a plain [`serde_json::Value`] rather than a typetag-based trait object: OCPP-J
/// payloads must serialize bit-exact to the schema, and a typetag discriminator would inject a
/// `"type"` field that no CSMS implementation expects.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Call {
    pub message_type_id: MessageTypeId,
    pub message_id: String,
    pub action: String,
    pub payload: Value,
}

impl Call {
    pub fn new(message_id: String, action: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type_id: MessageTypeId::Call,
            message_id,
            action: action.into(),
            payload,
        }
    }

    pub fn to_frame(&self) -> Result<String, EngineError> {
        serde_json::to_string(&(
            self.message_type_id,
            &self.message_id,
            &self.action,
            &self.payload,
        ))
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }
}

/// An outgoing or incoming CALLRESULT: `[3, messageId, payload]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallResult {
    pub message_type_id: MessageTypeId,
    pub message_id: String,
    pub payload: Value,
}

impl CallResult {
    pub fn new(message_id: String, payload: Value) -> Self {
        Self {
            message_type_id: MessageTypeId::CallResult,
            message_id,
            payload,
        }
    }

    pub fn to_frame(&self) -> Result<String, EngineError> {
        serde_json::to_string(&(self.message_type_id, &self.message_id, &self.payload))
            .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }
}

/// An outgoing or incoming CALLERROR: `[4, messageId, errorCode, errorDescription, errorDetails]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CallError {
    pub message_type_id: MessageTypeId,
    pub message_id: String,
    pub error_code: String,
    pub error_description: String,
    pub error_details: Value,
}

impl CallError {
    pub fn new(message_id: String, code: ErrorCode, description: impl Into<String>) -> Self {
        Self {
            message_type_id: MessageTypeId::CallError,
            message_id,
            error_code: code.as_str().to_string(),
            error_description: description.into(),
            error_details: Value::Object(Default::default()),
        }
    }

    pub fn to_frame(&self) -> Result<String, EngineError> {
        serde_json::to_string(&(
            self.message_type_id,
            &self.message_id,
            &self.error_code,
            &self.error_description,
            &self.error_details,
        ))
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }
}

/// A parsed inbound frame, dispatched on `messageTypeId` without yet knowing the payload shape.
#[derive(Clone, Debug)]
pub enum Frame {
    Call {
        message_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        message_id: String,
        payload: Value,
    },
    CallError {
        message_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl Frame {
    pub fn parse(text: &str) -> Result<Frame, EngineError> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| EngineError::MalformedFrame(format!("invalid JSON: {e}")))?;
        let arr = raw
            .as_array()
            .ok_or_else(|| EngineError::MalformedFrame("frame is not a JSON array".into()))?;
        let type_id = arr
            .first()
            .and_then(Value::as_i64)
            .ok_or_else(|| EngineError::MalformedFrame("missing messageTypeId".into()))?;

        match type_id {
            2 => {
                let message_id = str_at(arr, 1)?;
                let action = str_at(arr, 2)?;
                let payload = arr.get(3).cloned().unwrap_or(Value::Null);
                Ok(Frame::Call {
                    message_id,
                    action,
                    payload,
                })
            }
            3 => {
                let message_id = str_at(arr, 1)?;
                let payload = arr.get(2).cloned().unwrap_or(Value::Null);
                Ok(Frame::CallResult {
                    message_id,
                    payload,
                })
            }
            4 => {
                let message_id = str_at(arr, 1)?;
                let error_code = str_at(arr, 2)?;
                let error_description = str_at(arr, 3)?;
                let error_details = arr.get(4).cloned().unwrap_or(Value::Null);
                Ok(Frame::CallError {
                    message_id,
                    error_code,
                    error_description,
                    error_details,
                })
            }
            other => Err(EngineError::MalformedFrame(format!(
                "unsupported messageTypeId {other}"
            ))),
        }
    }
}

fn str_at(arr: &[Value], idx: usize) -> Result<String, EngineError> {
    arr.get(idx)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| EngineError::MalformedFrame(format!("missing string at index {idx}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_roundtrips_through_frame() {
        let call = Call::new("1".into(), "Heartbeat", json!({}));
        let frame = call.to_frame().unwrap();
        assert_eq!(frame, r#"[2,"1","Heartbeat",{}]"#);
        match Frame::parse(&frame).unwrap() {
            Frame::Call {
                message_id, action, ..
            } => {
                assert_eq!(message_id, "1");
                assert_eq!(action, "Heartbeat");
            }
            _ => panic!("expected Call"),
        }
    }

    #[test]
    fn call_result_roundtrips() {
        let result = CallResult::new("2".into(), json!({"currentTime": "2024-01-01T00:00:00Z"}));
        let frame = result.to_frame().unwrap();
        match Frame::parse(&frame).unwrap() {
            Frame::CallResult { message_id, .. } => assert_eq!(message_id, "2"),
            _ => panic!("expected CallResult"),
        }
    }

    #[test]
    fn call_error_roundtrips() {
        let err = CallError::new("3".into(), ErrorCode::NotImplemented, "nope");
        let frame = err.to_frame().unwrap();
        match Frame::parse(&frame).unwrap() {
            Frame::CallError {
                message_id,
                error_code,
                ..
            } => {
                assert_eq!(message_id, "3");
                assert_eq!(error_code, "NotImplemented");
            }
            _ => panic!("expected CallError"),
        }
    }

    #[test]
    fn parse_rejects_non_array() {
        assert!(Frame::parse("{}").is_err());
    }

    #[test]
    fn parse_rejects_unknown_message_type() {
        assert!(Frame::parse(r#"[9,"1"]"#).is_err());
    }
}
