use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::ConfigValue;
use crate::engine::{BootState, EngineHandle};
use crate::errors::{EngineError, ErrorCode};
use crate::ocppj::{Call, CallError, CallResult, Frame};

/// Binds the [`RequestQueue`](crate::queue::RequestQueue) to the wire: sends at most one CALL
/// per tick, matches CALLRESULT/CALLERROR replies back to their `Request` by message id, and
/// dispatches CALLs the CSMS initiates (station-as-server operations) to a small registry of
/// handlers.
///
/// Grounded on `Core/MessageService.h`, which plays the same role in the original engine: the
/// single place that knows how to turn a `Request` into bytes on the wire and a wire frame back
/// into an effect on the `Context`.
pub struct MessageService;

impl Default for MessageService {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageService {
    pub fn new() -> Self {
        Self
    }

    /// Send the single highest-priority pending request, if the link is idle. Before
    /// BootNotification has been accepted, only [`crate::request::QueueBand::PreBoot`] requests
    /// are eligible -- every other operation waits, per OCPP 1.6 §4.2.
    pub fn send_next(&mut self, engine: &mut EngineHandle) {
        let pre_boot_only = engine.boot_state != BootState::Accepted;
        let Some(mut request) = engine.queue.take_next_to_send(pre_boot_only) else {
            return;
        };
        let action = request.action();
        match request.operation.create_request(engine) {
            Ok(payload) => {
                let message_id = Uuid::new_v4().to_string();
                let call = Call::new(message_id.clone(), action, payload);
                match call.to_frame() {
                    Ok(frame) => match engine.connection.send(&frame) {
                        Ok(()) => {
                            request.message_id = Some(message_id);
                            request.in_flight = true;
                            request.retries += 1;
                            request.sent_at = Some(std::time::Instant::now());
                            tracing::debug!(action, "sent CALL");
                        }
                        Err(e) => tracing::warn!(action, error = %e, "send failed, will retry"),
                    },
                    Err(e) => tracing::error!(action, error = %e, "failed to encode frame"),
                }
            }
            Err(e) => tracing::error!(action, error = %e, "failed to build request payload"),
        }
        engine.queue.put_back(request);
    }

    pub fn handle_incoming(&mut self, engine: &mut EngineHandle, frame: &str) -> Result<(), EngineError> {
        match Frame::parse(frame)? {
            Frame::CallResult { message_id, payload } => self.handle_conf(engine, &message_id, payload),
            Frame::CallError {
                message_id,
                error_code,
                error_description,
                ..
            } => self.handle_call_error(engine, &message_id, &error_code, error_description),
            Frame::Call {
                message_id,
                action,
                payload,
            } => self.handle_call(engine, &message_id, &action, payload),
        }
    }

    fn handle_conf(&mut self, engine: &mut EngineHandle, message_id: &str, payload: Value) -> Result<(), EngineError> {
        let Some(mut request) = engine.queue.take_by_message_id(message_id) else {
            tracing::warn!(message_id, "CALLRESULT for unknown message id");
            return Ok(());
        };
        match request.operation.handle_conf(engine, payload) {
            Ok(true) => tracing::debug!(action = request.action(), "operation completed"),
            Ok(false) => {
                request.in_flight = false;
                request.message_id = None;
                request.sent_at = None;
                engine.queue.put_back(request);
            }
            Err(e) => tracing::error!(action = request.action(), error = %e, "handle_conf failed"),
        }
        Ok(())
    }

    fn handle_call_error(
        &mut self,
        engine: &mut EngineHandle,
        message_id: &str,
        error_code: &str,
        error_description: String,
    ) -> Result<(), EngineError> {
        let Some(mut request) = engine.queue.take_by_message_id(message_id) else {
            tracing::warn!(message_id, "CALLERROR for unknown message id");
            return Ok(());
        };
        let code = ErrorCode::try_from(error_code).unwrap_or(ErrorCode::GenericError);
        match request.operation.handle_call_error(engine, code, error_description) {
            Ok(true) => {}
            Ok(false) => {
                request.in_flight = false;
                request.message_id = None;
                request.sent_at = None;
                engine.queue.put_back(request);
            }
            Err(e) => tracing::error!(action = request.action(), error = %e, "handle_call_error failed"),
        }
        Ok(())
    }

    fn handle_call(
        &mut self,
        engine: &mut EngineHandle,
        message_id: &str,
        action: &str,
        payload: Value,
    ) -> Result<(), EngineError> {
        let result = dispatch_call(engine, action, payload);
        let frame = match result {
            Ok(response) => CallResult::new(message_id.to_string(), response).to_frame(),
            Err(e) => {
                let code = match &e {
                    EngineError::UnknownAction { .. } => ErrorCode::NotImplemented,
                    EngineError::Validation(_) => ErrorCode::PropertyConstraintViolation,
                    _ => ErrorCode::InternalError,
                };
                CallError::new(message_id.to_string(), code, e.to_string()).to_frame()
            }
        }?;
        engine
            .connection
            .send(&frame)
            .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }
}

/// Handlers for CALLs the CSMS initiates. Only `GetConfiguration`/`ChangeConfiguration` are
/// implemented; `RemoteStartTransaction`/`RemoteStopTransaction`/`Reset`/`UnlockConnector` and the
/// rest of the 1.6 core profile's station-as-server operations are out of scope for the engine
/// as specified (see DESIGN.md) and fall through to `NotImplemented`.
fn dispatch_call(engine: &mut EngineHandle, action: &str, payload: Value) -> Result<Value, EngineError> {
    match action {
        "GetConfiguration" => get_configuration(engine, payload),
        "ChangeConfiguration" => change_configuration(engine, payload),
        other => Err(EngineError::UnknownAction {
            action: other.to_string(),
        }),
    }
}

fn get_configuration(engine: &mut EngineHandle, payload: Value) -> Result<Value, EngineError> {
    let requested: Vec<String> = payload
        .get("key")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    let keys: Vec<String> = if requested.is_empty() {
        engine.config.keys().map(String::from).collect()
    } else {
        requested
    };

    let mut configuration_key = vec![];
    let mut unknown_key = vec![];
    for key in keys {
        match engine.config.get(&key) {
            Some(value) => configuration_key.push(json!({
                "key": key,
                "readonly": engine.config.is_read_only(&key).unwrap_or(true),
                "value": value.as_str(),
            })),
            None => unknown_key.push(key),
        }
    }

    Ok(json!({
        "configurationKey": configuration_key,
        "unknownKey": unknown_key,
    }))
}

fn change_configuration(engine: &mut EngineHandle, payload: Value) -> Result<Value, EngineError> {
    let key = payload
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::MalformedFrame("ChangeConfiguration missing key".into()))?;
    let value = payload
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| EngineError::MalformedFrame("ChangeConfiguration missing value".into()))?;

    let parsed = match engine.config.get(key) {
        Some(ConfigValue::Int(_)) => value
            .parse::<i64>()
            .map(ConfigValue::Int)
            .map_err(|_| ())
            .unwrap_or(ConfigValue::Str(value.to_string())),
        Some(ConfigValue::Bool(_)) => value
            .parse::<bool>()
            .map(ConfigValue::Bool)
            .unwrap_or(ConfigValue::Str(value.to_string())),
        _ => ConfigValue::Str(value.to_string()),
    };

    let status = match engine.config.set(engine.fs.as_mut(), key, parsed) {
        Ok(()) => "Accepted",
        Err(_) if engine.config.get(key).is_none() => "NotSupported",
        Err(_) => "Rejected",
    };

    Ok(json!({ "status": status }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::Mutability;
    use crate::connection::FakeConnection;
    use crate::filesystem::MemFilesystem;
    use std::path::Path;

    fn handle() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let mut config = ConfigStore::load(&mut fs, Path::new("c.json")).unwrap();
        config.declare("HeartbeatInterval", ConfigValue::Int(60), Mutability::ReadWrite);
        config.declare("NumberOfConnectors", ConfigValue::Int(1), Mutability::ReadOnly);
        EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()))
    }

    use crate::config::ConfigStore;

    #[test]
    fn get_configuration_returns_all_keys_when_none_requested() {
        let mut engine = handle();
        let resp = get_configuration(&mut engine, json!({})).unwrap();
        assert_eq!(resp["configurationKey"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn get_configuration_reports_unknown_keys() {
        let mut engine = handle();
        let resp = get_configuration(&mut engine, json!({"key": ["DoesNotExist"]})).unwrap();
        assert_eq!(resp["unknownKey"], json!(["DoesNotExist"]));
    }

    #[test]
    fn change_configuration_accepts_writable_key() {
        let mut engine = handle();
        let resp = change_configuration(&mut engine, json!({"key": "HeartbeatInterval", "value": "30"})).unwrap();
        assert_eq!(resp["status"], "Accepted");
        assert_eq!(engine.config.get("HeartbeatInterval").unwrap().as_i64(), Some(30));
    }

    #[test]
    fn change_configuration_rejects_read_only_key() {
        let mut engine = handle();
        let resp = change_configuration(&mut engine, json!({"key": "NumberOfConnectors", "value": "2"})).unwrap();
        assert_eq!(resp["status"], "Rejected");
    }

    #[test]
    fn dispatch_unknown_action_is_not_implemented() {
        let mut engine = handle();
        let err = dispatch_call(&mut engine, "Reset", json!({})).unwrap_err();
        assert!(matches!(err, EngineError::UnknownAction { .. }));
    }
}
