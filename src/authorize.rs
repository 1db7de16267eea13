use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::EngineHandle;
use crate::errors::{EngineError, ErrorCode, OcppError};
use crate::request::{QueueBand, Request};
use crate::traits::Operation;

/// OCPP 1.6 `AuthorizationStatus`, as carried in `idTagInfo.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::Accepted => "Accepted",
            AuthorizationStatus::Blocked => "Blocked",
            AuthorizationStatus::Expired => "Expired",
            AuthorizationStatus::Invalid => "Invalid",
            AuthorizationStatus::ConcurrentTx => "ConcurrentTx",
        }
    }

    pub fn permits_charging(&self) -> bool {
        matches!(self, AuthorizationStatus::Accepted)
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for AuthorizationStatus {
    type Error = OcppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Accepted" => Ok(Self::Accepted),
            "Blocked" => Ok(Self::Blocked),
            "Expired" => Ok(Self::Expired),
            "Invalid" => Ok(Self::Invalid),
            "ConcurrentTx" => Ok(Self::ConcurrentTx),
            _ => Err(OcppError::InvalidEnumValueError {
                enum_name: "AuthorizationStatus".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// `idTagInfo`, returned by Authorize.conf and carried inside StartTransaction.conf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTagInfo {
    pub status: AuthorizationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id_tag: Option<String>,
}

impl IdTagInfo {
    pub fn accepted() -> Self {
        Self {
            status: AuthorizationStatus::Accepted,
            expiry_date: None,
            parent_id_tag: None,
        }
    }
}

/// Outcome of resolving an `idTag`, decoupled from the wire `idTagInfo` so the engine can
/// distinguish "accepted from local cache" vs "accepted by CSMS" for logging purposes even
/// though both produce the same `AuthorizationStatus::Accepted` on the wire.
#[derive(Debug, Clone)]
pub enum AuthorizationDecision {
    Local(IdTagInfo),
    Remote(IdTagInfo),
}

impl AuthorizationDecision {
    pub fn id_tag_info(&self) -> &IdTagInfo {
        match self {
            AuthorizationDecision::Local(info) | AuthorizationDecision::Remote(info) => info,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeReq {
    id_tag: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeConf {
    #[serde(default)]
    id_tag_info: Option<IdTagInfo>,
}

/// Enqueues an `Authorize.req` for the given `idTag`, ahead of a `StartTransaction.req` the host
/// sends once the decision comes back. Lives in the default band: unlike the transaction
/// operations it carries no WAL entry of its own, so it is never replayed after a crash.
pub fn enqueue(engine: &mut EngineHandle, id_tag: impl Into<String>) {
    let op_nr = engine.queue.reserve_op_nr();
    let op = AuthorizeOperation::new(id_tag);
    engine
        .queue
        .enqueue(Request::new(op_nr, QueueBand::Default, Box::new(op)));
}

/// Engine-side binding for `Authorize.req`/`.conf`: resolves whether an `idTag` may start a
/// transaction. Local authorization-list lookups are out of scope (see Non-goals); this always
/// round-trips to the CSMS.
pub struct AuthorizeOperation {
    id_tag: String,
    result: Option<IdTagInfo>,
}

impl AuthorizeOperation {
    pub fn new(id_tag: impl Into<String>) -> Self {
        Self {
            id_tag: id_tag.into(),
            result: None,
        }
    }

    pub fn result(&self) -> Option<&IdTagInfo> {
        self.result.as_ref()
    }
}

impl Operation for AuthorizeOperation {
    fn action(&self) -> &'static str {
        "Authorize"
    }

    fn create_request(&mut self, _engine: &mut EngineHandle) -> Result<Value, EngineError> {
        serde_json::to_value(AuthorizeReq {
            id_tag: self.id_tag.clone(),
        })
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }

    fn handle_conf(&mut self, _engine: &mut EngineHandle, payload: Value) -> Result<bool, EngineError> {
        let conf: AuthorizeConf = serde_json::from_value(payload)
            .map_err(|e| EngineError::MalformedFrame(e.to_string()))?;
        self.result = Some(conf.id_tag_info.unwrap_or_else(|| IdTagInfo {
            status: AuthorizationStatus::Invalid,
            expiry_date: None,
            parent_id_tag: None,
        }));
        Ok(true)
    }

    fn handle_call_error(
        &mut self,
        _engine: &mut EngineHandle,
        code: ErrorCode,
        description: String,
    ) -> Result<bool, EngineError> {
        tracing::warn!(id_tag = %self.id_tag, ?code, %description, "Authorize rejected");
        self.result = Some(IdTagInfo {
            status: AuthorizationStatus::Invalid,
            expiry_date: None,
            parent_id_tag: None,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::ConfigStore;
    use crate::connection::FakeConnection;
    use crate::filesystem::MemFilesystem;
    use serde_json::json;

    fn handle() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()))
    }

    #[test]
    fn enqueue_adds_a_default_band_request() {
        let mut engine = handle();
        enqueue(&mut engine, "ABC123");
        assert_eq!(engine.queue.len(), 1);
    }

    #[test]
    fn create_request_carries_id_tag() {
        let mut op = AuthorizeOperation::new("ABC123");
        let mut engine = handle();
        let req = op.create_request(&mut engine).unwrap();
        assert_eq!(req["idTag"], "ABC123");
    }

    #[test]
    fn accepted_conf_is_recorded() {
        let mut op = AuthorizeOperation::new("ABC123");
        let mut engine = handle();
        op.handle_conf(&mut engine, json!({"idTagInfo": {"status": "Accepted"}}))
            .unwrap();
        assert!(op.result().unwrap().status.permits_charging());
    }

    #[test]
    fn call_error_falls_back_to_invalid() {
        let mut op = AuthorizeOperation::new("ABC123");
        let mut engine = handle();
        op.handle_call_error(&mut engine, ErrorCode::InternalError, "boom".into())
            .unwrap();
        assert_eq!(op.result().unwrap().status, AuthorizationStatus::Invalid);
    }
}
