use crate::engine::EngineHandle;
use crate::errors::{EngineError, OcppError};
use serde_json::Value;

#[typetag::serde(tag = "type")]
pub trait OcppEntity {
    fn validate(self: &Self) -> Result<(), OcppError>;
}

/// A stateful, possibly multi-step engine operation bound to a single in-flight Request.
///
/// Unlike [`OcppMessage`], which only describes a payload's shape, `Operation` is the engine-side
/// object created by the `Request` when it is dequeued: it owns whatever write-ahead state the
/// operation needs (e.g. a reserved `txNr`) and knows how to turn a CALLRESULT/CALLERROR back into
/// engine-visible effects (starting a transaction, applying a configuration change, etc).
pub trait Operation: Send {
    /// The action name this operation answers to, used for registry lookup and for the `action`
    /// field of the outgoing CALL frame.
    fn action(&self) -> &'static str;

    /// Build the `.req` payload to send. Called once, when the Request reaches the front of its
    /// queue and is about to be transmitted for the first time.
    fn create_request(&mut self, engine: &mut EngineHandle) -> Result<Value, EngineError>;

    /// Handle a CALLRESULT `.conf` payload. Returning `Ok(true)` marks the Request as complete and
    /// removes it from its queue; `Ok(false)` requests the Request be retried (re-sent) later.
    fn handle_conf(&mut self, engine: &mut EngineHandle, payload: Value) -> Result<bool, EngineError>;

    /// Handle a CALLERROR reply. Most operations simply log and drop the Request; StopTransaction
    /// retains its WAL entry regardless (see engine notes on data-loss-on-CallError).
    fn handle_call_error(
        &mut self,
        _engine: &mut EngineHandle,
        code: crate::errors::ErrorCode,
        description: String,
    ) -> Result<bool, EngineError> {
        tracing::warn!(action = self.action(), ?code, %description, "operation rejected by station/CSMS");
        Ok(true)
    }
}
