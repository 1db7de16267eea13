use serde::Serialize;
use serde_json::Value;

use crate::connector::ChargePointStatus;
use crate::engine::EngineHandle;
use crate::errors::EngineError;
use crate::request::{QueueBand, Request};
use crate::traits::Operation;

/// Enqueues a `StatusNotification.req` reporting a connector's newly derived [`ChargePointStatus`].
/// Volatile: unlike the transaction operations, a dropped `StatusNotification` is superseded by
/// the next status change rather than retried indefinitely, so it lives in the default band.
pub fn enqueue(engine: &mut EngineHandle, connector_id: u32, status: ChargePointStatus) {
    let op_nr = engine.queue.reserve_op_nr();
    let op = StatusNotificationOperation { connector_id, status };
    engine
        .queue
        .enqueue(Request::new(op_nr, QueueBand::Default, Box::new(op)));
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusNotificationReq {
    connector_id: u32,
    error_code: &'static str,
    status: ChargePointStatus,
}

struct StatusNotificationOperation {
    connector_id: u32,
    status: ChargePointStatus,
}

impl Operation for StatusNotificationOperation {
    fn action(&self) -> &'static str {
        "StatusNotification"
    }

    fn create_request(&mut self, _engine: &mut EngineHandle) -> Result<Value, EngineError> {
        serde_json::to_value(StatusNotificationReq {
            connector_id: self.connector_id,
            error_code: "NoError",
            status: self.status,
        })
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }

    fn handle_conf(&mut self, _engine: &mut EngineHandle, _payload: Value) -> Result<bool, EngineError> {
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

    #[test]
    fn enqueue_adds_a_default_band_request() {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        let mut engine = EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()));
        enqueue(&mut engine, 1, ChargePointStatus::Charging);
        assert_eq!(engine.queue.len(), 1);
    }
}
