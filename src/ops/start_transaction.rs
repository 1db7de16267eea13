use serde::Serialize;
use serde_json::Value;

use crate::authorize::IdTagInfo;
use crate::engine::EngineHandle;
use crate::errors::EngineError;
use crate::request::{QueueBand, Request};
use crate::traits::Operation;
use crate::traits::OcppEntity;
use crate::transaction::Transaction;

/// Writes the transaction record ahead of sending `StartTransaction.req`, so a power loss
/// between "EV plugged in" and "CSMS confirmed" never loses the fact that energy was delivered.
///
/// Grounded on `Operations/StartTransaction.cpp`: the original allocates a `txNr`, persists a
/// stub `Transaction` to flash, *then* builds the request -- retries after a crash resume from
/// the persisted stub rather than re-running the whole flow. Here, "retries after a crash" means
/// [`requeue`] re-enqueuing the same stub record on `Engine::new`, since the `RequestQueue` itself
/// is in-memory only.
pub fn begin(
    engine: &mut EngineHandle,
    connector_id: u32,
    id_tag: String,
    meter_start_wh: i64,
) -> Result<(), EngineError> {
    let tx_nr = engine.tx_store.allocate_tx_nr(engine.fs.as_ref(), connector_id)?;
    let mut tx = Transaction::new(connector_id, tx_nr, id_tag.clone(), meter_start_wh);
    tx.start_timestamp = engine.clock.now();
    tx.validate().map_err(EngineError::Validation)?;
    engine.tx_store.save(engine.fs.as_mut(), &tx)?;

    if let Some(connector) = engine.connector_mut(connector_id) {
        connector.set_has_active_transaction(true);
    }

    enqueue_request(engine, &tx);
    Ok(())
}

/// Re-enqueue the `StartTransaction.req` for a transaction recovered from disk at boot whose
/// `.conf` never arrived before the crash.
pub fn requeue(engine: &mut EngineHandle, tx: &Transaction) {
    enqueue_request(engine, tx);
}

fn enqueue_request(engine: &mut EngineHandle, tx: &Transaction) {
    let op_nr = engine.queue.reserve_op_nr();
    let op = StartTransactionOperation {
        connector_id: tx.connector_id,
        tx_nr: tx.tx_nr,
        id_tag: tx.id_tag.clone(),
        meter_start_wh: tx.meter_start,
        timestamp: tx.start_timestamp,
    };
    engine.queue.enqueue(Request::new(
        op_nr,
        QueueBand::Transaction {
            connector_id: tx.connector_id,
        },
        Box::new(op),
    ));
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartTransactionReq {
    connector_id: u32,
    id_tag: String,
    meter_start: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

struct StartTransactionOperation {
    connector_id: u32,
    tx_nr: u32,
    id_tag: String,
    meter_start_wh: i64,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
}

impl Operation for StartTransactionOperation {
    fn action(&self) -> &'static str {
        "StartTransaction"
    }

    fn create_request(&mut self, engine: &mut EngineHandle) -> Result<Value, EngineError> {
        let timestamp = engine.clock.adjust_preboot_timestamp(self.timestamp);
        self.timestamp = timestamp;
        serde_json::to_value(StartTransactionReq {
            connector_id: self.connector_id,
            id_tag: self.id_tag.clone(),
            meter_start: self.meter_start_wh,
            timestamp,
        })
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }

    fn handle_conf(&mut self, engine: &mut EngineHandle, payload: Value) -> Result<bool, EngineError> {
        let transaction_id = payload
            .get("transactionId")
            .and_then(Value::as_i64)
            .ok_or_else(|| EngineError::MalformedFrame("StartTransaction.conf missing transactionId".into()))?;
        let id_tag_info: Option<IdTagInfo> = payload
            .get("idTagInfo")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        if let Some(mut tx) = engine.tx_store.load(engine.fs.as_ref(), self.connector_id, self.tx_nr)? {
            tx.transaction_id = Some(transaction_id as i32);
            tx.started_confirmed = true;
            if let Some(info) = &id_tag_info {
                tx.deauthorized = !info.status.permits_charging();
            }
            engine.tx_store.save(engine.fs.as_mut(), &tx)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::connection::FakeConnection;
    use crate::config::ConfigStore;
    use crate::filesystem::MemFilesystem;
    use serde_json::json;

    fn handle() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()))
    }

    #[test]
    fn begin_persists_wal_entry_before_sending() {
        let mut engine = handle();
        begin(&mut engine, 1, "TAG1".into(), 0).unwrap();
        assert_eq!(engine.queue.len(), 1);
        let tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert!(!tx.started_confirmed);
    }

    #[test]
    fn begin_rejects_id_tag_over_20_chars() {
        let mut engine = handle();
        let err = begin(&mut engine, 1, "A".repeat(21), 0).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn handle_conf_marks_transaction_started() {
        let mut engine = handle();
        begin(&mut engine, 1, "TAG1".into(), 0).unwrap();
        let mut op = StartTransactionOperation {
            connector_id: 1,
            tx_nr: 0,
            id_tag: "TAG1".into(),
            meter_start_wh: 0,
            timestamp: None,
        };
        op.handle_conf(&mut engine, json!({"transactionId": 42, "idTagInfo": {"status": "Accepted"}}))
            .unwrap();
        let tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert!(tx.started_confirmed);
        assert_eq!(tx.transaction_id, Some(42));
        assert!(!tx.deauthorized);
    }

    #[test]
    fn handle_conf_flags_non_accepted_id_tag_info_as_deauthorized() {
        let mut engine = handle();
        begin(&mut engine, 1, "TAG1".into(), 0).unwrap();
        let mut op = StartTransactionOperation {
            connector_id: 1,
            tx_nr: 0,
            id_tag: "TAG1".into(),
            meter_start_wh: 0,
            timestamp: None,
        };
        op.handle_conf(&mut engine, json!({"transactionId": 42, "idTagInfo": {"status": "Blocked"}}))
            .unwrap();
        let tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert!(tx.started_confirmed, "session keeps running, the EV is already plugged in");
        assert!(tx.deauthorized);
    }

    #[test]
    fn requeue_enqueues_the_stub_record_again() {
        let mut engine = handle();
        let tx = Transaction::new(1, 0, "TAG1".into(), 0);
        requeue(&mut engine, &tx);
        assert_eq!(engine.queue.len(), 1);
    }
}
