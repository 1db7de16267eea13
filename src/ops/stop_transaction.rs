use serde::Serialize;
use serde_json::Value;

use crate::engine::EngineHandle;
use crate::errors::{EngineError, ErrorCode};
use crate::meter_store::MeterValueRecord;
use crate::request::{QueueBand, Request};
use crate::traits::Operation;
use crate::transaction::{StopReason, Transaction};

/// Minimum gap enforced between `start_timestamp` and `stop_timestamp`, so a transaction that
/// starts and stops within the same clock tick (or whose start was rebased forward by
/// `adjust_preboot_timestamp` after the fact) never reports a zero- or negative-length session.
const MIN_TRANSACTION_DURATION: chrono::Duration = chrono::Duration::seconds(1);

/// Writes the final transaction state and gathers the accumulated meter-value log ahead of
/// sending `StopTransaction.req` -- same write-ahead discipline as
/// [`start_transaction::begin`](crate::ops::start_transaction::begin).
pub fn begin(
    engine: &mut EngineHandle,
    connector_id: u32,
    meter_stop_wh: i64,
    reason: StopReason,
) -> Result<(), EngineError> {
    let mut tx = engine
        .tx_store
        .active_transaction(engine.fs.as_ref(), connector_id)?
        .ok_or_else(|| EngineError::Configuration(format!("no active transaction on connector {connector_id}")))?;

    tx.start_timestamp = engine.clock.adjust_preboot_timestamp(tx.start_timestamp);

    tx.meter_stop = Some(meter_stop_wh);
    let mut stop_ts = engine.clock.now();
    if let (Some(start), Some(stop)) = (tx.start_timestamp, stop_ts) {
        if stop < start + MIN_TRANSACTION_DURATION {
            stop_ts = Some(start + MIN_TRANSACTION_DURATION);
        }
    }
    tx.stop_timestamp = stop_ts;
    tx.stop_reason = Some(reason);
    engine.tx_store.save(engine.fs.as_mut(), &tx)?;

    if let Some(connector) = engine.connector_mut(connector_id) {
        connector.set_has_active_transaction(false);
    }

    enqueue_request(engine, &tx, meter_stop_wh, reason)?;
    Ok(())
}

/// Re-enqueue the `StopTransaction.req` for a transaction recovered from disk at boot whose
/// `.conf` never arrived before the crash.
pub fn requeue(engine: &mut EngineHandle, tx: &Transaction) -> Result<(), EngineError> {
    let meter_stop_wh = tx
        .meter_stop
        .ok_or_else(|| EngineError::StoreCorrupted("pending StopTransaction missing meter_stop".into()))?;
    let reason = tx.stop_reason.unwrap_or(StopReason::Other);
    enqueue_request(engine, tx, meter_stop_wh, reason)
}

fn enqueue_request(
    engine: &mut EngineHandle,
    tx: &Transaction,
    meter_stop_wh: i64,
    reason: StopReason,
) -> Result<(), EngineError> {
    let transaction_data = engine.mv_store.read_all(engine.fs.as_ref(), tx.connector_id, tx.tx_nr)?;

    let op_nr = engine.queue.reserve_op_nr();
    let op = StopTransactionOperation {
        connector_id: tx.connector_id,
        tx_nr: tx.tx_nr,
        transaction_id: tx.transaction_id,
        meter_stop_wh,
        timestamp: tx.stop_timestamp,
        reason,
        transaction_data,
    };
    engine.queue.enqueue(Request::new(
        op_nr,
        QueueBand::Transaction {
            connector_id: tx.connector_id,
        },
        Box::new(op),
    ));
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopTransactionReq {
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<i32>,
    meter_stop: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    transaction_data: Vec<MeterValueRecord>,
}

struct StopTransactionOperation {
    connector_id: u32,
    tx_nr: u32,
    transaction_id: Option<i32>,
    meter_stop_wh: i64,
    timestamp: Option<chrono::DateTime<chrono::Utc>>,
    reason: StopReason,
    transaction_data: Vec<MeterValueRecord>,
}

impl Operation for StopTransactionOperation {
    fn action(&self) -> &'static str {
        "StopTransaction"
    }

    fn create_request(&mut self, _engine: &mut EngineHandle) -> Result<Value, EngineError> {
        serde_json::to_value(StopTransactionReq {
            transaction_id: self.transaction_id,
            meter_stop: self.meter_stop_wh,
            timestamp: self.timestamp,
            reason: self.reason.into(),
            transaction_data: self.transaction_data.clone(),
        })
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }

    fn handle_conf(&mut self, engine: &mut EngineHandle, _payload: Value) -> Result<bool, EngineError> {
        if let Some(mut tx) = engine.tx_store.load(engine.fs.as_ref(), self.connector_id, self.tx_nr)? {
            tx.stopped_confirmed = true;
            engine.tx_store.save(engine.fs.as_mut(), &tx)?;
        }
        engine.mv_store.clear(engine.fs.as_mut(), self.connector_id, self.tx_nr)?;
        Ok(true)
    }

    /// If the CSMS CALLERRORs a `StopTransaction`, the transaction record is retained on disk
    /// (never marked `stopped_confirmed`) but the `Request` itself is still dropped, so there is
    /// no infinite retry: the record becomes an orphaned, never-uploaded WAL entry rather than
    /// being retried indefinitely. Silent data loss is preferred over a retry loop that could
    /// stall every future transaction on this connector (see DESIGN.md).
    fn handle_call_error(
        &mut self,
        _engine: &mut EngineHandle,
        code: ErrorCode,
        description: String,
    ) -> Result<bool, EngineError> {
        tracing::error!(
            connector_id = self.connector_id,
            tx_nr = self.tx_nr,
            ?code,
            %description,
            "StopTransaction rejected by CSMS; transaction record retained unconfirmed"
        );
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
    use crate::ops::start_transaction;
    use serde_json::json;

    fn handle() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()))
    }

    fn handle_with_fake_clock() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        EngineHandle::new(
            Box::new(fs),
            Box::new(crate::clock::FakeClock::new()),
            config,
            Box::new(FakeConnection::new()),
        )
    }

    #[test]
    fn begin_fails_without_active_transaction() {
        let mut engine = handle();
        let err = begin(&mut engine, 1, 1000, StopReason::Local).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn begin_enqueues_after_start_confirmed() {
        let mut engine = handle();
        start_transaction::begin(&mut engine, 1, "TAG".into(), 0).unwrap();
        // simulate StartTransaction.conf
        let mut tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        tx.started_confirmed = true;
        tx.transaction_id = Some(7);
        engine.tx_store.save(engine.fs.as_mut(), &tx).unwrap();

        begin(&mut engine, 1, 500, StopReason::Local).unwrap();
        assert_eq!(engine.queue.len(), 2);
    }

    #[test]
    fn call_error_retains_record_but_drops_request() {
        let mut op = StopTransactionOperation {
            connector_id: 1,
            tx_nr: 0,
            transaction_id: Some(1),
            meter_stop_wh: 100,
            timestamp: None,
            reason: StopReason::Local,
            transaction_data: vec![],
        };
        let mut engine = handle();
        let done = op
            .handle_call_error(&mut engine, ErrorCode::InternalError, "boom".into())
            .unwrap();
        assert!(done);
    }

    #[test]
    fn handle_conf_marks_stopped_and_clears_meter_log() {
        let mut engine = handle();
        start_transaction::begin(&mut engine, 1, "TAG".into(), 0).unwrap();
        let mut op = StopTransactionOperation {
            connector_id: 1,
            tx_nr: 0,
            transaction_id: Some(1),
            meter_stop_wh: 100,
            timestamp: None,
            reason: StopReason::Local,
            transaction_data: vec![],
        };
        op.handle_conf(&mut engine, json!({})).unwrap();
        let tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert!(tx.stopped_confirmed);
    }

    #[test]
    fn stop_timestamp_is_clamped_to_at_least_one_second_after_start() {
        let mut engine = handle_with_fake_clock();
        let t0 = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        engine.clock.set_time(t0);
        start_transaction::begin(&mut engine, 1, "TAG".into(), 0).unwrap();
        let mut tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        tx.started_confirmed = true;
        tx.transaction_id = Some(7);
        engine.tx_store.save(engine.fs.as_mut(), &tx).unwrap();

        // Same instant: stop is requested in the same tick as start.
        begin(&mut engine, 1, 500, StopReason::Local).unwrap();
        let stopped = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert_eq!(stopped.stop_timestamp.unwrap(), t0 + MIN_TRANSACTION_DURATION);
    }

    #[test]
    fn begin_rebases_a_preboot_start_timestamp() {
        let mut engine = handle_with_fake_clock();
        start_transaction::begin(&mut engine, 1, "TAG".into(), 0).unwrap();
        let mut tx = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert!(tx.start_timestamp.is_none(), "clock was unsynchronized at start");
        tx.started_confirmed = true;
        tx.transaction_id = Some(7);
        engine.tx_store.save(engine.fs.as_mut(), &tx).unwrap();

        let t1 = chrono::DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        engine.clock.set_time(t1);
        begin(&mut engine, 1, 500, StopReason::Local).unwrap();
        let stopped = engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().unwrap();
        assert_eq!(stopped.start_timestamp, Some(t1));
    }

    #[test]
    fn requeue_rebuilds_the_request_from_a_pending_record() {
        let mut engine = handle();
        let mut tx = Transaction::new(1, 0, "TAG".into(), 0);
        tx.started_confirmed = true;
        tx.meter_stop = Some(500);
        requeue(&mut engine, &tx).unwrap();
        assert_eq!(engine.queue.len(), 1);
    }
}
