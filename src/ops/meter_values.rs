use serde::Serialize;
use serde_json::Value;

use crate::engine::EngineHandle;
use crate::errors::EngineError;
use crate::meter_store::{MeterValueRecord, SampledValue};
use crate::request::{QueueBand, Request};
use crate::traits::Operation;

/// Samples the connector's energy register, appends it to the durable per-transaction meter log,
/// and enqueues a `MeterValues.req` carrying just that one sample.
///
/// Grounded on `Model/Metering/MeterStore.cpp`: every sample is written to disk before it is ever
/// queued for transmission, so a reboot mid-transaction can always reconstruct `transactionData`
/// for the eventual `StopTransaction.req` even if several `MeterValues.req`s never made it out.
pub fn begin(engine: &mut EngineHandle, connector_id: u32, value_wh: i64) -> Result<(), EngineError> {
    let tx = engine
        .tx_store
        .active_transaction(engine.fs.as_ref(), connector_id)?
        .ok_or_else(|| EngineError::Configuration(format!("no active transaction on connector {connector_id}")))?;

    let record = MeterValueRecord {
        timestamp: engine.clock.now().unwrap_or_else(chrono::Utc::now),
        sampled_value: vec![SampledValue::energy_register(value_wh)],
    };
    engine
        .mv_store
        .append(engine.fs.as_mut(), connector_id, tx.tx_nr, &record)?;

    let op_nr = engine.queue.reserve_op_nr();
    let op = MeterValuesOperation {
        connector_id,
        transaction_id: tx.transaction_id,
        records: vec![record],
    };
    engine.queue.enqueue(Request::new(
        op_nr,
        QueueBand::Transaction { connector_id },
        Box::new(op),
    ));
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeterValuesReq {
    connector_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_id: Option<i32>,
    meter_value: Vec<MeterValueRecord>,
}

struct MeterValuesOperation {
    connector_id: u32,
    transaction_id: Option<i32>,
    records: Vec<MeterValueRecord>,
}

impl Operation for MeterValuesOperation {
    fn action(&self) -> &'static str {
        "MeterValues"
    }

    fn create_request(&mut self, _engine: &mut EngineHandle) -> Result<Value, EngineError> {
        serde_json::to_value(MeterValuesReq {
            connector_id: self.connector_id,
            transaction_id: self.transaction_id,
            meter_value: self.records.clone(),
        })
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }

    fn handle_conf(&mut self, _engine: &mut EngineHandle, _payload: Value) -> Result<bool, EngineError> {
        // MeterValues.conf carries no fields (OCPP 1.6 §5.12); arrival alone confirms delivery.
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

    fn handle() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()))
    }

    #[test]
    fn begin_requires_active_transaction() {
        let mut engine = handle();
        assert!(begin(&mut engine, 1, 500).is_err());
    }

    #[test]
    fn begin_persists_sample_and_enqueues_request() {
        let mut engine = handle();
        start_transaction::begin(&mut engine, 1, "TAG".into(), 0).unwrap();
        begin(&mut engine, 1, 500).unwrap();
        let log = engine.mv_store.read_all(engine.fs.as_ref(), 1, 0).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(engine.queue.len(), 2);
    }
}
