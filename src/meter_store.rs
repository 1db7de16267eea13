use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::location_enum_type::LocationEnumType;
use crate::enums::measurand_enum_type::MeasurandEnumType;
use crate::enums::phase_enum_type::PhaseEnumType;
use crate::enums::reading_context_enum_type::ReadingContextEnumType;
use crate::errors::EngineError;
use crate::filesystem::FilesystemAdapter;

/// One `sampledValue` element of an OCPP 1.6 `MeterValue`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ReadingContextEnumType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurand: Option<MeasurandEnumType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<PhaseEnumType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationEnumType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl SampledValue {
    pub fn energy_register(value_wh: i64) -> Self {
        Self {
            value: value_wh.to_string(),
            context: Some(ReadingContextEnumType::SamplePeriodic),
            measurand: Some(MeasurandEnumType::EnergyActiveImportRegister),
            phase: None,
            location: None,
            unit: Some("Wh".to_string()),
        }
    }
}

/// One `MeterValue` element: a timestamp plus one or more samples taken at that instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterValueRecord {
    pub timestamp: DateTime<Utc>,
    pub sampled_value: Vec<SampledValue>,
}

/// Accumulates [`MeterValueRecord`]s for one `(connector_id, tx_nr)` pair across the lifetime of
/// a transaction, so a crash before `StopTransaction.req` is sent loses no readings.
///
/// Grounded on `Model/Metering/MeterStore.cpp`: meter values are appended to a single
/// per-transaction log rather than individually addressed slots, since they are always consumed
/// as one ordered list (either a periodic `MeterValues.req` tail, or the full `transactionData`
/// of `StopTransaction.req`).
/// Upper bound on retained readings per transaction, matching `MO_MAX_STOPTXDATA_LEN`: once hit,
/// the newest sample overwrites the last slot rather than growing the log further, so
/// `StopTransaction.req`'s `transactionData` always carries the most recent readings instead of
/// the oldest.
pub const MAX_STOP_TX_DATA_LEN: usize = 24;

pub struct MeterValueStore {
    root: PathBuf,
}

impl MeterValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn log_path(&self, connector_id: u32, tx_nr: u32) -> PathBuf {
        self.root.join(format!("{connector_id}/{tx_nr}.jsonl"))
    }

    pub fn append(
        &mut self,
        fs: &mut dyn FilesystemAdapter,
        connector_id: u32,
        tx_nr: u32,
        record: &MeterValueRecord,
    ) -> Result<(), EngineError> {
        let path = self.log_path(connector_id, tx_nr);
        let mut existing = self.read_all(fs, connector_id, tx_nr)?;
        if existing.len() >= MAX_STOP_TX_DATA_LEN {
            *existing.last_mut().unwrap() = record.clone();
        } else {
            existing.push(record.clone());
        }
        let data = serde_json::to_vec(&existing)
            .map_err(|e| EngineError::StoreCorrupted(e.to_string()))?;
        fs.write(&path, &data)
            .map_err(|e| EngineError::Filesystem(e.to_string()))
    }

    pub fn read_all(
        &self,
        fs: &dyn FilesystemAdapter,
        connector_id: u32,
        tx_nr: u32,
    ) -> Result<Vec<MeterValueRecord>, EngineError> {
        let path = self.log_path(connector_id, tx_nr);
        if !fs.exists(&path) {
            return Ok(vec![]);
        }
        let data = fs
            .read(&path)
            .map_err(|e| EngineError::Filesystem(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| EngineError::StoreCorrupted(e.to_string()))
    }

    /// Drop the accumulated log once a transaction has been fully settled (its `StopTransaction`
    /// has been confirmed, or was dropped after exhausting its retries).
    pub fn clear(
        &mut self,
        fs: &mut dyn FilesystemAdapter,
        connector_id: u32,
        tx_nr: u32,
    ) -> Result<(), EngineError> {
        fs.remove(&self.log_path(connector_id, tx_nr))
            .map_err(|e| EngineError::Filesystem(e.to_string()))
    }

    /// Drop every meter-value log for a connector, used by the boot-loop recovery path to escape
    /// a station stuck repeatedly rejecting BootNotification with stale transaction data onboard.
    pub fn purge_connector(
        &mut self,
        fs: &mut dyn FilesystemAdapter,
        connector_id: u32,
    ) -> Result<(), EngineError> {
        let dir = self.root.join(format!("{connector_id}"));
        let names = fs.list(&dir).map_err(|e| EngineError::Filesystem(e.to_string()))?;
        for name in names {
            fs.remove(&dir.join(name))
                .map_err(|e| EngineError::Filesystem(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemFilesystem;

    fn sample(ts: DateTime<Utc>) -> MeterValueRecord {
        MeterValueRecord {
            timestamp: ts,
            sampled_value: vec![SampledValue::energy_register(1000)],
        }
    }

    #[test]
    fn append_accumulates_in_order() {
        let mut fs = MemFilesystem::new();
        let mut store = MeterValueStore::new("mv");
        let t0 = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let t1 = t0 + chrono::Duration::minutes(1);
        store.append(&mut fs, 1, 5, &sample(t0)).unwrap();
        store.append(&mut fs, 1, 5, &sample(t1)).unwrap();
        let all = store.read_all(&fs, 1, 5).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].timestamp, t0);
        assert_eq!(all[1].timestamp, t1);
    }

    #[test]
    fn clear_removes_log() {
        let mut fs = MemFilesystem::new();
        let mut store = MeterValueStore::new("mv");
        let t0 = Utc::now();
        store.append(&mut fs, 1, 5, &sample(t0)).unwrap();
        store.clear(&mut fs, 1, 5).unwrap();
        assert!(store.read_all(&fs, 1, 5).unwrap().is_empty());
    }

    #[test]
    fn append_caps_log_and_overwrites_last_slot() {
        let mut fs = MemFilesystem::new();
        let mut store = MeterValueStore::new("mv");
        let t0 = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        for i in 0..MAX_STOP_TX_DATA_LEN {
            store
                .append(&mut fs, 1, 5, &sample(t0 + chrono::Duration::minutes(i as i64)))
                .unwrap();
        }
        let overflow_ts = t0 + chrono::Duration::minutes(999);
        store.append(&mut fs, 1, 5, &sample(overflow_ts)).unwrap();

        let all = store.read_all(&fs, 1, 5).unwrap();
        assert_eq!(all.len(), MAX_STOP_TX_DATA_LEN);
        assert_eq!(all.last().unwrap().timestamp, overflow_ts);
    }

    #[test]
    fn purge_connector_removes_all_logs() {
        let mut fs = MemFilesystem::new();
        let mut store = MeterValueStore::new("mv");
        store.append(&mut fs, 1, 5, &sample(Utc::now())).unwrap();
        store.append(&mut fs, 1, 6, &sample(Utc::now())).unwrap();
        store.purge_connector(&mut fs, 1).unwrap();
        assert!(store.read_all(&fs, 1, 5).unwrap().is_empty());
        assert!(store.read_all(&fs, 1, 6).unwrap().is_empty());
    }
}
