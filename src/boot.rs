use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ConfigStore, ConfigValue, Mutability};
use crate::engine::{BootState, EngineHandle};
use crate::enums::registration_status_enum_type::RegistrationStatusEnumType;
use crate::errors::EngineError;
use crate::filesystem::FilesystemAdapter;
use crate::request::{QueueBand, Request};
use crate::traits::Operation;

/// Boot attempts beyond this many consecutive CSMS rejections are treated as a boot loop: the
/// station purges its persisted transaction/meter-value data and starts clean rather than
/// spinning on data the CSMS will never be able to reconcile anyway.
///
/// Grounded on spec §4.9's boot stats recovery rule; the original engine additionally purges on
/// a `MicroOcppVersion` mismatch after a firmware upgrade, which this engine does not model (see
/// DESIGN.md -- there is no version-migration concept here).
const MAX_BOOT_ATTEMPTS: u32 = 3;

/// How long the station must stay in `BootState::Accepted` before `attempts` is reset to zero,
/// i.e. before a boot is considered to have actually succeeded rather than merely completed the
/// BootNotification handshake.
const BOOT_SUCCESS_WINDOW: Duration = Duration::from_secs(180);

const BOOT_STATS_PATH: &str = "boot/stats.json";

/// Persisted across reboots to detect a station stuck repeatedly failing to register with the
/// CSMS. Grounded on spec §4.9's `bootstats.jsn`-equivalent file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BootStats {
    /// Number of boots since the last time the station ran successfully for
    /// [`BOOT_SUCCESS_WINDOW`].
    pub attempts: u32,
}

fn load_boot_stats(fs: &dyn FilesystemAdapter) -> BootStats {
    let path = Path::new(BOOT_STATS_PATH);
    if !fs.exists(path) {
        return BootStats::default();
    }
    fs.read(path)
        .ok()
        .and_then(|data| serde_json::from_slice(&data).ok())
        .unwrap_or_default()
}

fn save_boot_stats(fs: &mut dyn FilesystemAdapter, stats: &BootStats) -> Result<(), EngineError> {
    let data = serde_json::to_vec(stats).map_err(|e| EngineError::StoreCorrupted(e.to_string()))?;
    fs.write(Path::new(BOOT_STATS_PATH), &data)
        .map_err(|e| EngineError::Filesystem(e.to_string()))
}

/// Called once from `Engine::new`: increments the boot attempt counter and, once it exceeds
/// [`MAX_BOOT_ATTEMPTS`], purges every connector's persisted transaction and meter-value data to
/// escape a boot loop caused by data the CSMS keeps rejecting.
pub fn run_boot_stats_recovery(engine: &mut EngineHandle) -> Result<(), EngineError> {
    let mut stats = load_boot_stats(engine.fs.as_ref());
    stats.attempts += 1;

    if stats.attempts > MAX_BOOT_ATTEMPTS {
        tracing::warn!(
            attempts = stats.attempts,
            "boot loop detected, purging persisted transaction and meter-value data"
        );
        let connector_ids: Vec<u32> = engine.connectors.iter().map(|c| c.id).collect();
        for id in connector_ids {
            engine.tx_store.purge_connector(engine.fs.as_mut(), id)?;
            engine.mv_store.purge_connector(engine.fs.as_mut(), id)?;
        }
        stats.attempts = 0;
    }

    save_boot_stats(engine.fs.as_mut(), &stats)
}

/// Called every `loop_tick`: once the station has run [`BOOT_SUCCESS_WINDOW`] since
/// BootNotification was accepted, resets `attempts` to zero so a single rejected boot years from
/// now doesn't inherit a stale, nearly-tripped counter.
pub fn check_boot_success(engine: &mut EngineHandle) {
    let Some(accepted_at) = engine.boot_accepted_at else {
        return;
    };
    if accepted_at.elapsed() < BOOT_SUCCESS_WINDOW {
        return;
    }
    engine.boot_accepted_at = None;
    let stats = load_boot_stats(engine.fs.as_ref());
    if stats.attempts != 0 {
        if let Err(e) = save_boot_stats(engine.fs.as_mut(), &BootStats { attempts: 0 }) {
            tracing::warn!(error = %e, "failed to reset boot stats after a sustained successful boot");
        }
    }
}

/// Declares the configuration keys a freshly booted station needs, matching the defaults
/// `Model/Configuration/Configuration.cpp` ships with for a minimal OCPP 1.6 core profile.
pub fn declare_defaults(config: &mut ConfigStore, _fs: &mut dyn FilesystemAdapter) {
    config.declare("HeartbeatInterval", ConfigValue::Int(86400), Mutability::ReadWrite);
    config.declare("NumberOfConnectors", ConfigValue::Int(1), Mutability::ReadOnly);
    config.declare(
        "MeterValueSampleInterval",
        ConfigValue::Int(60),
        Mutability::ReadWrite,
    );
    config.declare(
        "ConnectionTimeOut",
        ConfigValue::Int(30),
        Mutability::ReadWrite,
    );
    config.declare("FreeVendActive", ConfigValue::Bool(false), Mutability::ReadWrite);
    config.declare("FreeVendIdTag", ConfigValue::Str(String::new()), Mutability::ReadWrite);
    config.declare(
        "TxStartOnPowerPathClosed",
        ConfigValue::Bool(false),
        Mutability::ReadWrite,
    );
}

/// Pushes `ConnectionTimeOut`/`FreeVendActive`/`FreeVendIdTag`/`TxStartOnPowerPathClosed` from the
/// configuration store onto every connector. Called once at boot and again whenever
/// `ChangeConfiguration` touches one of these keys.
pub fn apply_connector_config(engine: &mut EngineHandle) {
    let timeout = engine
        .config
        .get("ConnectionTimeOut")
        .and_then(ConfigValue::as_i64)
        .filter(|v| *v >= 0)
        .map(|v| Duration::from_secs(v as u64))
        .unwrap_or(Duration::from_secs(30));
    let free_vend_active = engine
        .config
        .get("FreeVendActive")
        .and_then(ConfigValue::as_bool)
        .unwrap_or(false);
    let free_vend_id_tag = engine
        .config
        .get("FreeVendIdTag")
        .map(ConfigValue::as_str)
        .filter(|s| !s.is_empty());
    let tx_start_on_power_path_closed = engine
        .config
        .get("TxStartOnPowerPathClosed")
        .and_then(ConfigValue::as_bool)
        .unwrap_or(false);

    for connector in &mut engine.connectors {
        connector.set_connection_timeout(timeout);
        connector.set_free_vend(free_vend_active, free_vend_id_tag.clone());
        connector.set_tx_start_on_power_path_closed(tx_start_on_power_path_closed);
    }
}

/// Enqueues the `BootNotification.req` that must be the very first request sent after the
/// engine is constructed; it is reserved `OpNr` 1 so it always wins arbitration against any
/// request created afterwards.
pub fn send_boot_notification(engine: &mut EngineHandle, vendor: String, model: String) {
    let op_nr = engine.queue.reserve_op_nr();
    let op = BootNotificationOperation { vendor, model };
    engine
        .queue
        .enqueue(Request::new(op_nr, QueueBand::PreBoot, Box::new(op)));
}

/// Resends BootNotification once a `BootState::Rejected` retry deadline has passed. Polled every
/// `loop_tick`; a no-op while `boot_state` is `Pending` or `Accepted`.
pub fn check_retry(engine: &mut EngineHandle) {
    let BootState::Rejected { retry_at } = engine.boot_state else {
        return;
    };
    if Instant::now() < retry_at {
        return;
    }
    send_boot_notification(engine, engine.boot_vendor.clone(), engine.boot_model.clone());
    engine.boot_state = BootState::Pending;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct BootNotificationReq {
    charge_point_vendor: String,
    charge_point_model: String,
}

struct BootNotificationOperation {
    vendor: String,
    model: String,
}

impl Operation for BootNotificationOperation {
    fn action(&self) -> &'static str {
        "BootNotification"
    }

    fn create_request(&mut self, _engine: &mut EngineHandle) -> Result<Value, EngineError> {
        serde_json::to_value(BootNotificationReq {
            charge_point_vendor: self.vendor.clone(),
            charge_point_model: self.model.clone(),
        })
        .map_err(|e| EngineError::MalformedFrame(e.to_string()))
    }

    fn handle_conf(&mut self, engine: &mut EngineHandle, payload: Value) -> Result<bool, EngineError> {
        let status_str = payload
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::MalformedFrame("BootNotification.conf missing status".into()))?;
        let status = RegistrationStatusEnumType::try_from(status_str).map_err(EngineError::Validation)?;

        if let Some(current_time) = payload.get("currentTime").and_then(Value::as_str) {
            if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(current_time) {
                engine.clock.set_time(parsed.with_timezone(&chrono::Utc));
            }
        }

        match status {
            RegistrationStatusEnumType::Accepted => {
                engine.boot_state = BootState::Accepted;
                engine.boot_accepted_at = Some(Instant::now());
                Ok(true)
            }
            RegistrationStatusEnumType::Pending | RegistrationStatusEnumType::Rejected => {
                let interval = payload.get("interval").and_then(Value::as_u64).unwrap_or(30);
                engine.boot_state = BootState::Rejected {
                    retry_at: Instant::now() + Duration::from_secs(interval),
                };
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::connection::FakeConnection;
    use crate::filesystem::MemFilesystem;
    use serde_json::json;

    fn handle() -> EngineHandle {
        let mut fs = MemFilesystem::new();
        let config = ConfigStore::load(&mut fs, std::path::Path::new("c.json")).unwrap();
        EngineHandle::new(Box::new(fs), Box::new(SystemClock::new()), config, Box::new(FakeConnection::new()))
    }

    #[test]
    fn accepted_conf_sets_clock_and_state() {
        let mut engine = handle();
        let mut op = BootNotificationOperation {
            vendor: "Acme".into(),
            model: "X1".into(),
        };
        op.handle_conf(
            &mut engine,
            json!({"status": "Accepted", "currentTime": "2024-06-01T12:00:00Z", "interval": 300}),
        )
        .unwrap();
        assert_eq!(engine.boot_state, BootState::Accepted);
        assert!(engine.clock.is_synchronized());
        assert!(engine.boot_accepted_at.is_some());
    }

    #[test]
    fn rejected_conf_sets_retry_deadline_without_resending() {
        let mut engine = handle();
        let mut op = BootNotificationOperation {
            vendor: "Acme".into(),
            model: "X1".into(),
        };
        op.handle_conf(&mut engine, json!({"status": "Pending", "interval": 10}))
            .unwrap();
        assert!(matches!(engine.boot_state, BootState::Rejected { .. }));
        assert_eq!(engine.queue.len(), 0, "must wait for the retry interval, not resend immediately");
    }

    #[test]
    fn check_retry_does_nothing_before_the_deadline() {
        let mut engine = handle();
        engine.boot_vendor = "Acme".into();
        engine.boot_model = "X1".into();
        engine.boot_state = BootState::Rejected {
            retry_at: Instant::now() + Duration::from_secs(60),
        };
        check_retry(&mut engine);
        assert_eq!(engine.queue.len(), 0);
    }

    #[test]
    fn check_retry_resends_boot_notification_after_deadline() {
        let mut engine = handle();
        engine.boot_vendor = "Acme".into();
        engine.boot_model = "X1".into();
        engine.boot_state = BootState::Rejected {
            retry_at: Instant::now() - Duration::from_secs(1),
        };
        check_retry(&mut engine);
        assert_eq!(engine.queue.len(), 1);
        assert_eq!(engine.boot_state, BootState::Pending);
    }

    #[test]
    fn send_boot_notification_reserves_lowest_op_nr() {
        let mut engine = handle();
        send_boot_notification(&mut engine, "Acme".into(), "X1".into());
        assert_eq!(engine.queue.len(), 1);
    }

    #[test]
    fn boot_stats_recovery_increments_attempts() {
        let mut engine = handle();
        run_boot_stats_recovery(&mut engine).unwrap();
        let stats = load_boot_stats(engine.fs.as_ref());
        assert_eq!(stats.attempts, 1);
    }

    #[test]
    fn boot_stats_recovery_purges_after_exceeding_max_attempts() {
        let mut engine = handle();
        save_boot_stats(engine.fs.as_mut(), &BootStats { attempts: MAX_BOOT_ATTEMPTS }).unwrap();

        crate::ops::start_transaction::begin(&mut engine, 1, "TAG".into(), 0).unwrap();
        assert!(engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().is_some());

        run_boot_stats_recovery(&mut engine).unwrap();

        let stats = load_boot_stats(engine.fs.as_ref());
        assert_eq!(stats.attempts, 0);
        assert!(engine.tx_store.load(engine.fs.as_ref(), 1, 0).unwrap().is_none());
    }

    #[test]
    fn apply_connector_config_pushes_free_vend_settings() {
        let mut engine = handle();
        declare_defaults(&mut engine.config, engine.fs.as_mut());
        engine
            .config
            .set(engine.fs.as_mut(), "FreeVendActive", ConfigValue::Bool(true))
            .unwrap();
        engine
            .config
            .set(engine.fs.as_mut(), "FreeVendIdTag", ConfigValue::Str("FREEVEND".into()))
            .unwrap();
        apply_connector_config(&mut engine);

        let outcome = engine.connector_mut(1).unwrap().poll(crate::connector::ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(outcome.auto_start_id_tag.as_deref(), Some("FREEVEND"));
    }
}
