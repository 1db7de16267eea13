use std::path::Path;

use crate::clock::Clock;
use crate::config::ConfigStore;
use crate::connection::Connection;
use crate::connector::{Connector, ConnectorInputs, PollOutcome};
use crate::filesystem::FilesystemAdapter;
use crate::meter_store::MeterValueStore;
use crate::queue::RequestQueue;
use crate::transaction_store::TransactionStore;

/// Owns every collaborator an [`Operation`](crate::traits::Operation) may need, handed to
/// operations by `&mut` reference instead of the cyclic `shared_ptr<Context>` the original C++
/// engine threads through every object. There is exactly one `EngineHandle` per [`Engine`]; it
/// has no reference back to the `Engine` itself, so nothing here can form a reference cycle.
pub struct EngineHandle {
    pub fs: Box<dyn FilesystemAdapter>,
    pub clock: Box<dyn Clock>,
    pub config: ConfigStore,
    pub connection: Box<dyn Connection>,
    pub queue: RequestQueue,
    pub tx_store: TransactionStore,
    pub mv_store: MeterValueStore,
    pub connectors: Vec<Connector>,
    pub boot_state: BootState,
    /// Carried so [`crate::boot::check_retry`] can rebuild `BootNotification.req` without the
    /// vendor/model strings being threaded through every call site.
    pub boot_vendor: String,
    pub boot_model: String,
    /// Set when `boot_state` transitions to `Accepted`; cleared once
    /// [`crate::boot::check_boot_success`] has reset the boot attempt counter.
    pub boot_accepted_at: Option<std::time::Instant>,
}

impl EngineHandle {
    pub fn new(
        fs: Box<dyn FilesystemAdapter>,
        clock: Box<dyn Clock>,
        config: ConfigStore,
        connection: Box<dyn Connection>,
    ) -> Self {
        Self {
            fs,
            clock,
            config,
            connection,
            queue: RequestQueue::new(),
            tx_store: TransactionStore::new("tx", crate::transaction_store::DEFAULT_CAPACITY),
            mv_store: MeterValueStore::new("mv"),
            connectors: vec![Connector::new(1)],
            boot_state: BootState::Pending,
            boot_vendor: String::new(),
            boot_model: String::new(),
            boot_accepted_at: None,
        }
    }

    pub fn connector_mut(&mut self, id: u32) -> Option<&mut Connector> {
        self.connectors.iter_mut().find(|c| c.id == id)
    }

    pub fn apply_connector_inputs(&mut self, id: u32, inputs: ConnectorInputs) -> PollOutcome {
        self.connector_mut(id)
            .map(|c| c.poll(inputs))
            .unwrap_or_default()
    }

    /// How long an in-flight request may go unanswered before [`RequestQueue::expire_timed_out`]
    /// frees it up for retransmission. Reuses `ConnectionTimeOut` rather than introducing a
    /// separate configuration key, since both describe "how long to wait before giving up".
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config
            .get("ConnectionTimeOut")
            .and_then(crate::config::ConfigValue::as_i64)
            .filter(|v| *v > 0)
            .map(|v| std::time::Duration::from_secs(v as u64))
            .unwrap_or(std::time::Duration::from_secs(30))
    }
}

/// Re-enqueues outstanding `StartTransaction`/`StopTransaction` requests for transactions that
/// were written to disk but never confirmed before the last reboot, since the in-memory
/// `RequestQueue` does not survive a crash.
fn recover_pending_transactions(engine: &mut EngineHandle) -> Result<(), crate::errors::EngineError> {
    let connector_ids: Vec<u32> = engine.connectors.iter().map(|c| c.id).collect();
    for connector_id in connector_ids {
        for tx in engine.tx_store.pending(engine.fs.as_ref(), connector_id)? {
            if !tx.started_confirmed {
                tracing::info!(connector_id, tx_nr = tx.tx_nr, "re-enqueuing unconfirmed StartTransaction");
                crate::ops::start_transaction::requeue(engine, &tx);
            } else {
                tracing::info!(connector_id, tx_nr = tx.tx_nr, "re-enqueuing unconfirmed StopTransaction");
                crate::ops::stop_transaction::requeue(engine, &tx)?;
            }
        }
    }
    Ok(())
}

/// Registration status of the charging station with the CSMS, tracked across BootNotification
/// attempts (OCPP 1.6 §4.2: a `Pending`/`Rejected` response means retry after `interval` seconds,
/// and no other operation may be sent until `Accepted`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Pending,
    Accepted,
    Rejected { retry_at: std::time::Instant },
}

/// The public façade of the Operation Engine: one `Engine` per charging station, driven purely
/// by the host calling `loop_tick` from its own scheduler, plus side-channel calls to begin or
/// end a transaction and to feed in connector sensor state.
pub struct Engine {
    pub handle: EngineHandle,
    pub message_service: crate::message_service::MessageService,
}

impl Engine {
    pub fn new(
        fs: Box<dyn FilesystemAdapter>,
        clock: Box<dyn Clock>,
        connection: Box<dyn Connection>,
        vendor: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, crate::errors::EngineError> {
        let mut fs = fs;
        let config = ConfigStore::load(fs.as_mut(), Path::new(crate::config::CONFIG_STORE_PATH))?;
        let mut handle = EngineHandle::new(fs, clock, config, connection);
        crate::boot::declare_defaults(&mut handle.config, handle.fs.as_mut());
        crate::boot::apply_connector_config(&mut handle);
        handle.boot_vendor = vendor.into();
        handle.boot_model = model.into();

        crate::boot::run_boot_stats_recovery(&mut handle)?;
        recover_pending_transactions(&mut handle)?;

        crate::boot::send_boot_notification(&mut handle, handle.boot_vendor.clone(), handle.boot_model.clone());
        Ok(Self {
            handle,
            message_service: crate::message_service::MessageService::new(),
        })
    }

    /// Drive one iteration of the cooperative scheduler: drain inbound frames, arbitrate the
    /// outbound queue, and (re)send at most one CALL. Never blocks.
    pub fn loop_tick(&mut self) {
        let incoming: Vec<String> = self.handle.connection.poll_incoming();
        for frame in incoming {
            if let Err(e) = self.message_service.handle_incoming(&mut self.handle, &frame) {
                tracing::warn!(error = %e, "failed to process incoming frame");
            }
        }
        crate::boot::check_retry(&mut self.handle);
        crate::boot::check_boot_success(&mut self.handle);
        self.handle.queue.expire_timed_out(self.handle.request_timeout());
        for dropped in self.handle.queue.drop_exhausted() {
            tracing::warn!(action = dropped.action(), "request exhausted its retries, dropping");
        }
        self.message_service.send_next(&mut self.handle);
    }

    /// Request authorization for an `idTag`, e.g. when a badge is presented before plugging in.
    pub fn authorize(&mut self, id_tag: impl Into<String>) {
        crate::authorize::enqueue(&mut self.handle, id_tag);
    }

    pub fn begin_transaction(
        &mut self,
        connector_id: u32,
        id_tag: String,
        meter_start_wh: i64,
    ) -> Result<(), crate::errors::EngineError> {
        let ready = self
            .handle
            .connector_mut(connector_id)
            .map(|c| c.ready_to_start_transaction())
            .unwrap_or(true);
        if !ready {
            return Err(crate::errors::EngineError::Configuration(format!(
                "connector {connector_id} is not ready to start a transaction yet (TxStartPoint not reached)"
            )));
        }
        crate::ops::start_transaction::begin(&mut self.handle, connector_id, id_tag, meter_start_wh)
    }

    pub fn end_transaction(
        &mut self,
        connector_id: u32,
        meter_stop_wh: i64,
        reason: crate::transaction::StopReason,
    ) -> Result<(), crate::errors::EngineError> {
        crate::ops::stop_transaction::begin(&mut self.handle, connector_id, meter_stop_wh, reason)
    }

    /// Feed fresh connector sensor state in, emitting a `StatusNotification.req` on any status
    /// transition and auto-starting a transaction when `FreeVendActive` fires.
    pub fn set_connector_inputs(&mut self, connector_id: u32, inputs: ConnectorInputs) {
        let outcome = self.handle.apply_connector_inputs(connector_id, inputs);
        if let Some(status) = outcome.status {
            crate::ops::status_notification::enqueue(&mut self.handle, connector_id, status);
        }
        if let Some(id_tag) = outcome.auto_start_id_tag {
            if let Err(e) = self.begin_transaction(connector_id, id_tag, 0) {
                tracing::warn!(connector_id, error = %e, "free-vend auto-start failed");
            }
        }
    }
}
