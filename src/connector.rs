use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::errors::OcppError;

/// OCPP 1.6 `ChargePointStatus`, reported via `StatusNotification.req`.
///
/// OCPP 2.0.1's `ConnectorStatusEnumType` only has 5 states and does not cover the intermediate
/// `Preparing`/`Charging`/`SuspendedEV*`/`Finishing` states 1.6 requires, so this is a fresh enum
/// rather than a reuse of that type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargePointStatus {
    Available,
    Preparing,
    Charging,
    SuspendedEVSE,
    SuspendedEV,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

impl ChargePointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargePointStatus::Available => "Available",
            ChargePointStatus::Preparing => "Preparing",
            ChargePointStatus::Charging => "Charging",
            ChargePointStatus::SuspendedEVSE => "SuspendedEVSE",
            ChargePointStatus::SuspendedEV => "SuspendedEV",
            ChargePointStatus::Finishing => "Finishing",
            ChargePointStatus::Reserved => "Reserved",
            ChargePointStatus::Unavailable => "Unavailable",
            ChargePointStatus::Faulted => "Faulted",
        }
    }
}

impl fmt::Display for ChargePointStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for ChargePointStatus {
    type Error = OcppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "Available" => Ok(Self::Available),
            "Preparing" => Ok(Self::Preparing),
            "Charging" => Ok(Self::Charging),
            "SuspendedEVSE" => Ok(Self::SuspendedEVSE),
            "SuspendedEV" => Ok(Self::SuspendedEV),
            "Finishing" => Ok(Self::Finishing),
            "Reserved" => Ok(Self::Reserved),
            "Unavailable" => Ok(Self::Unavailable),
            "Faulted" => Ok(Self::Faulted),
            _ => Err(OcppError::InvalidEnumValueError {
                enum_name: "ChargePointStatus".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

/// Raw, host-reported inputs for one connector, sampled once per `loop_tick`.
///
/// Grounded on `Model/ConnectorBase/Connector.h`'s input signals (plug detection, power
/// availability, EV-side charging permission) which the state machine combines into a single
/// `ChargePointStatus`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectorInputs {
    pub ev_plugged: bool,
    pub energy_available: bool,
    pub ev_requests_energy: bool,
    pub suspended_by_ev: bool,
    pub faulted: bool,
}

/// What changed as a result of feeding one [`ConnectorInputs`] sample into [`Connector::poll`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollOutcome {
    /// `Some` only when the derived `ChargePointStatus` changed, so the caller knows to emit a
    /// `StatusNotification.req`.
    pub status: Option<ChargePointStatus>,
    /// Set once per plug-in cycle when `FreeVendActive` fires: the caller should begin a
    /// transaction with this `idTag` as if it had been swiped.
    pub auto_start_id_tag: Option<String>,
}

/// Derives and tracks the OCPP `ChargePointStatus` for one connector.
///
/// Grounded on `Model/ConnectorBase/ConnectorService.cpp`: status is recomputed from these same
/// signals every tick and a `StatusNotification.req` is only emitted when it actually changes;
/// `Connector::poll` mirrors that by returning a status only on a transition.
pub struct Connector {
    pub id: u32,
    status: ChargePointStatus,
    available: bool,
    has_active_transaction: bool,
    last_inputs: ConnectorInputs,
    preparing_since: Option<Instant>,
    connection_timeout: Duration,
    /// `TxStartOnPowerPathClosed` (`TransactionService16.h`'s `txStartOnPowerPathClosedBool`):
    /// when set, a transaction may not actually begin until the EV is drawing energy, postponing
    /// the usual Authorized/EVConnected start point.
    tx_start_on_power_path_closed: bool,
    free_vend_active: bool,
    free_vend_id_tag: Option<String>,
    free_vend_track_plugged: bool,
}

impl Connector {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            status: ChargePointStatus::Available,
            available: true,
            has_active_transaction: false,
            last_inputs: ConnectorInputs::default(),
            preparing_since: None,
            connection_timeout: Duration::from_secs(30),
            tx_start_on_power_path_closed: false,
            free_vend_active: false,
            free_vend_id_tag: None,
            free_vend_track_plugged: false,
        }
    }

    pub fn status(&self) -> ChargePointStatus {
        self.status
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn set_has_active_transaction(&mut self, active: bool) {
        self.has_active_transaction = active;
    }

    pub fn set_connection_timeout(&mut self, timeout: Duration) {
        self.connection_timeout = timeout;
    }

    pub fn set_tx_start_on_power_path_closed(&mut self, enabled: bool) {
        self.tx_start_on_power_path_closed = enabled;
    }

    pub fn set_free_vend(&mut self, active: bool, id_tag: Option<String>) {
        self.free_vend_active = active;
        self.free_vend_id_tag = id_tag;
    }

    /// TxStartPoint gate (spec §4.7): whether a transaction may actually begin right now, given
    /// the most recently polled inputs. Only the `PowerPathClosed` start point is modeled; the
    /// others (`ParkingBayOccupancy`, `EVConnected`, `Authorized`, `EnergyTransfer`) are already
    /// satisfied by the time a host calls `begin_transaction` in this engine's flow.
    pub fn ready_to_start_transaction(&self) -> bool {
        !self.tx_start_on_power_path_closed || self.last_inputs.ev_requests_energy
    }

    /// Recompute status from fresh inputs, and surface any free-vend auto-authorization this
    /// sample triggers.
    pub fn poll(&mut self, inputs: ConnectorInputs) -> PollOutcome {
        let mut outcome = PollOutcome::default();

        if !inputs.ev_plugged {
            self.free_vend_track_plugged = false;
        } else if self.free_vend_active && !self.free_vend_track_plugged && !self.has_active_transaction {
            self.free_vend_track_plugged = true;
            outcome.auto_start_id_tag = self.free_vend_id_tag.clone();
        }

        self.last_inputs = inputs;
        let derived = self.derive_status(inputs);
        if derived != self.status {
            self.status = derived;
            outcome.status = Some(derived);
        }
        outcome
    }

    fn derive_status(&mut self, inputs: ConnectorInputs) -> ChargePointStatus {
        if inputs.faulted {
            self.preparing_since = None;
            return ChargePointStatus::Faulted;
        }
        if !self.available {
            self.preparing_since = None;
            return ChargePointStatus::Unavailable;
        }
        if !inputs.ev_plugged {
            self.preparing_since = None;
            return ChargePointStatus::Available;
        }
        if !self.has_active_transaction {
            // ConnectionTimeOut (spec §4.7): plugged in but no transaction started within the
            // configured window aborts the pending session and reverts to Available.
            let started = *self.preparing_since.get_or_insert_with(Instant::now);
            if started.elapsed() >= self.connection_timeout {
                self.preparing_since = None;
                return ChargePointStatus::Available;
            }
            return ChargePointStatus::Preparing;
        }
        self.preparing_since = None;
        if !inputs.energy_available || inputs.suspended_by_ev {
            return if inputs.suspended_by_ev {
                ChargePointStatus::SuspendedEV
            } else {
                ChargePointStatus::SuspendedEVSE
            };
        }
        if inputs.ev_requests_energy {
            ChargePointStatus::Charging
        } else {
            ChargePointStatus::Finishing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_connector_is_available() {
        let mut c = Connector::new(1);
        let outcome = c.poll(ConnectorInputs::default());
        assert_eq!(outcome.status, None, "already Available, no transition expected");
        assert_eq!(c.status(), ChargePointStatus::Available);
    }

    #[test]
    fn plugging_in_without_transaction_is_preparing() {
        let mut c = Connector::new(1);
        let outcome = c.poll(ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(outcome.status, Some(ChargePointStatus::Preparing));
    }

    #[test]
    fn active_transaction_with_power_is_charging() {
        let mut c = Connector::new(1);
        c.set_has_active_transaction(true);
        let outcome = c.poll(ConnectorInputs {
            ev_plugged: true,
            energy_available: true,
            ev_requests_energy: true,
            ..Default::default()
        });
        assert_eq!(outcome.status, Some(ChargePointStatus::Charging));
    }

    #[test]
    fn faulted_input_overrides_everything() {
        let mut c = Connector::new(1);
        c.set_has_active_transaction(true);
        let outcome = c.poll(ConnectorInputs {
            faulted: true,
            ..Default::default()
        });
        assert_eq!(outcome.status, Some(ChargePointStatus::Faulted));
    }

    #[test]
    fn unavailable_flag_wins_over_plug_state() {
        let mut c = Connector::new(1);
        c.set_available(false);
        let outcome = c.poll(ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(outcome.status, Some(ChargePointStatus::Unavailable));
    }

    #[test]
    fn connection_timeout_reverts_to_available() {
        let mut c = Connector::new(1);
        c.set_connection_timeout(Duration::from_millis(0));
        let first = c.poll(ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(first.status, Some(ChargePointStatus::Preparing));
        std::thread::sleep(Duration::from_millis(5));
        let second = c.poll(ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(second.status, Some(ChargePointStatus::Available));
    }

    #[test]
    fn free_vend_auto_authorizes_on_plug_in() {
        let mut c = Connector::new(1);
        c.set_free_vend(true, Some("FREEVEND".into()));
        let outcome = c.poll(ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(outcome.auto_start_id_tag.as_deref(), Some("FREEVEND"));

        let second = c.poll(ConnectorInputs {
            ev_plugged: true,
            ..Default::default()
        });
        assert_eq!(second.auto_start_id_tag, None, "only fires once per plug-in cycle");
    }

    #[test]
    fn tx_start_on_power_path_closed_gates_transaction_start() {
        let mut c = Connector::new(1);
        c.set_tx_start_on_power_path_closed(true);
        assert!(!c.ready_to_start_transaction());
        c.poll(ConnectorInputs {
            ev_plugged: true,
            ev_requests_energy: true,
            ..Default::default()
        });
        assert!(c.ready_to_start_transaction());
    }
}
