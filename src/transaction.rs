use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{OcppError, StructureValidationBuilder};
use crate::traits::OcppEntity;

/// Why a transaction ended, mirrored from OCPP 1.6's `StopTransaction.req` `reason` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EmergencyStop,
    EVDisconnected,
    HardReset,
    Local,
    Other,
    PowerLoss,
    Reboot,
    Remote,
    SoftReset,
    UnlockCommand,
    DeAuthorized,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::EmergencyStop => "EmergencyStop",
            StopReason::EVDisconnected => "EVDisconnected",
            StopReason::HardReset => "HardReset",
            StopReason::Local => "Local",
            StopReason::Other => "Other",
            StopReason::PowerLoss => "PowerLoss",
            StopReason::Reboot => "Reboot",
            StopReason::Remote => "Remote",
            StopReason::SoftReset => "SoftReset",
            StopReason::UnlockCommand => "UnlockCommand",
            StopReason::DeAuthorized => "DeAuthorized",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for StopReason {
    type Error = OcppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "EmergencyStop" => Ok(StopReason::EmergencyStop),
            "EVDisconnected" => Ok(StopReason::EVDisconnected),
            "HardReset" => Ok(StopReason::HardReset),
            "Local" => Ok(StopReason::Local),
            "Other" => Ok(StopReason::Other),
            "PowerLoss" => Ok(StopReason::PowerLoss),
            "Reboot" => Ok(StopReason::Reboot),
            "Remote" => Ok(StopReason::Remote),
            "SoftReset" => Ok(StopReason::SoftReset),
            "UnlockCommand" => Ok(StopReason::UnlockCommand),
            "DeAuthorized" => Ok(StopReason::DeAuthorized),
            _ => Err(OcppError::InvalidEnumValueError {
                enum_name: "StopReason".to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl From<StopReason> for String {
    fn from(value: StopReason) -> Self {
        value.as_str().to_string()
    }
}

/// Persisted record of one charging session on one connector.
///
/// Grounded on `ArduinoOcpp/Tasks/Transactions/Transaction.h`: a transaction is addressed by
/// `(connector_id, tx_nr)` rather than a shared pointer, matching the arena-style addressing
/// used throughout the store layer so a crash mid-transaction can be recovered by reopening the
/// file named after its `tx_nr`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub connector_id: u32,
    pub tx_nr: u32,
    pub id_tag: String,
    pub meter_start: i64,
    pub start_timestamp: Option<DateTime<Utc>>,
    /// Assigned by the CSMS in the StartTransaction.conf; `None` until that reply arrives.
    pub transaction_id: Option<i32>,
    pub meter_stop: Option<i64>,
    pub stop_timestamp: Option<DateTime<Utc>>,
    pub stop_reason: Option<StopReason>,
    /// Set once StartTransaction.conf has been received and applied.
    pub started_confirmed: bool,
    /// Set once StopTransaction.conf has been received (or the CallError path was taken and the
    /// record is being retained anyway per the documented data-loss trade-off).
    pub stopped_confirmed: bool,
    /// Set when `StartTransaction.conf`'s `idTagInfo.status` came back anything other than
    /// `Accepted`: the session is allowed to keep running (the EV is already plugged in) but is
    /// flagged so the host can cut it short instead of billing an unauthorized `idTag`.
    pub deauthorized: bool,
    /// Whether the `idTag` has been separately authorized (e.g. via a prior `Authorize.req`)
    /// ahead of this transaction starting.
    pub authorized: bool,
    /// A silent transaction is tracked locally but never reported to the CSMS (used for
    /// diagnostics/free-vend sessions that should not appear on a driver's bill).
    pub silent: bool,
    pub reservation_id: Option<i32>,
    pub tx_profile_id: Option<i32>,
}

impl Transaction {
    pub fn new(connector_id: u32, tx_nr: u32, id_tag: String, meter_start: i64) -> Self {
        Self {
            connector_id,
            tx_nr,
            id_tag,
            meter_start,
            start_timestamp: None,
            transaction_id: None,
            meter_stop: None,
            stop_timestamp: None,
            stop_reason: None,
            started_confirmed: false,
            stopped_confirmed: false,
            deauthorized: false,
            authorized: false,
            silent: false,
            reservation_id: None,
            tx_profile_id: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.started_confirmed && !self.stopped_confirmed
    }

    pub fn is_settled(&self) -> bool {
        self.started_confirmed && self.stopped_confirmed
    }
}

#[typetag::serde]
impl OcppEntity for Transaction {
    /// `idTag` is a `CiString20Type` in OCPP 1.6: 1-20 printable ASCII characters.
    fn validate(&self) -> Result<(), OcppError> {
        let mut e = StructureValidationBuilder::new();
        e.check_cardinality("id_tag", 1, 20, &self.id_tag.chars());
        e.build("Transaction")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_transaction_is_not_active() {
        let tx = Transaction::new(1, 1, "TAG".into(), 0);
        assert!(!tx.is_active());
        assert!(!tx.is_settled());
    }

    #[test]
    fn transaction_active_once_start_confirmed() {
        let mut tx = Transaction::new(1, 1, "TAG".into(), 0);
        tx.started_confirmed = true;
        assert!(tx.is_active());
    }

    #[test]
    fn transaction_settled_once_both_confirmed() {
        let mut tx = Transaction::new(1, 1, "TAG".into(), 0);
        tx.started_confirmed = true;
        tx.stopped_confirmed = true;
        assert!(!tx.is_active());
        assert!(tx.is_settled());
    }
}
