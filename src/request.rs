use crate::traits::Operation;

/// Monotonically increasing operation number used to order pending requests across all queues.
///
/// Grounded on the original engine's `opNr`: queues are compared by the lowest pending `opNr`
/// across all of them, so a request enqueued earlier always wins arbitration regardless of which
/// queue (pre-boot, default, or a transaction queue) it lives in.
pub type OpNr = u64;

/// The queue band a [`Request`] belongs to, used only to pick which on-disk store (if any)
/// backs it; arbitration itself is purely by `OpNr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QueueBand {
    /// Requests that must be sent before BootNotification has been accepted -- in practice just
    /// BootNotification itself, reserved the lowest `OpNr` so it always wins arbitration.
    PreBoot,
    /// The volatile, non-transaction-critical default queue (Heartbeat, StatusNotification, ...).
    Default,
    /// A write-ahead-logged, per-connector transaction queue (StartTransaction, MeterValues,
    /// StopTransaction for one connector's active transaction).
    Transaction { connector_id: u32 },
}

impl QueueBand {
    /// The numeric band used for display/ordering purposes only (bands 10.. per connector).
    pub fn band_number(&self) -> u32 {
        match self {
            QueueBand::PreBoot => 0,
            QueueBand::Default => 1,
            QueueBand::Transaction { connector_id } => 10 + connector_id,
        }
    }
}

/// How many times a request has been (re)transmitted without a matching CALLRESULT/CALLERROR.
pub type RetryCount = u32;

/// A single in-flight (or not-yet-sent) operation bound to one OCPP-J message id.
///
/// Analogous to the original `Request` class: it owns the `Operation` that produces the
/// `.req` payload and interprets the `.conf`/CALLERROR reply, plus the bookkeeping needed to
/// decide when to (re)transmit.
pub struct Request {
    pub op_nr: OpNr,
    pub band: QueueBand,
    pub message_id: Option<String>,
    pub operation: Box<dyn Operation>,
    pub retries: RetryCount,
    pub max_retries: RetryCount,
    pub in_flight: bool,
    /// When the CALL currently in flight was transmitted, used to detect a stalled reply.
    /// Never persisted: a `Request` itself is transient, reconstructed from its WAL'd payload
    /// after a reboot rather than serialized directly.
    pub sent_at: Option<std::time::Instant>,
}

impl Request {
    pub fn new(op_nr: OpNr, band: QueueBand, operation: Box<dyn Operation>) -> Self {
        Self {
            op_nr,
            band,
            message_id: None,
            operation,
            retries: 0,
            max_retries: 3,
            in_flight: false,
            sent_at: None,
        }
    }

    pub fn action(&self) -> &'static str {
        self.operation.action()
    }

    pub fn has_exhausted_retries(&self) -> bool {
        self.retries > self.max_retries
    }
}
