use std::collections::VecDeque;

use crate::request::{OpNr, QueueBand, Request};

/// Arbitrates pending [`Request`]s across all queue bands.
///
/// Grounded on `Core/RequestQueue.cpp`: every band (pre-boot, default, one per active
/// transaction) is a FIFO, but only one `Request` may be in flight across *all* bands at once,
/// and when nothing is in flight the request with the lowest `OpNr` is sent next -- so an older
/// StartTransaction always preempts a newer Heartbeat even though they live in different bands.
#[derive(Default)]
pub struct RequestQueue {
    requests: VecDeque<Request>,
    next_op_nr: OpNr,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self {
            requests: VecDeque::new(),
            next_op_nr: 1,
        }
    }

    /// Reserve the next `OpNr`, for callers that must record it (e.g. in a WAL entry) before the
    /// `Request` itself is constructed.
    pub fn reserve_op_nr(&mut self) -> OpNr {
        let nr = self.next_op_nr;
        self.next_op_nr += 1;
        nr
    }

    pub fn enqueue(&mut self, request: Request) {
        self.requests.push_back(request);
    }

    pub fn is_anything_in_flight(&self) -> bool {
        self.requests.iter().any(|r| r.in_flight)
    }

    /// Returns the lowest-`OpNr` request that is neither in flight nor already exhausted its
    /// retries, if nothing is currently in flight. When `pre_boot_only` is set (before
    /// BootNotification has been accepted), requests outside [`QueueBand::PreBoot`] are ignored
    /// entirely rather than merely deprioritized, so a queued transaction request with a lower
    /// `OpNr` than a later boot retry never blocks that retry from being picked.
    pub fn next_to_send(&mut self, pre_boot_only: bool) -> Option<&mut Request> {
        if self.is_anything_in_flight() {
            return None;
        }
        self.requests
            .iter_mut()
            .filter(|r| r.message_id.is_none())
            .filter(|r| !pre_boot_only || r.band == QueueBand::PreBoot)
            .min_by_key(|r| r.op_nr)
    }

    pub fn find_by_message_id(&mut self, message_id: &str) -> Option<&mut Request> {
        self.requests
            .iter_mut()
            .find(|r| r.message_id.as_deref() == Some(message_id))
    }

    /// Remove a completed request (the operation returned `Ok(true)` from `handle_conf`/
    /// `handle_call_error`, or its retries were exhausted).
    pub fn remove_by_message_id(&mut self, message_id: &str) -> Option<Request> {
        let idx = self
            .requests
            .iter()
            .position(|r| r.message_id.as_deref() == Some(message_id))?;
        self.requests.remove(idx)
    }

    /// Remove the winning request from the queue so its `Operation::create_request` can be
    /// called with an unaliased `&mut EngineHandle` (the queue is itself a field of
    /// `EngineHandle`). The caller re-inserts it with [`Self::put_back`] once sent.
    pub fn take_next_to_send(&mut self, pre_boot_only: bool) -> Option<Request> {
        if self.is_anything_in_flight() {
            return None;
        }
        let idx = self
            .requests
            .iter()
            .enumerate()
            .filter(|(_, r)| r.message_id.is_none())
            .filter(|(_, r)| !pre_boot_only || r.band == QueueBand::PreBoot)
            .min_by_key(|(_, r)| r.op_nr)
            .map(|(idx, _)| idx)?;
        self.requests.remove(idx)
    }

    /// Same split-borrow trick as [`Self::take_next_to_send`], for handling a CALLRESULT/
    /// CALLERROR reply: the request is removed so `Operation::handle_conf` can take
    /// `&mut EngineHandle` without aliasing the queue.
    pub fn take_by_message_id(&mut self, message_id: &str) -> Option<Request> {
        self.remove_by_message_id(message_id)
    }

    pub fn put_back(&mut self, request: Request) {
        self.requests.push_back(request);
    }

    /// Remove and return every request that has exhausted its retry budget. A request still
    /// `in_flight` is left alone even past its retry budget: it is waiting on a reply to the
    /// attempt that pushed it over the limit, and [`Self::expire_timed_out`] is what eventually
    /// frees it if that reply never comes.
    pub fn drop_exhausted(&mut self) -> Vec<Request> {
        let mut dropped = vec![];
        let mut i = 0;
        while i < self.requests.len() {
            if !self.requests[i].in_flight && self.requests[i].has_exhausted_retries() {
                dropped.push(self.requests.remove(i).unwrap());
            } else {
                i += 1;
            }
        }
        dropped
    }

    /// Clear `in_flight` on the currently in-flight request once it has been waiting longer than
    /// `timeout`, so the next [`Self::take_next_to_send`] can retransmit it.
    ///
    /// Grounded on `Core/RequestQueue.cpp`'s `VolatileRequestQueue::loop()`, which checks
    /// `isTimeoutExceeded()` on the front request every tick and calls `executeTimeout()` to let
    /// it retry or give up.
    pub fn expire_timed_out(&mut self, timeout: std::time::Duration) {
        if let Some(req) = self.requests.iter_mut().find(|r| r.in_flight) {
            if req.sent_at.map(|t| t.elapsed() >= timeout).unwrap_or(false) {
                tracing::warn!(action = req.action(), "request timed out waiting for a reply");
                req.in_flight = false;
                req.message_id = None;
                req.sent_at = None;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn pending_in_band(&self, band: QueueBand) -> usize {
        self.requests.iter().filter(|r| r.band == band).count()
    }
}
