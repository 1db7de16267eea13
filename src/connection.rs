/// Abstracts the WebSocket transport. The engine never opens sockets itself; the host hands it
/// a `Connection` implementation (backed by whatever TLS/WS stack fits the target) and drains
/// inbound frames into `receive_message` each `loop_tick`.
///
/// Deliberately non-blocking: `send` and `poll_incoming` must return immediately, matching the
/// original engine's assumption that `loop()` never stalls waiting on the network.
pub trait Connection: Send {
    /// Queue a raw OCPP-J text frame for transmission. Returns an error only for unrecoverable
    /// transport failures (the link is down); backpressure is handled internally by the
    /// implementation, not surfaced here.
    fn send(&mut self, frame: &str) -> Result<(), ConnectionError>;

    /// Drain any frames that have arrived since the last call, in receipt order.
    fn poll_incoming(&mut self) -> Vec<String>;

    fn is_connected(&self) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection is closed")]
    Closed,
    #[error("transport error: {0}")]
    Transport(String),
}

/// An in-memory [`Connection`] used by tests: records every outbound frame and lets the test
/// inject inbound frames.
#[derive(Default)]
pub struct FakeConnection {
    pub sent: Vec<String>,
    pub inbox: std::collections::VecDeque<String>,
    pub connected: bool,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            sent: vec![],
            inbox: std::collections::VecDeque::new(),
            connected: true,
        }
    }

    pub fn push_incoming(&mut self, frame: impl Into<String>) {
        self.inbox.push_back(frame.into());
    }

    pub fn last_sent(&self) -> Option<&str> {
        self.sent.last().map(|s| s.as_str())
    }
}

impl Connection for FakeConnection {
    fn send(&mut self, frame: &str) -> Result<(), ConnectionError> {
        if !self.connected {
            return Err(ConnectionError::Closed);
        }
        self.sent.push(frame.to_string());
        Ok(())
    }

    fn poll_incoming(&mut self) -> Vec<String> {
        self.inbox.drain(..).collect()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_connection_records_sent_frames() {
        let mut conn = FakeConnection::new();
        conn.send("[2,\"1\",\"Heartbeat\",{}]").unwrap();
        assert_eq!(conn.sent.len(), 1);
    }

    #[test]
    fn fake_connection_rejects_send_when_closed() {
        let mut conn = FakeConnection::new();
        conn.connected = false;
        assert!(conn.send("x").is_err());
    }

    #[test]
    fn fake_connection_drains_inbox_in_order() {
        let mut conn = FakeConnection::new();
        conn.push_incoming("a");
        conn.push_incoming("b");
        assert_eq!(conn.poll_incoming(), vec!["a", "b"]);
        assert!(conn.poll_incoming().is_empty());
    }
}
