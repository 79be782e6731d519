//! Per-link traffic counters.

/// Statistics for a link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Total messages sent.
    pub messages_sent: u64,
    /// Total messages received.
    pub messages_recv: u64,
    /// Total payload bytes sent.
    pub bytes_sent: u64,
    /// Total payload bytes received.
    pub bytes_recv: u64,
    /// Payloads that failed to decode.
    pub decode_errors: u64,
    /// Timestamp of last received message (Unix milliseconds).
    pub last_recv_ms: u64,
}

impl LinkStats {
    /// Create new link statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent message.
    pub fn record_sent(&mut self, bytes: usize) {
        self.messages_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    /// Record a received message.
    pub fn record_recv(&mut self, bytes: usize, timestamp_ms: u64) {
        self.messages_recv += 1;
        self.bytes_recv += bytes as u64;
        self.last_recv_ms = timestamp_ms;
    }

    /// Record a payload that could not be decoded.
    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    /// Time since last receive.
    pub fn time_since_recv(&self, current_time_ms: u64) -> u64 {
        if self.last_recv_ms == 0 {
            return u64::MAX;
        }
        current_time_ms.saturating_sub(self.last_recv_ms)
    }
}
