/// Traffic counters kept per endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    /// In-band datagrams the channel rejected as stale, duplicate or truncated.
    pub packets_discarded: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_errors: u64,
    pub receive_errors: u64,
}

impl NetworkStats {
    pub fn record_sent(&mut self, bytes: usize) {
        self.packets_sent += 1;
        self.bytes_sent += bytes as u64;
    }

    pub fn record_received(&mut self, bytes: usize) {
        self.packets_received += 1;
        self.bytes_received += bytes as u64;
    }

    /// Share of received in-band datagrams that were thrown away, in percent.
    pub fn discard_percent(&self) -> f32 {
        if self.packets_received == 0 {
            return 0.0;
        }
        self.packets_discarded as f32 * 100.0 / self.packets_received as f32
    }
}
