/// Transport counters, shared with the writer task.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    text_sent: u64,
    audio_sent: u64,
    dropped_sends: u64,
    received: u64,
    malformed: u64,
    reconnects: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_text_sent(&mut self) {
        self.text_sent += 1;
    }

    pub(crate) fn record_audio_sent(&mut self) {
        self.audio_sent += 1;
    }

    pub(crate) fn record_dropped_send(&mut self) {
        self.dropped_sends += 1;
    }

    pub(crate) fn record_received(&mut self) {
        self.received += 1;
    }

    pub(crate) fn record_malformed(&mut self) {
        self.malformed += 1;
    }

    pub(crate) fn record_reconnect(&mut self) {
        self.reconnects += 1;
    }

    pub fn text_sent(&self) -> u64 {
        self.text_sent
    }

    pub fn audio_sent(&self) -> u64 {
        self.audio_sent
    }

    /// Sends refused because the connection was not open or the outbound
    /// queue was full.
    pub fn dropped_sends(&self) -> u64 {
        self.dropped_sends
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects
    }
}
