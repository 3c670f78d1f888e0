#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    Connecting,
    Open,
    #[default]
    Closed,
    Errored,
}

/// Connection lifecycle as seen by the rest of the client. The session id is
/// non-empty only while open and after the server's hello reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    session_id: String,
    transport_state: TransportState,
}

impl Session {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport_state
    }

    pub fn is_open(&self) -> bool {
        self.transport_state == TransportState::Open
    }

    pub fn is_ready(&self) -> bool {
        self.is_open() && !self.session_id.is_empty()
    }

    pub(crate) fn set_state(&mut self, state: TransportState) {
        self.transport_state = state;
    }

    pub(crate) fn assign_id(&mut self, session_id: &str) {
        self.session_id = session_id.to_string();
    }

    pub(crate) fn clear_id(&mut self) {
        self.session_id.clear();
    }
}
