/// Failures at the transport and media boundaries. None of these reach the
/// turn-taking transitions; they are logged where they occur.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport unavailable: connection not ready")]
    TransportUnavailable,
    #[error("already connected or connecting")]
    AlreadyConnected,
    #[error("invalid connection request: {0}")]
    InvalidRequest(String),
    #[error("malformed handshake reply: {0}")]
    HandshakeMalformed(String),
    #[error("malformed control message: {0}")]
    ControlMessageMalformed(String),
    #[error("undecodable audio payload: {0}")]
    Codec(String),
    #[error("media unsupported: {0}")]
    MediaUnsupported(String),
    #[error("transport closed: {}", .0.as_deref().unwrap_or("no reason"))]
    TransportClosed(Option<String>),
    #[error("transport error: {0}")]
    TransportError(String),
    #[error("conversation has stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, Error>;
