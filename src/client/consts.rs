pub const URL_VAR: &str = "VOICE_DUPLEX_URL";
pub const TOKEN_VAR: &str = "VOICE_DUPLEX_TOKEN";
pub const TOKEN_ENABLE_VAR: &str = "VOICE_DUPLEX_TOKEN_ENABLE";
pub const DEVICE_ID_VAR: &str = "VOICE_DUPLEX_DEVICE_ID";
pub const CLIENT_ID_VAR: &str = "VOICE_DUPLEX_CLIENT_ID";

pub const DEFAULT_URL: &str = "ws://127.0.0.1:5000";
pub const DEFAULT_CAPACITY: usize = 1024;
pub const TRANSPORT_NAME: &str = "websocket";

/// Fixed delay before reconnecting after an unrequested disconnect.
pub const RECONNECT_DELAY_MS: u64 = 3000;
/// Upper bound on a graceful close handshake.
pub const CLOSE_TIMEOUT_MS: u64 = 1000;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const PROTOCOL_VERSION_HEADER: &str = "Protocol-Version";
pub const DEVICE_ID_HEADER: &str = "Device-Id";
pub const CLIENT_ID_HEADER: &str = "Client-Id";
