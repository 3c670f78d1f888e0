pub mod audio;
pub mod events;

pub use audio::{AudioFormat, AudioParams};
pub use events::{ClientMessage, ServerMessage};
pub use events::client::{AbortMessage, HelloMessage, ListenMessage, ListenMode, ListenState};
pub use events::server::{LlmEvent, ServerHelloEvent, SttEvent, TtsEvent, TtsState};

/// Protocol version declared in the outbound handshake.
pub const PROTOCOL_VERSION: u32 = 1;
