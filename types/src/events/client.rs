use crate::AudioParams;

/// `hello` handshake, sent right after the connection opens.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HelloMessage {
    version: u32,
    /// Transport the client is speaking over, e.g. "websocket"
    transport: String,
    audio_params: AudioParams,
}

impl HelloMessage {
    pub fn new(transport: &str, audio_params: AudioParams) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION,
            transport: transport.to_string(),
            audio_params,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn audio_params(&self) -> &AudioParams {
        &self.audio_params
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ListenState {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "stop")]
    Stop,
    /// Text typed by the user instead of spoken.
    #[serde(rename = "detect")]
    Detect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ListenMode {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "realtime")]
    Realtime,
}

/// `listen` message
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ListenMessage {
    state: ListenState,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<ListenMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl ListenMessage {
    pub fn start() -> Self {
        Self {
            state: ListenState::Start,
            mode: Some(ListenMode::Auto),
            text: None,
            source: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            state: ListenState::Stop,
            mode: Some(ListenMode::Auto),
            text: None,
            source: None,
        }
    }

    pub fn detect(text: &str) -> Self {
        Self {
            state: ListenState::Detect,
            mode: None,
            text: Some(text.to_string()),
            source: Some("text".to_string()),
        }
    }

    pub fn with_mode(mut self, mode: ListenMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn state(&self) -> ListenState {
        self.state
    }

    pub fn mode(&self) -> Option<ListenMode> {
        self.mode
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

/// `abort` message, asks the peer to stop the response in progress
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AbortMessage {
    session_id: String,
}

impl AbortMessage {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
