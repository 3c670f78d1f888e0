use crate::AudioParams;

/// `hello` reply carrying the session id assigned by the peer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ServerHelloEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_params: Option<AudioParams>,
}

impl ServerHelloEvent {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            version: Some(crate::PROTOCOL_VERSION),
            transport: None,
            audio_params: None,
        }
    }

    /// `None` or empty means the handshake reply is unusable.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn version(&self) -> Option<u32> {
        self.version
    }

    pub fn transport(&self) -> Option<&str> {
        self.transport.as_deref()
    }

    pub fn audio_params(&self) -> Option<&AudioParams> {
        self.audio_params.as_ref()
    }
}

/// `stt` event, the recognised text of what the user said
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SttEvent {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl SttEvent {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TtsState {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "sentence_start")]
    SentenceStart,
    #[serde(rename = "sentence_end")]
    SentenceEnd,
    #[serde(other)]
    Other,
}

/// `tts` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TtsEvent {
    state: TtsState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl TtsEvent {
    pub fn new(state: TtsState) -> Self {
        Self {
            state,
            text: None,
            sample_rate: None,
            session_id: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn state(&self) -> &TtsState {
        &self.state
    }

    /// Sentence text, present on `sentence_start` / `sentence_end`.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

/// `llm` event, assistant text plus an emotion tag for the avatar
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LlmEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
}

impl LlmEvent {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn emotion(&self) -> Option<&str> {
        self.emotion.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}
