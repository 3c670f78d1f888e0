pub mod client;
pub mod server;

use client::*;
use server::*;

/// Messages sent by this side of the connection as text frames.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "hello")]
    Hello(HelloMessage),
    #[serde(rename = "listen")]
    Listen(ListenMessage),
    #[serde(rename = "abort")]
    Abort(AbortMessage),
}

/// Messages received from the remote peer as text frames.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "hello")]
    Hello(ServerHelloEvent),
    #[serde(rename = "stt")]
    Stt(SttEvent),
    #[serde(rename = "tts")]
    Tts(TtsEvent),
    #[serde(rename = "llm")]
    Llm(LlmEvent),
}

impl ClientMessage {
    pub fn hello(transport: &str, audio_params: crate::AudioParams) -> Self {
        ClientMessage::Hello(HelloMessage::new(transport, audio_params))
    }

    pub fn listen_start() -> Self {
        ClientMessage::Listen(ListenMessage::start())
    }

    pub fn listen_stop() -> Self {
        ClientMessage::Listen(ListenMessage::stop())
    }

    pub fn detect_text(text: &str) -> Self {
        ClientMessage::Listen(ListenMessage::detect(text))
    }

    pub fn abort(session_id: &str) -> Self {
        ClientMessage::Abort(AbortMessage::new(session_id))
    }

    /// Tag used on the wire, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Hello(_) => "hello",
            ClientMessage::Listen(_) => "listen",
            ClientMessage::Abort(_) => "abort",
        }
    }
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Hello(_) => "hello",
            ServerMessage::Stt(_) => "stt",
            ServerMessage::Tts(_) => "tts",
            ServerMessage::Llm(_) => "llm",
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            ServerMessage::Hello(e) => e.session_id(),
            ServerMessage::Stt(e) => e.session_id(),
            ServerMessage::Tts(e) => e.session_id(),
            ServerMessage::Llm(e) => e.session_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hello_wire_shape() {
        let hello = ClientMessage::hello("websocket", crate::AudioParams::default());
        let value = serde_json::to_value(&hello).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "hello",
                "version": 1,
                "transport": "websocket",
                "audio_params": {
                    "format": "opus",
                    "sample_rate": 24000,
                    "channels": 1,
                    "frame_duration": 60
                }
            })
        );
    }

    #[test]
    fn test_listen_and_abort_wire_shapes() {
        assert_eq!(
            serde_json::to_value(ClientMessage::listen_start()).unwrap(),
            json!({"type": "listen", "state": "start", "mode": "auto"})
        );
        assert_eq!(
            serde_json::to_value(ClientMessage::listen_stop()).unwrap(),
            json!({"type": "listen", "state": "stop", "mode": "auto"})
        );
        assert_eq!(
            serde_json::to_value(ClientMessage::detect_text("hi there")).unwrap(),
            json!({"type": "listen", "state": "detect", "text": "hi there", "source": "text"})
        );
        assert_eq!(
            serde_json::to_value(ClientMessage::abort("abc123")).unwrap(),
            json!({"type": "abort", "session_id": "abc123"})
        );
    }

    #[test]
    fn test_parse_inbound_messages() {
        let hello: ServerMessage = serde_json::from_str(
            r#"{"type":"hello","version":1,"transport":"websocket","session_id":"abc123",
                "audio_params":{"format":"opus","sample_rate":24000,"channels":1,"frame_duration":60}}"#,
        )
        .unwrap();
        assert_eq!(hello.session_id(), Some("abc123"));

        let tts: ServerMessage =
            serde_json::from_str(r#"{"type":"tts","state":"sentence_start","text":"Hello.","session_id":"abc123"}"#)
                .unwrap();
        match tts {
            ServerMessage::Tts(e) => {
                assert_eq!(e.state(), &TtsState::SentenceStart);
                assert_eq!(e.text(), Some("Hello."));
            }
            other => panic!("unexpected message: {:?}", other),
        }

        let llm: ServerMessage =
            serde_json::from_str(r#"{"type":"llm","text":"😊","emotion":"happy","session_id":"abc123"}"#).unwrap();
        match llm {
            ServerMessage::Llm(e) => assert_eq!(e.emotion(), Some("happy")),
            other => panic!("unexpected message: {:?}", other),
        }

        let stt: ServerMessage = serde_json::from_str(r#"{"type":"stt","text":"what time is it"}"#).unwrap();
        assert_eq!(stt.kind(), "stt");
    }

    #[test]
    fn test_unknown_tts_state_is_tolerated() {
        let tts: ServerMessage = serde_json::from_str(r#"{"type":"tts","state":"stop"}"#).unwrap();
        match tts {
            ServerMessage::Tts(e) => assert_eq!(e.state(), &TtsState::Other),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_inbound_is_an_error() {
        assert!(serde_json::from_str::<ServerMessage>(r#"{"type":"iot","commands":[]}"#).is_err());
        assert!(serde_json::from_str::<ServerMessage>(r#"{"session_id":"abc"}"#).is_err());
        assert!(serde_json::from_str::<ServerMessage>("not json").is_err());
    }
}
