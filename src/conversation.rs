//! The control loop.
//!
//! [`Conversation`] owns the transport, the turn-taking engine and the
//! playback queue, and is the only place any of them is mutated. Everything
//! else talks to it through channels: captured frames through the
//! [`AudioLevelStream`], callers through a [`ConversationHandle`].

use std::ops::ControlFlow;

use tokio::sync::{broadcast, mpsc, watch};
use voice_duplex_types::{ClientMessage, ServerMessage, TtsState};

use crate::audio::{AudioCodec, AudioFrame, AudioLevelStream, AudioSink, Playback, PlaybackId, PlaybackItem, PlaybackQueue};
use crate::client::{Client, Config, Inbound, TransportEvent, TransportRx};
use crate::engine::{
    ChatEvent, ConversationState, Effects, EngineConfig, LevelSignal, SilenceElapsed, TurnTakingEngine,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a typed utterance instead of speech.
    SendText(String),
    Connect,
    Disconnect,
    Shutdown,
}

/// Notifications for UI and other observers.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    Connected,
    SessionStarted(String),
    Disconnected(Option<String>),
    Turn(ChatEvent),
    Transcript(String),
    Reply { text: Option<String>, emotion: Option<String> },
    SpeechStarted,
    SentenceStarted(Option<String>),
    SentenceEnded(Option<String>),
}

#[derive(Clone)]
pub struct ConversationHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConversationState>,
    level: watch::Receiver<LevelSignal>,
    events: broadcast::Sender<ConversationEvent>,
}

impl ConversationHandle {
    pub async fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.command(Command::SendText(text.into())).await
    }

    pub async fn connect(&self) -> Result<()> {
        self.command(Command::Connect).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect).await
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown).await
    }

    pub async fn command(&self, command: Command) -> Result<()> {
        self.commands.send(command).await.map_err(|_| Error::Stopped)
    }

    pub fn state(&self) -> ConversationState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConversationState> {
        self.state.clone()
    }

    pub fn watch_level(&self) -> watch::Receiver<LevelSignal> {
        self.level.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }
}

pub struct Conversation<S: AudioSink> {
    client: Client,
    transport_rx: TransportRx,
    engine: TurnTakingEngine,
    timer_rx: mpsc::UnboundedReceiver<SilenceElapsed>,
    playback: PlaybackQueue<S>,
    done_rx: mpsc::UnboundedReceiver<PlaybackId>,
    frames_rx: mpsc::Receiver<AudioFrame>,
    commands_rx: mpsc::Receiver<Command>,
    events_tx: broadcast::Sender<ConversationEvent>,
}

impl<S: AudioSink> Conversation<S> {
    /// Returns the loop, a handle for callers, and the stream the capture
    /// callback pushes microphone samples into. Samples must already be
    /// mono at the session sample rate.
    pub fn new(
        config: Config,
        engine_config: EngineConfig,
        codec: impl AudioCodec + 'static,
        sink: S,
    ) -> (Self, ConversationHandle, AudioLevelStream) {
        let capacity = config.capacity();
        let frame_len = config.audio_params().frame_len();
        let (frames_tx, frames_rx) = mpsc::channel(capacity);
        let (commands_tx, commands_rx) = mpsc::channel(capacity);
        let (events_tx, _) = broadcast::channel(capacity);

        let (client, transport_rx) = Client::new(config, codec);
        let (mut engine, timer_rx) = TurnTakingEngine::new(engine_config);
        let (playback, done_rx) = PlaybackQueue::new(sink);

        for event in [
            ChatEvent::UserStartSpeaking,
            ChatEvent::UserStopSpeaking,
            ChatEvent::AiStartSpeaking,
            ChatEvent::AiStopSpeaking,
        ] {
            let events = events_tx.clone();
            engine.on(event, move |e| {
                let _ = events.send(ConversationEvent::Turn(e));
            });
        }

        let handle = ConversationHandle {
            commands: commands_tx,
            state: engine.watch_state(),
            level: engine.watch_level(),
            events: events_tx.clone(),
        };
        let conversation = Self {
            client,
            transport_rx,
            engine,
            timer_rx,
            playback,
            done_rx,
            frames_rx,
            commands_rx,
            events_tx,
        };
        (conversation, handle, AudioLevelStream::new(frame_len, frames_tx))
    }

    /// Registers a turn-taking subscriber. Must be called before `run`.
    pub fn on(&mut self, event: ChatEvent, handler: impl FnMut(ChatEvent) + Send + 'static) {
        self.engine.on(event, handler);
    }

    pub fn on_playback_empty(&mut self, callback: impl FnMut() + Send + 'static) {
        self.playback.on_empty(callback);
    }

    /// Connects to the configured server and runs until `Shutdown` or
    /// until every handle is dropped.
    pub async fn run(mut self) {
        self.connect();
        loop {
            tokio::select! {
                Some(frame) = self.frames_rx.recv() => self.on_frame(frame),
                Some(event) = self.transport_rx.recv() => self.on_transport(event),
                Some(fired) = self.timer_rx.recv() => self.on_silence(fired),
                Some(id) = self.done_rx.recv() => self.playback.finished(id),
                command = self.commands_rx.recv() => match command {
                    Some(command) => {
                        if self.on_command(command).is_break() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        self.stop();
    }

    fn connect(&mut self) {
        let url = self.client.config().url().to_string();
        if let Err(e) = self.client.connect(&url) {
            tracing::error!("failed to connect to {}: {}", url, e);
        }
    }

    fn stop(&mut self) {
        self.client.disconnect();
        self.drop_session_media();
        tracing::info!("conversation stopped");
    }

    fn on_frame(&mut self, frame: AudioFrame) {
        let mut fx = Effects::new(&mut self.client, &mut self.playback);
        self.engine.handle_frame(frame, &mut fx);
    }

    fn on_silence(&mut self, fired: SilenceElapsed) {
        let mut fx = Effects::new(&mut self.client, &mut self.playback);
        self.engine.handle_silence_elapsed(fired, &mut fx);
    }

    fn on_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::SendText(text) => {
                if text.trim().is_empty() {
                    tracing::warn!("ignoring empty text utterance");
                } else {
                    self.client.send_text(&ClientMessage::detect_text(&text));
                }
            }
            Command::Connect => self.connect(),
            Command::Disconnect => {
                self.client.disconnect();
                self.drop_session_media();
                self.publish(ConversationEvent::Disconnected(None));
            }
            Command::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn on_transport(&mut self, event: TransportEvent) {
        for inbound in self.client.handle_event(event) {
            match inbound {
                Inbound::Connected => self.publish(ConversationEvent::Connected),
                Inbound::Message(message) => self.on_message(message),
                Inbound::Audio(item) => self.on_audio(item),
                Inbound::Disconnected(reason) => {
                    self.drop_session_media();
                    self.publish(ConversationEvent::Disconnected(reason));
                }
            }
        }
    }

    fn on_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Hello(hello) => {
                if let Some(session_id) = hello.session_id() {
                    self.publish(ConversationEvent::SessionStarted(session_id.to_string()));
                }
            }
            ServerMessage::Stt(stt) => self.publish(ConversationEvent::Transcript(stt.text().to_string())),
            ServerMessage::Llm(llm) => self.publish(ConversationEvent::Reply {
                text: llm.text().map(str::to_string),
                emotion: llm.emotion().map(str::to_string),
            }),
            ServerMessage::Tts(tts) => {
                let text = tts.text().map(str::to_string);
                match tts.state() {
                    TtsState::Start => {
                        self.play_unless_user_turn();
                        self.publish(ConversationEvent::SpeechStarted);
                    }
                    TtsState::SentenceStart => self.publish(ConversationEvent::SentenceStarted(text)),
                    TtsState::SentenceEnd => self.publish(ConversationEvent::SentenceEnded(text)),
                    TtsState::Other => tracing::debug!("ignoring tts event with unknown state"),
                }
            }
        }
    }

    fn on_audio(&mut self, item: PlaybackItem) {
        if self.engine.state() == ConversationState::UserSpeaking {
            tracing::debug!("dropping AI audio while the user holds the floor");
            return;
        }
        let level = item.level();
        self.playback.enqueue(item);
        self.engine.publish_ai_level(level);
        self.play_unless_user_turn();
    }

    /// Replies play as they arrive unless the user holds the floor, which
    /// covers answers to typed utterances sent while `Idle`.
    fn play_unless_user_turn(&mut self) {
        if self.engine.state() != ConversationState::UserSpeaking
            && !self.playback.is_playing()
            && self.playback.pending() > 0
        {
            self.playback.play_next();
        }
    }

    fn drop_session_media(&mut self) {
        self.engine.handle_session_lost(&mut self.playback);
        self.playback.stop();
        self.playback.clear();
    }

    fn publish(&self, event: ConversationEvent) {
        let _ = self.events_tx.send(event);
    }
}
