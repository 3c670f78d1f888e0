use std::sync::{Arc, Mutex};
use std::time::Duration;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use voice_duplex_types::{ClientMessage, ServerMessage};
use crate::audio::{AudioCodec, AudioFrame, PlaybackItem};
use crate::engine::Outbound;
use crate::error::{Error, Result};

mod config;
mod consts;
mod session;
mod stats;
mod utils;

pub use config::{Config, ConfigBuilder};
pub use session::{Session, TransportState};
pub use stats::Stats;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type TransportRx = mpsc::Receiver<TransportEvent>;

/// Something that happened on a connection attempt. Produced by the
/// client's background tasks; hand every one back to [`Client::handle_event`].
pub struct TransportEvent {
    attempt: u64,
    kind: EventKind,
}

impl TransportEvent {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

enum EventKind {
    Opened(Box<WsStream>),
    ConnectFailed(String),
    Text(String),
    Binary(Vec<u8>),
    Closed(Option<String>),
    Errored(String),
    ReconnectDue,
}

/// What the rest of the client needs to know after an event was applied.
#[derive(Debug, Clone)]
pub enum Inbound {
    Connected,
    Message(ServerMessage),
    Audio(PlaybackItem),
    Disconnected(Option<String>),
}

struct Connection {
    out_tx: mpsc::Sender<Message>,
    send_handle: JoinHandle<()>,
    recv_handle: JoinHandle<()>,
}

impl Connection {
    /// Lets the writer flush and close within a bounded time. The reader is
    /// stopped immediately.
    fn shutdown(self) {
        drop(self.out_tx);
        self.recv_handle.abort();
        let writer = self.send_handle;
        let abort = writer.abort_handle();
        tokio::spawn(async move {
            if tokio::time::timeout(Duration::from_millis(consts::CLOSE_TIMEOUT_MS), writer).await.is_err() {
                tracing::warn!("close handshake timed out");
                abort.abort();
            }
        });
    }
}

pub struct Client {
    config: Config,
    session: Session,
    codec: Box<dyn AudioCodec>,
    target: Option<String>,
    attempt: u64,
    closing: bool,
    connection: Option<Connection>,
    reconnect: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<TransportEvent>,
    stats: Arc<Mutex<Stats>>,
}

impl Client {
    pub fn new(config: Config, codec: impl AudioCodec + 'static) -> (Self, TransportRx) {
        let (events_tx, events_rx) = mpsc::channel(config.capacity());
        let client = Self {
            config,
            session: Session::default(),
            codec: Box::new(codec),
            target: None,
            attempt: 0,
            closing: false,
            connection: None,
            reconnect: None,
            events_tx,
            stats: Arc::new(Mutex::new(Stats::new())),
        };
        (client, events_rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    pub fn transport_state(&self) -> TransportState {
        self.session.transport_state()
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect.is_some()
    }

    pub fn stats(&self) -> Stats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Starts a connection attempt. The outcome arrives later as a
    /// [`TransportEvent`].
    pub fn connect(&mut self, target: &str) -> Result<()> {
        if matches!(self.transport_state(), TransportState::Connecting | TransportState::Open) {
            tracing::warn!("connect to {} refused: {}", target, Error::AlreadyConnected);
            return Err(Error::AlreadyConnected);
        }
        let request = utils::build_request(&self.config, target)
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;

        self.cancel_reconnect();
        self.closing = false;
        self.target = Some(target.to_string());
        self.attempt += 1;
        self.session.clear_id();
        self.session.set_state(TransportState::Connecting);

        let attempt = self.attempt;
        let events = self.events_tx.clone();
        tracing::info!("connecting to {} (attempt {})", target, attempt);
        tokio::spawn(async move {
            let kind = match tokio_tungstenite::connect_async(request).await {
                Ok((stream, _)) => EventKind::Opened(Box::new(stream)),
                Err(e) => EventKind::ConnectFailed(e.to_string()),
            };
            let _ = events.send(TransportEvent { attempt, kind }).await;
        });
        Ok(())
    }

    /// Closes the connection on request. No reconnection follows.
    pub fn disconnect(&mut self) {
        self.closing = true;
        self.cancel_reconnect();
        self.attempt += 1;
        if let Some(connection) = self.connection.take() {
            tracing::info!("disconnecting");
            connection.shutdown();
        }
        self.session.clear_id();
        self.session.set_state(TransportState::Closed);
    }

    pub fn handle_event(&mut self, event: TransportEvent) -> Vec<Inbound> {
        let TransportEvent { attempt, kind } = event;
        if attempt != self.attempt {
            if let EventKind::Opened(stream) = kind {
                tracing::debug!("closing connection from superseded attempt {}", attempt);
                tokio::spawn(async move {
                    let mut stream = stream;
                    let _ = stream.close(None).await;
                });
            } else {
                tracing::debug!("ignoring event from superseded attempt {}", attempt);
            }
            return Vec::new();
        }

        match kind {
            EventKind::Opened(stream) => self.opened(*stream),
            EventKind::ConnectFailed(e) => {
                tracing::error!("failed to connect: {}", e);
                self.lost(TransportState::Errored, Some(e))
            }
            EventKind::Text(text) => self.dispatch_text(&text).into_iter().collect(),
            EventKind::Binary(data) => self.dispatch_audio(&data).into_iter().collect(),
            EventKind::Closed(reason) => {
                tracing::info!("{}", Error::TransportClosed(reason.clone()));
                self.lost(TransportState::Closed, reason)
            }
            EventKind::Errored(e) => {
                tracing::error!("{}", Error::TransportError(e.clone()));
                self.lost(TransportState::Errored, Some(e))
            }
            EventKind::ReconnectDue => {
                self.reconnect_due();
                Vec::new()
            }
        }
    }

    /// Sends a control message. Dropped with a warning unless the
    /// connection is open.
    pub fn send_text(&mut self, message: &ClientMessage) {
        match serde_json::to_string(message) {
            Ok(text) => self.transmit(Message::Text(text), message.kind()),
            Err(e) => tracing::error!("failed to serialize message: {}", e),
        }
    }

    pub fn send_audio(&mut self, frame: &AudioFrame) {
        if !self.session.is_open() {
            self.refuse("audio");
            return;
        }
        let payload = self.codec.encode(frame.samples());
        self.transmit(Message::Binary(payload), "audio");
    }

    fn transmit(&mut self, message: Message, what: &str) {
        if !self.session.is_open() {
            self.refuse(what);
            return;
        }
        let result = match &self.connection {
            Some(connection) => connection.out_tx.try_send(message),
            None => {
                self.refuse(what);
                return;
            }
        };
        match result {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.with_stats(Stats::record_dropped_send);
                tracing::warn!("outbound queue full, {} not sent", what);
            }
            Err(TrySendError::Closed(_)) => self.refuse(what),
        }
    }

    fn refuse(&self, what: &str) {
        self.with_stats(Stats::record_dropped_send);
        tracing::warn!("{}, {} not sent", Error::TransportUnavailable, what);
    }

    fn opened(&mut self, stream: WsStream) -> Vec<Inbound> {
        let (mut write, mut read) = stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(self.config.capacity());

        let stats = self.stats.clone();
        let send_handle = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let is_text = matches!(message, Message::Text(_));
                if let Err(e) = write.send(message).await {
                    tracing::error!("failed to send message: {}", e);
                    break;
                }
                if let Ok(mut stats_guard) = stats.lock() {
                    if is_text {
                        stats_guard.record_text_sent();
                    } else {
                        stats_guard.record_audio_sent();
                    }
                }
            }
            if let Err(e) = write.close().await {
                tracing::debug!("failed to close connection: {}", e);
            }
        });

        let events = self.events_tx.clone();
        let attempt = self.attempt;
        let recv_handle = tokio::spawn(async move {
            let last = loop {
                let kind = match read.next().await {
                    None => break EventKind::Closed(None),
                    Some(Err(e)) => break EventKind::Errored(e.to_string()),
                    Some(Ok(Message::Text(text))) => EventKind::Text(text),
                    Some(Ok(Message::Binary(data))) => EventKind::Binary(data),
                    Some(Ok(Message::Close(frame))) => {
                        break EventKind::Closed(frame.map(|f| format!("{} {}", f.code, f.reason)))
                    }
                    Some(Ok(_)) => continue,
                };
                if events.send(TransportEvent { attempt, kind }).await.is_err() {
                    return;
                }
            };
            let _ = events.send(TransportEvent { attempt, kind: last }).await;
        });

        self.connection = Some(Connection { out_tx, send_handle, recv_handle });
        self.session.set_state(TransportState::Open);
        tracing::info!("connected (attempt {})", attempt);

        let hello = ClientMessage::hello(consts::TRANSPORT_NAME, self.config.audio_params().clone());
        self.send_text(&hello);
        vec![Inbound::Connected]
    }

    fn dispatch_text(&mut self, text: &str) -> Option<Inbound> {
        self.with_stats(Stats::record_received);
        let message = match serde_json::from_str::<ServerMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                self.with_stats(Stats::record_malformed);
                tracing::error!("{}, text=> {:?}", Error::ControlMessageMalformed(e.to_string()), text);
                return None;
            }
        };
        tracing::debug!("received message: {}, session={}", message.kind(), message.session_id().unwrap_or("unknown"));

        if let ServerMessage::Hello(hello) = &message {
            match hello.session_id().filter(|id| !id.is_empty()) {
                Some(session_id) => {
                    tracing::info!("session established: {}", session_id);
                    self.session.assign_id(session_id);
                }
                None => {
                    self.with_stats(Stats::record_malformed);
                    tracing::error!("{}", Error::HandshakeMalformed("missing session_id".to_string()));
                    return None;
                }
            }
        }
        Some(Inbound::Message(message))
    }

    fn dispatch_audio(&mut self, data: &[u8]) -> Option<Inbound> {
        self.with_stats(Stats::record_received);
        match self.codec.decode(data) {
            Ok(samples) => Some(Inbound::Audio(PlaybackItem::new(samples, self.codec.sample_rate()))),
            Err(e) => {
                self.with_stats(Stats::record_malformed);
                tracing::error!("dropping audio payload of {} bytes: {}", data.len(), e);
                None
            }
        }
    }

    fn lost(&mut self, state: TransportState, reason: Option<String>) -> Vec<Inbound> {
        if let Some(connection) = self.connection.take() {
            connection.shutdown();
        }
        self.session.clear_id();
        self.session.set_state(state);
        if !self.closing {
            self.schedule_reconnect();
        }
        vec![Inbound::Disconnected(reason)]
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect.is_some() {
            tracing::debug!("reconnect already scheduled");
            return;
        }
        let delay = self.config.reconnect_delay();
        let events = self.events_tx.clone();
        let attempt = self.attempt;
        tracing::info!("reconnecting in {:?}", delay);
        self.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(TransportEvent { attempt, kind: EventKind::ReconnectDue }).await;
        }));
    }

    fn reconnect_due(&mut self) {
        self.reconnect = None;
        if self.closing {
            return;
        }
        let Some(target) = self.target.clone() else {
            return;
        };
        self.with_stats(Stats::record_reconnect);
        if let Err(e) = self.connect(&target) {
            tracing::error!("reconnect failed: {}", e);
        }
    }

    fn cancel_reconnect(&mut self) {
        if let Some(handle) = self.reconnect.take() {
            handle.abort();
        }
    }

    fn with_stats(&self, update: impl FnOnce(&mut Stats)) {
        match self.stats.lock() {
            Ok(mut stats_guard) => update(&mut stats_guard),
            Err(_) => tracing::error!("failed to update stats"),
        }
    }
}

impl Outbound for Client {
    fn send_message(&mut self, message: ClientMessage) {
        self.send_text(&message);
    }

    fn send_audio(&mut self, frame: &AudioFrame) {
        Client::send_audio(self, frame);
    }

    fn session_id(&self) -> String {
        self.session.session_id().to_string()
    }
}
