//! Turn-taking state machine.
//!
//! The engine owns [`ConversationState`] and decides, frame by frame, who
//! holds the floor. It never performs I/O itself: outbound messages go
//! through [`Outbound`] and playback control through [`Playback`], both
//! passed in per call so the control loop keeps sole ownership of the
//! transport and the playback queue.

mod config;
mod events;
mod state;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use voice_duplex_types::ClientMessage;

use crate::audio::{AudioFrame, Playback};

pub use config::{ConfigError, EngineConfig};
pub use events::{ChatEvent, EventBus, LevelSignal, Speaker};
pub use state::{transition, ConversationState, EngineInput, SilenceAction, Thresholds, Transition};

/// Where the engine's outbound traffic goes.
#[cfg_attr(test, mockall::automock)]
pub trait Outbound {
    fn send_message(&mut self, message: ClientMessage);

    fn send_audio(&mut self, frame: &AudioFrame);

    /// Current session id, empty before the handshake reply.
    fn session_id(&self) -> String;
}

/// Borrowed collaborators for one engine step.
pub struct Effects<'a> {
    outbound: &'a mut dyn Outbound,
    playback: &'a mut dyn Playback,
}

impl<'a> Effects<'a> {
    pub fn new(outbound: &'a mut dyn Outbound, playback: &'a mut dyn Playback) -> Self {
        Self { outbound, playback }
    }
}

/// Outbound side of a session that no longer exists.
struct Detached;

impl Outbound for Detached {
    fn send_message(&mut self, message: ClientMessage) {
        tracing::debug!("no session, not sending {:?}", message);
    }

    fn send_audio(&mut self, _frame: &AudioFrame) {}

    fn session_id(&self) -> String {
        String::new()
    }
}

/// Delivered on the engine's timer channel when the silence timer runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceElapsed(u64);

struct SilenceTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl Drop for SilenceTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub struct TurnTakingEngine {
    config: EngineConfig,
    state: ConversationState,
    silence: Option<SilenceTimer>,
    next_timer: u64,
    timer_tx: mpsc::UnboundedSender<SilenceElapsed>,
    events: EventBus,
    state_tx: watch::Sender<ConversationState>,
    level_tx: watch::Sender<LevelSignal>,
}

impl TurnTakingEngine {
    /// Returns the engine and the channel its silence timer fires on. Feed
    /// every value from that channel back through `handle_silence_elapsed`.
    pub fn new(config: EngineConfig) -> (Self, mpsc::UnboundedReceiver<SilenceElapsed>) {
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConversationState::Idle);
        let (level_tx, _) = watch::channel(LevelSignal::default());
        let engine = Self {
            config,
            state: ConversationState::Idle,
            silence: None,
            next_timer: 0,
            timer_tx,
            events: EventBus::new(),
            state_tx,
            level_tx,
        };
        (engine, timer_rx)
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn watch_state(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    pub fn watch_level(&self) -> watch::Receiver<LevelSignal> {
        self.level_tx.subscribe()
    }

    pub fn on(&mut self, event: ChatEvent, handler: impl FnMut(ChatEvent) + Send + 'static) {
        self.events.on(event, handler);
    }

    pub fn silence_armed(&self) -> bool {
        self.silence.is_some()
    }

    pub fn handle_frame(&mut self, frame: AudioFrame, fx: &mut Effects<'_>) {
        let level = frame.level();
        let step = transition(self.state, EngineInput::Level(level), &self.config.thresholds());

        if step.forward {
            fx.outbound.send_audio(&frame);
        }
        match step.silence {
            SilenceAction::Arm => self.arm_silence(),
            SilenceAction::Cancel => {
                self.cancel_silence();
                self.publish_level(Speaker::User, level);
            }
            SilenceAction::Keep => {}
        }
        if step.abort {
            let session_id = fx.outbound.session_id();
            tracing::info!("user interrupted the AI (level {:.3})", level);
            fx.outbound.send_message(ClientMessage::abort(&session_id));
        }
        self.set_state(step.next, fx);
    }

    pub fn handle_silence_elapsed(&mut self, fired: SilenceElapsed, fx: &mut Effects<'_>) {
        if self.silence.as_ref().map(|timer| timer.id) != Some(fired.0) {
            tracing::debug!("ignoring stale silence timer {}", fired.0);
            return;
        }
        self.silence = None;
        tracing::info!("user silent for {:?}, handing over the floor", self.config.silence());

        let step = transition(self.state, EngineInput::SilenceElapsed, &self.config.thresholds());
        self.set_state(step.next, fx);
    }

    /// Level of AI speech about to be played, for feedback animation.
    pub fn publish_ai_level(&self, level: f32) {
        if self.state != ConversationState::UserSpeaking {
            self.publish_level(Speaker::Ai, level);
        }
    }

    /// Ends any turn in progress once the transport is gone. Exit hooks run
    /// as usual but nothing is sent to the peer, so the next session starts
    /// from `Idle` with a fresh `listen:start`.
    pub fn handle_session_lost(&mut self, playback: &mut dyn Playback) {
        let step = transition(self.state, EngineInput::SessionLost, &self.config.thresholds());
        if step.silence == SilenceAction::Cancel {
            self.cancel_silence();
        }
        let mut detached = Detached;
        self.set_state(step.next, &mut Effects::new(&mut detached, playback));
    }

    fn publish_level(&self, speaker: Speaker, level: f32) {
        self.level_tx.send_replace(LevelSignal { speaker, level });
    }

    fn arm_silence(&mut self) {
        if self.silence.is_some() {
            return;
        }
        let id = self.next_timer;
        self.next_timer += 1;

        let tx = self.timer_tx.clone();
        let delay = self.config.silence();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SilenceElapsed(id));
        });
        tracing::debug!("silence timer {} armed for {:?}", id, delay);
        self.silence = Some(SilenceTimer { id, handle });
    }

    fn cancel_silence(&mut self) {
        if let Some(timer) = self.silence.take() {
            tracing::debug!("silence timer {} cancelled", timer.id);
        }
    }

    fn set_state(&mut self, next: ConversationState, fx: &mut Effects<'_>) {
        let old = self.state;
        if old == next {
            return;
        }
        self.exit(old, fx);
        self.state = next;
        self.state_tx.send_replace(next);
        tracing::info!("state changed from {:?} to {:?}", old, next);
        self.enter(next, fx);
    }

    fn exit(&mut self, state: ConversationState, fx: &mut Effects<'_>) {
        match state {
            ConversationState::Idle => {}
            ConversationState::UserSpeaking => {
                self.cancel_silence();
                fx.outbound.send_message(ClientMessage::listen_stop());
                self.events.emit(ChatEvent::UserStopSpeaking);
            }
            ConversationState::AiSpeaking => {
                fx.playback.stop();
                fx.playback.clear();
                self.events.emit(ChatEvent::AiStopSpeaking);
            }
        }
    }

    fn enter(&mut self, state: ConversationState, fx: &mut Effects<'_>) {
        match state {
            ConversationState::Idle => {}
            ConversationState::UserSpeaking => {
                // a reply still playing from Idle is stale once the user talks
                if fx.playback.is_playing() || fx.playback.pending() > 0 {
                    fx.playback.stop();
                    fx.playback.clear();
                }
                fx.outbound.send_message(ClientMessage::listen_start());
                self.events.emit(ChatEvent::UserStartSpeaking);
            }
            ConversationState::AiSpeaking => {
                self.events.emit(ChatEvent::AiStartSpeaking);
                if !fx.playback.is_playing() && fx.playback.pending() > 0 {
                    fx.playback.play_next();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MockPlayback;
    use mockall::Sequence;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;
    use voice_duplex_types::ListenState;

    #[derive(Clone, Default)]
    struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeTransport {
        journal: Journal,
        session_id: String,
    }

    impl Outbound for FakeTransport {
        fn send_message(&mut self, message: ClientMessage) {
            self.journal.push(describe(&message));
        }

        fn send_audio(&mut self, _frame: &AudioFrame) {
            self.journal.push("audio");
        }

        fn session_id(&self) -> String {
            self.session_id.clone()
        }
    }

    struct FakePlayback {
        journal: Journal,
        playing: bool,
        pending: usize,
    }

    impl Playback for FakePlayback {
        fn play_next(&mut self) {
            self.journal.push("play");
            if self.pending > 0 {
                self.pending -= 1;
                self.playing = true;
            }
        }

        fn stop(&mut self) {
            self.journal.push("stop");
            self.playing = false;
        }

        fn clear(&mut self) {
            self.journal.push("clear");
            self.pending = 0;
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn pending(&self) -> usize {
            self.pending
        }
    }

    fn describe(message: &ClientMessage) -> String {
        match message {
            ClientMessage::Listen(listen) => match listen.state() {
                ListenState::Start => "listen:start".to_string(),
                ListenState::Stop => "listen:stop".to_string(),
                ListenState::Detect => format!("listen:detect:{}", listen.text().unwrap_or_default()),
            },
            ClientMessage::Abort(abort) => format!("abort:{}", abort.session_id()),
            ClientMessage::Hello(_) => "hello".to_string(),
        }
    }

    fn frame(level: f32) -> AudioFrame {
        AudioFrame::new(vec![level; 16])
    }

    fn config() -> EngineConfig {
        EngineConfig::new()
            .with_user_speaking_threshold(0.1)
            .with_user_interrupt_threshold(0.5)
            .with_silence(Duration::from_millis(800))
    }

    fn setup(journal: &Journal) -> (TurnTakingEngine, mpsc::UnboundedReceiver<SilenceElapsed>, FakeTransport, FakePlayback) {
        let (mut engine, timers) = TurnTakingEngine::new(config());
        for event in [
            ChatEvent::UserStartSpeaking,
            ChatEvent::UserStopSpeaking,
            ChatEvent::AiStartSpeaking,
            ChatEvent::AiStopSpeaking,
        ] {
            let journal = journal.clone();
            engine.on(event, move |e| journal.push(format!("event:{:?}", e)));
        }
        let transport = FakeTransport {
            journal: journal.clone(),
            session_id: "abc123".to_string(),
        };
        let playback = FakePlayback {
            journal: journal.clone(),
            playing: false,
            pending: 0,
        };
        (engine, timers, transport, playback)
    }

    #[tokio::test]
    async fn test_quiet_audio_keeps_idle() {
        let journal = Journal::default();
        let (mut engine, _timers, mut transport, mut playback) = setup(&journal);
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.05), &mut fx);
        engine.handle_frame(frame(0.0), &mut fx);
        engine.handle_frame(AudioFrame::new(vec![]), &mut fx);

        assert_eq!(engine.state(), ConversationState::Idle);
        assert!(journal.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_hands_floor_to_ai() {
        let journal = Journal::default();
        let (mut engine, mut timers, mut transport, mut playback) = setup(&journal);
        let mut fx = Effects::new(&mut transport, &mut playback);
        let state = engine.watch_state();

        engine.handle_frame(frame(0.3), &mut fx);
        assert_eq!(engine.state(), ConversationState::UserSpeaking);

        let quiet_at = Instant::now();
        engine.handle_frame(frame(0.02), &mut fx);
        assert!(engine.silence_armed());

        let fired = timers.recv().await.unwrap();
        assert!(quiet_at.elapsed() >= Duration::from_millis(800));
        engine.handle_silence_elapsed(fired, &mut fx);

        assert_eq!(engine.state(), ConversationState::AiSpeaking);
        assert_eq!(*state.borrow(), ConversationState::AiSpeaking);
        assert!(!engine.silence_armed());
        assert_eq!(
            journal.entries(),
            vec![
                "listen:start",
                "event:UserStartSpeaking",
                "audio",
                "listen:stop",
                "event:UserStopSpeaking",
                "event:AiStartSpeaking",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_quiet_frames_arm_one_timer() {
        let journal = Journal::default();
        let (mut engine, mut timers, mut transport, mut playback) = setup(&journal);
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.3), &mut fx);
        engine.handle_frame(frame(0.01), &mut fx);
        engine.handle_frame(frame(0.01), &mut fx);

        assert!(timers.recv().await.is_some());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timers.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loud_frame_cancels_silence_timer() {
        let journal = Journal::default();
        let (mut engine, mut timers, mut transport, mut playback) = setup(&journal);
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.3), &mut fx);
        engine.handle_frame(frame(0.01), &mut fx);
        tokio::time::sleep(Duration::from_millis(400)).await;
        engine.handle_frame(frame(0.3), &mut fx);
        assert!(!engine.silence_armed());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timers.try_recv().is_err());
        assert_eq!(engine.state(), ConversationState::UserSpeaking);
        assert!(!journal.entries().contains(&"listen:stop".to_string()));
        assert_eq!(journal.entries().iter().filter(|e| *e == "audio").count(), 2);
    }

    #[tokio::test]
    async fn test_stale_timer_is_ignored() {
        let journal = Journal::default();
        let (mut engine, _timers, mut transport, mut playback) = setup(&journal);
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.3), &mut fx);
        engine.handle_frame(frame(0.01), &mut fx);
        engine.handle_frame(frame(0.3), &mut fx);
        // fired just before it was cancelled
        engine.handle_silence_elapsed(SilenceElapsed(0), &mut fx);

        assert_eq!(engine.state(), ConversationState::UserSpeaking);
    }

    #[tokio::test]
    async fn test_interrupt_aborts_then_reclaims_floor() {
        let journal = Journal::default();
        let (mut engine, _timers) = TurnTakingEngine::new(config());
        for event in [ChatEvent::AiStopSpeaking, ChatEvent::UserStartSpeaking] {
            let journal = journal.clone();
            engine.on(event, move |e| journal.push(format!("event:{:?}", e)));
        }
        engine.state = ConversationState::AiSpeaking;

        let mut seq = Sequence::new();
        let mut outbound = MockOutbound::new();
        let mut playback = MockPlayback::new();
        outbound
            .expect_session_id()
            .times(1)
            .in_sequence(&mut seq)
            .return_const("abc123".to_string());
        outbound
            .expect_send_message()
            .withf(|m| *m == ClientMessage::abort("abc123"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        playback.expect_stop().times(1).in_sequence(&mut seq).return_const(());
        playback.expect_clear().times(1).in_sequence(&mut seq).return_const(());
        playback.expect_is_playing().return_const(false);
        playback.expect_pending().return_const(0usize);
        outbound
            .expect_send_message()
            .withf(|m| *m == ClientMessage::listen_start())
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        outbound.expect_send_audio().never();

        engine.handle_frame(frame(0.8), &mut Effects::new(&mut outbound, &mut playback));

        assert_eq!(engine.state(), ConversationState::UserSpeaking);
        assert_eq!(journal.entries(), vec!["event:AiStopSpeaking", "event:UserStartSpeaking"]);
    }

    #[tokio::test]
    async fn test_speech_below_interrupt_level_does_not_interrupt() {
        let journal = Journal::default();
        let (mut engine, _timers, mut transport, mut playback) = setup(&journal);
        engine.state = ConversationState::AiSpeaking;
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.3), &mut fx);

        assert_eq!(engine.state(), ConversationState::AiSpeaking);
        assert!(journal.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entering_ai_speaking_starts_queued_playback() {
        let journal = Journal::default();
        let (mut engine, mut timers, mut transport, mut playback) = setup(&journal);

        engine.handle_frame(frame(0.3), &mut Effects::new(&mut transport, &mut playback));
        engine.handle_frame(frame(0.01), &mut Effects::new(&mut transport, &mut playback));
        playback.pending = 2;
        let fired = timers.recv().await.unwrap();
        engine.handle_silence_elapsed(fired, &mut Effects::new(&mut transport, &mut playback));

        assert_eq!(journal.entries().last().map(String::as_str), Some("play"));
    }

    #[tokio::test]
    async fn test_taking_the_floor_silences_idle_playback() {
        let journal = Journal::default();
        let (mut engine, _timers, mut transport, mut playback) = setup(&journal);
        playback.playing = true;
        playback.pending = 1;

        engine.handle_frame(frame(0.3), &mut Effects::new(&mut transport, &mut playback));

        assert_eq!(engine.state(), ConversationState::UserSpeaking);
        assert!(!playback.playing);
        assert_eq!(playback.pending, 0);
        assert_eq!(journal.entries(), vec!["stop", "clear", "listen:start", "event:UserStartSpeaking"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_lost_ends_user_turn_quietly() {
        let journal = Journal::default();
        let (mut engine, mut timers, mut transport, mut playback) = setup(&journal);
        let state = engine.watch_state();
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.3), &mut fx);
        engine.handle_frame(frame(0.01), &mut fx);
        engine.handle_session_lost(&mut playback);

        assert_eq!(engine.state(), ConversationState::Idle);
        assert_eq!(*state.borrow(), ConversationState::Idle);
        assert!(!engine.silence_armed());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(timers.try_recv().is_err());
        assert_eq!(
            journal.entries(),
            vec!["listen:start", "event:UserStartSpeaking", "audio", "event:UserStopSpeaking"]
        );

        // the next session opens a fresh listening turn
        engine.handle_frame(frame(0.3), &mut Effects::new(&mut transport, &mut playback));
        assert_eq!(journal.entries().last().map(String::as_str), Some("event:UserStartSpeaking"));
        assert_eq!(journal.entries().iter().filter(|e| *e == "listen:start").count(), 2);
    }

    #[tokio::test]
    async fn test_session_lost_stops_ai_turn() {
        let journal = Journal::default();
        let (mut engine, _timers, _transport, mut playback) = setup(&journal);
        engine.state = ConversationState::AiSpeaking;
        playback.playing = true;
        playback.pending = 1;

        engine.handle_session_lost(&mut playback);

        assert_eq!(engine.state(), ConversationState::Idle);
        assert_eq!(journal.entries(), vec!["stop", "clear", "event:AiStopSpeaking"]);

        engine.handle_session_lost(&mut playback);
        assert_eq!(journal.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_level_signal_follows_speaker() {
        let journal = Journal::default();
        let (mut engine, _timers, mut transport, mut playback) = setup(&journal);
        let level = engine.watch_level();
        let mut fx = Effects::new(&mut transport, &mut playback);

        engine.handle_frame(frame(0.3), &mut fx);
        engine.handle_frame(frame(0.4), &mut fx);
        assert_eq!(level.borrow().speaker, Speaker::User);
        assert!((level.borrow().level - 0.4).abs() < 1e-4);

        engine.publish_ai_level(0.2);
        assert_eq!(level.borrow().speaker, Speaker::User);

        engine.state = ConversationState::AiSpeaking;
        engine.publish_ai_level(0.2);
        assert_eq!(*level.borrow(), LevelSignal { speaker: Speaker::Ai, level: 0.2 });
    }
}
