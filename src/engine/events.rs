use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Lifecycle notifications fired by the engine's enter/exit hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatEvent {
    UserStartSpeaking,
    UserStopSpeaking,
    AiStartSpeaking,
    AiStopSpeaking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speaker {
    #[default]
    User,
    Ai,
}

/// Loudness sample for feedback animation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelSignal {
    pub speaker: Speaker,
    pub level: f32,
}

type Handler = Box<dyn FnMut(ChatEvent) + Send>;

/// Subscribers per event, called in registration order. A panicking
/// subscriber is logged and skipped; the rest still run.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<ChatEvent, Vec<Handler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event: ChatEvent, handler: impl FnMut(ChatEvent) + Send + 'static) {
        self.handlers.entry(event).or_default().push(Box::new(handler));
    }

    pub fn emit(&mut self, event: ChatEvent) {
        let Some(handlers) = self.handlers.get_mut(&event) else {
            return;
        };
        for (index, handler) in handlers.iter_mut().enumerate() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
                tracing::error!("subscriber {} of {:?} failed: {}", index, event, panic_message(panic.as_ref()));
            }
        }
    }

    pub fn subscribers(&self, event: ChatEvent) -> usize {
        self.handlers.get(&event).map_or(0, Vec::len)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
