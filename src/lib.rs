pub mod animation;
pub mod audio;
pub mod client;
pub mod conversation;
pub mod engine;
mod error;

pub use voice_duplex_types as types;
pub use voice_duplex_utils as utils;

pub use client::{Client, Config, ConfigBuilder, Inbound, Session, Stats, TransportEvent, TransportRx, TransportState};
pub use conversation::{Command, Conversation, ConversationEvent, ConversationHandle};
pub use engine::{ChatEvent, ConversationState, EngineConfig, TurnTakingEngine};
pub use error::{Error, Result};
