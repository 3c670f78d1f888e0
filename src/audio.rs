mod codec;
#[cfg(feature = "device")]
pub mod device;
mod level;
mod playback;

pub use codec::{AudioCodec, Pcm16Codec};
pub use level::{AudioFrame, AudioLevelStream};
pub use playback::{AudioSink, Playback, PlaybackDone, PlaybackId, PlaybackItem, PlaybackQueue};

#[cfg(test)]
pub use playback::MockPlayback;
