/// Audio container/codec name declared in the handshake. The payloads
/// themselves are opaque to the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "opus")]
    Opus,
    #[serde(rename = "pcm16")]
    Pcm16,
    #[serde(untagged)]
    Custom(String),
}

/// `audio_params` block of a `hello` message.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioParams {
    format: AudioFormat,
    sample_rate: u32,
    channels: u16,
    /// Milliseconds of audio carried by one frame.
    frame_duration: u32,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            format: AudioFormat::Opus,
            sample_rate: 24000,
            channels: 1,
            frame_duration: 60,
        }
    }
}

impl AudioParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_frame_duration(mut self, frame_duration: u32) -> Self {
        self.frame_duration = frame_duration;
        self
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_duration(&self) -> u32 {
        self.frame_duration
    }

    /// Number of samples (per channel) in one frame.
    pub fn frame_len(&self) -> usize {
        (self.sample_rate as usize * self.frame_duration as usize) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len_follows_rate_and_duration() {
        assert_eq!(AudioParams::new().frame_len(), 1440);
        let params = AudioParams::new().with_sample_rate(16000).with_frame_duration(20);
        assert_eq!(params.frame_len(), 320);
    }
}
