use voice_duplex_utils::audio::{decode_pcm16, encode_pcm16, SESSION_SAMPLE_RATE};

use crate::error::{Error, Result};

/// Turns captured samples into outbound binary frames and inbound binary
/// frames back into samples. The transport treats payloads as opaque; the
/// codec is the only place that knows their layout.
pub trait AudioCodec: Send {
    fn encode(&mut self, samples: &[f32]) -> Vec<u8>;

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<f32>>;

    /// Sample rate of decoded output.
    fn sample_rate(&self) -> u32;
}

/// Raw 16-bit little-endian PCM.
#[derive(Debug, Clone)]
pub struct Pcm16Codec {
    sample_rate: u32,
}

impl Default for Pcm16Codec {
    fn default() -> Self {
        Self {
            sample_rate: SESSION_SAMPLE_RATE,
        }
    }
}

impl Pcm16Codec {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl AudioCodec for Pcm16Codec {
    fn encode(&mut self, samples: &[f32]) -> Vec<u8> {
        encode_pcm16(samples)
    }

    fn decode(&mut self, payload: &[u8]) -> Result<Vec<f32>> {
        decode_pcm16(payload).map_err(|e| Error::Codec(e.to_string()))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
