use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use voice_duplex_utils::audio::mean_abs_level;

/// A fixed-length block of captured samples and its loudness.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
    level: f32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        let level = mean_abs_level(&samples);
        Self { samples, level }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Mean absolute sample magnitude, 0 for an empty frame.
    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Cuts the capture callback's samples into fixed-size frames and hands
/// each one to the control loop.
///
/// Lives inside the capture callback: `push` never blocks. Only the frame
/// being filled is buffered here; a finished frame goes straight into the
/// bounded channel and is dropped with a warning if the loop is behind.
pub struct AudioLevelStream {
    frame_len: usize,
    current: Vec<f32>,
    tx: mpsc::Sender<AudioFrame>,
    dropped: u64,
}

impl AudioLevelStream {
    pub fn new(frame_len: usize, tx: mpsc::Sender<AudioFrame>) -> Self {
        let frame_len = frame_len.max(1);
        Self {
            frame_len,
            current: Vec::with_capacity(frame_len),
            tx,
            dropped: 0,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Frames discarded because the consumer was not keeping up.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn push(&mut self, mut data: &[f32]) {
        while !data.is_empty() {
            let room = self.frame_len - self.current.len();
            let take = room.min(data.len());
            self.current.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.current.len() == self.frame_len {
                let samples = std::mem::replace(&mut self.current, Vec::with_capacity(self.frame_len));
                self.emit(AudioFrame::new(samples));
            }
        }
    }

    fn emit(&mut self, frame: AudioFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(frame)) => {
                self.dropped += 1;
                tracing::warn!("control loop busy, dropping frame (level {:.3})", frame.level());
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("frame consumer gone");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_has_zero_level() {
        let frame = AudioFrame::new(vec![]);
        assert_eq!(frame.level(), 0.0);
        assert!(frame.is_empty());
    }

    #[test]
    fn test_frames_span_callbacks() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut stream = AudioLevelStream::new(4, tx);

        stream.push(&[0.5, -0.5, 0.5]);
        assert!(rx.try_recv().is_err());

        stream.push(&[-0.5, 0.1, 0.1]);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.samples(), &[0.5, -0.5, 0.5, -0.5]);
        assert!((frame.level() - 0.5).abs() < 1e-6);
        assert!(rx.try_recv().is_err());

        stream.push(&[0.1, 0.1]);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_each_frame_is_delivered_once() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut stream = AudioLevelStream::new(2, tx);
        stream.push(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame.into_samples());
        }
        assert_eq!(frames, vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]]);
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut stream = AudioLevelStream::new(2, tx);
        stream.push(&[0.1; 6]);

        assert_eq!(stream.dropped(), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
