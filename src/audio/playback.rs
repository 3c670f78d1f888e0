use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use voice_duplex_utils::audio::mean_abs_level;

pub type PlaybackId = u64;

/// A decoded buffer of AI speech waiting to be played.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackItem {
    samples: Vec<f32>,
    sample_rate: u32,
    level: f32,
}

impl PlaybackItem {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let level = mean_abs_level(&samples);
        Self {
            samples,
            sample_rate,
            level,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Completion ticket handed to the sink with every item it starts.
#[derive(Debug)]
pub struct PlaybackDone {
    id: PlaybackId,
    tx: mpsc::UnboundedSender<PlaybackId>,
}

impl PlaybackDone {
    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Signal natural end of playback. Safe to call from any thread.
    pub fn finish(self) {
        if self.tx.send(self.id).is_err() {
            tracing::trace!("playback {} finished after queue shut down", self.id);
        }
    }
}

/// The output device side of playback.
pub trait AudioSink: Send {
    /// Begin playing `item`. Call `done.finish()` when it ends on its own.
    fn start(&mut self, item: PlaybackItem, done: PlaybackDone);

    /// Halt the current item. A ticket finished after this is ignored.
    fn stop(&mut self);
}

/// What the turn-taking engine needs from playback.
#[cfg_attr(test, mockall::automock)]
pub trait Playback {
    fn play_next(&mut self);

    fn stop(&mut self);

    fn clear(&mut self);

    fn is_playing(&self) -> bool;

    fn pending(&self) -> usize;
}

/// Plays queued items strictly one at a time in arrival order.
///
/// Playback only advances through `finished`: the sink reports completion
/// over the channel returned by `new`, the control loop hands the id back
/// here and the next item starts. Completions for items that were stopped
/// are stale and ignored, so a stop never chains into the next item.
pub struct PlaybackQueue<S: AudioSink> {
    queue: VecDeque<PlaybackItem>,
    sink: S,
    playing: Option<PlaybackId>,
    next_id: PlaybackId,
    done_tx: mpsc::UnboundedSender<PlaybackId>,
    on_empty: Option<Box<dyn FnMut() + Send>>,
}

impl<S: AudioSink> PlaybackQueue<S> {
    pub fn new(sink: S) -> (Self, mpsc::UnboundedReceiver<PlaybackId>) {
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let queue = Self {
            queue: VecDeque::new(),
            sink,
            playing: None,
            next_id: 0,
            done_tx,
            on_empty: None,
        };
        (queue, done_rx)
    }

    /// Called whenever `play_next` finds nothing left to play.
    pub fn on_empty(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_empty = Some(Box::new(callback));
    }

    pub fn enqueue(&mut self, item: PlaybackItem) {
        tracing::debug!("audio enqueued ({:?}), {} pending", item.duration(), self.queue.len() + 1);
        self.queue.push_back(item);
    }

    /// Completion report from the sink.
    pub fn finished(&mut self, id: PlaybackId) {
        if self.playing != Some(id) {
            tracing::debug!("ignoring completion of stale playback {}", id);
            return;
        }
        self.playing = None;
        self.play_next();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: AudioSink> Playback for PlaybackQueue<S> {
    fn play_next(&mut self) {
        if let Some(id) = self.playing {
            tracing::warn!("play_next while playback {} is still running", id);
            return;
        }
        let Some(item) = self.queue.pop_front() else {
            tracing::debug!("audio queue is empty");
            if let Some(callback) = self.on_empty.as_mut() {
                callback();
            }
            return;
        };

        let id = self.next_id;
        self.next_id += 1;
        self.playing = Some(id);
        let done = PlaybackDone {
            id,
            tx: self.done_tx.clone(),
        };
        self.sink.start(item, done);
    }

    fn stop(&mut self) {
        if let Some(id) = self.playing.take() {
            tracing::debug!("stopping playback {}", id);
            self.sink.stop();
        }
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    fn pending(&self) -> usize {
        self.queue.len()
    }
}
