use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapProd;
use rubato::{FastFixedIn, Resampler};
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;
use voice_duplex::animation::VoiceAnimation;
use voice_duplex::audio::device::DeviceFactory;
use voice_duplex::audio::{AudioSink, Pcm16Codec, PlaybackDone, PlaybackItem};
use voice_duplex::types::{AudioFormat, AudioParams};
use voice_duplex::utils::cpal;
use voice_duplex::utils::cpal::traits::{DeviceTrait, StreamTrait};
use voice_duplex::utils::cpal::{FrameCount, StreamConfig};
use voice_duplex::utils::audio::{create_resampler, downmix, shared_buffer, split_for_chunks, SESSION_SAMPLE_RATE};
use voice_duplex::utils::device::{get_available_inputs, get_available_outputs};
use voice_duplex::{Config, Conversation, ConversationEvent, EngineConfig};

const INPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_LATENCY_MS: usize = 1000;

enum SinkCommand {
    Play(PlaybackItem, PlaybackDone),
    Stop,
}

/// Feeds decoded AI speech into the output ring buffer and reports each
/// item finished once its duration has elapsed.
struct SpeakerSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
}

impl AudioSink for SpeakerSink {
    fn start(&mut self, item: PlaybackItem, done: PlaybackDone) {
        if self.tx.send(SinkCommand::Play(item, done)).is_err() {
            tracing::warn!("speaker task gone");
        }
    }

    fn stop(&mut self) {
        let _ = self.tx.send(SinkCommand::Stop);
    }
}

async fn run_speaker(
    mut rx: mpsc::UnboundedReceiver<SinkCommand>,
    mut producer: HeapProd<f32>,
    mut resampler: FastFixedIn<f32>,
    flush: Arc<AtomicBool>,
) {
    let mut current: Option<tokio::task::JoinHandle<()>> = None;
    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Play(item, done) => {
                let duration = item.duration();
                let chunk_size = resampler.input_frames_next();
                for samples in split_for_chunks(item.samples(), chunk_size) {
                    if let Ok(resampled) = resampler.process(&[samples.as_slice()], None) {
                        if let Some(resampled) = resampled.first() {
                            let pushed = producer.push_slice(resampled);
                            if pushed < resampled.len() {
                                tracing::warn!("output buffer full, dropped {} samples", resampled.len() - pushed);
                            }
                        }
                    }
                }
                current = Some(tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    done.finish();
                }));
            }
            SinkCommand::Stop => {
                if let Some(handle) = current.take() {
                    handle.abort();
                }
                flush.store(true, Ordering::Release);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv_override().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    println!("inputs:\n{}", get_available_inputs()?);
    println!("outputs:\n{}", get_available_outputs()?);

    let mut devices = DeviceFactory::new();
    let device = devices.acquire()?;

    // capture: device rate, any channel count -> mono at the session rate
    let input = device.input();
    let input_default = input.default_input_config()?;
    let input_config = StreamConfig {
        channels: input_default.channels(),
        sample_rate: input_default.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    tracing::info!("input: device={:?}, config={:?}", input.name()?, &input_config);
    let input_channels = input_config.channels as usize;
    let (mic_tx, mut mic_rx) = mpsc::channel::<Vec<f32>>(1024);
    let input_stream = input.build_input_stream(
        &input_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if let Err(e) = mic_tx.try_send(downmix(data, input_channels)) {
                tracing::warn!("dropping captured audio: {}", e);
            }
        },
        |err| tracing::error!("an error occurred on input stream: {}", err),
        None,
    )?;

    // playback: session rate -> device rate, duplicated across channels
    let output = device.output();
    let output_default = output.default_output_config()?;
    let output_config = StreamConfig {
        channels: output_default.channels(),
        sample_rate: output_default.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    tracing::info!("output: device={:?}, config={:?}", output.name()?, &output_config);
    let output_channels = output_config.channels as usize;
    let output_rate = output_config.sample_rate.0;
    let (producer, mut consumer) = shared_buffer(output_rate as usize * OUTPUT_LATENCY_MS / 1000).split();
    let flush = Arc::new(AtomicBool::new(false));
    let output_flush = flush.clone();
    let output_stream = output.build_output_stream(
        &output_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if output_flush.swap(false, Ordering::AcqRel) {
                consumer.clear();
            }
            for frame in data.chunks_mut(output_channels) {
                let sample = consumer.try_pop().unwrap_or(0.0);
                frame.iter_mut().for_each(|s| *s = sample);
            }
        },
        |err| tracing::error!("an error occurred on output stream: {}", err),
        None,
    )?;

    let (sink_tx, sink_rx) = mpsc::unbounded_channel();
    let out_resampler = create_resampler(SESSION_SAMPLE_RATE as f64, output_rate as f64, 100)?;
    tokio::spawn(run_speaker(sink_rx, producer, out_resampler, flush));

    let config = Config::builder()
        .with_audio_params(AudioParams::new().with_format(AudioFormat::Pcm16))
        .build();
    let engine_config = EngineConfig::from_env()?;
    tracing::info!("connecting to {}", config.url());
    let (conversation, handle, mut capture) =
        Conversation::new(config, engine_config, Pcm16Codec::default(), SpeakerSink { tx: sink_tx });

    let input_rate = input_config.sample_rate.0;
    let mut in_resampler = create_resampler(input_rate as f64, SESSION_SAMPLE_RATE as f64, INPUT_CHUNK_SIZE)?;
    tokio::spawn(async move {
        let mut pending: VecDeque<f32> = VecDeque::with_capacity(INPUT_CHUNK_SIZE * 2);
        while let Some(samples) = mic_rx.recv().await {
            pending.extend(samples);
            while pending.len() >= INPUT_CHUNK_SIZE {
                let chunk: Vec<f32> = pending.drain(..INPUT_CHUNK_SIZE).collect();
                match in_resampler.process(&[chunk.as_slice()], None) {
                    Ok(resampled) => {
                        if let Some(resampled) = resampled.first() {
                            capture.push(resampled);
                        }
                    }
                    Err(e) => tracing::error!("failed to resample input: {}", e),
                }
            }
        }
    });

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ConversationEvent::Transcript(text) => println!("Human: {}", text.trim()),
                ConversationEvent::SentenceStarted(Some(text)) => println!("AI: {}", text),
                ConversationEvent::Reply { emotion: Some(emotion), .. } => println!("AI mood: {}", emotion),
                other => tracing::debug!("conversation event: {:?}", other),
            }
        }
    });

    let mut level = handle.watch_level();
    tokio::spawn(async move {
        let mut animation = VoiceAnimation::new();
        while level.changed().await.is_ok() {
            let signal = *level.borrow_and_update();
            animation.update(signal);
            tracing::trace!("wave={:.1} avatar={:.3}", animation.wave_height(), animation.avatar_scale());
        }
    });

    input_stream.play()?;
    output_stream.play()?;
    let conversation = tokio::spawn(conversation.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown().await?;
    conversation.await?;
    Ok(())
}
