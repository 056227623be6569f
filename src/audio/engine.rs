// CpalBackend - Real-time output on the default audio device
//
// The cpal callback owns the step clock and the voice mixer. The engine
// talks to it only through ring buffers:
// - commands in (start/stop, tempo, division, play requests, sample sets)
// - ticks out, computed slightly ahead of the playhead so samples can be
//   scheduled on the exact boundary frame
// - signals out (ready, samples loaded, load failures, stream errors)
//
// Supported device formats: F32, I16 and U16. Everything is mixed in f32 and
// converted when written to the output buffer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::backend::{AudioBackend, BackendSignal, Tick};
use crate::audio::clock::StepClock;
use crate::audio::mixer::Mixer;
use crate::audio::parameters::{AtomicF64, FrameCounter};
use crate::sampler::{PlaybackConfig, load_sample};
use crate::sequencer::metronome::{ClickType, MetronomeSound};

/// How far ahead of the playhead ticks are handed out
const LOOKAHEAD: Duration = Duration::from_millis(50);

const COMMAND_CAPACITY: usize = 256;
const TICK_CAPACITY: usize = 256;
const SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported sample format: {0}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// Messages from the engine side to the audio callback
pub enum AudioCommand {
    StartLoop { delay_frames: u64 },
    StopLoop,
    SetBpm(u32),
    SetDivision(usize),
    PlaySample {
        track: usize,
        gain: f32,
        at: Option<f64>,
    },
    PlayClick {
        click: ClickType,
        at: f64,
    },
    InstallSamples {
        generation: u64,
        samples: Vec<Option<Arc<[f32]>>>,
    },
}

pub type CommandProducer = HeapProd<AudioCommand>;
pub type CommandConsumer = HeapCons<AudioCommand>;
pub type TickProducer = HeapProd<Tick>;
pub type TickConsumer = HeapCons<Tick>;
pub type SignalProducer = HeapProd<BackendSignal>;
pub type SignalConsumer = HeapCons<BackendSignal>;

/// Receiving ends handed to whoever drives the engine
pub struct BackendEvents {
    pub ticks: TickConsumer,
    pub signals: SignalConsumer,
}

/// Everything the audio callback mutates
pub struct CallbackState {
    clock: StepClock,
    mixer: Mixer,
    samples: Vec<Option<Arc<[f32]>>>,
    samples_generation: u64,
    accent_click: Arc<[f32]>,
    regular_click: Arc<[f32]>,
    lookahead_frames: u64,
}

impl CallbackState {
    pub fn new(sample_rate: u32, bpm: u32, division: usize) -> Self {
        let sound = MetronomeSound::new(sample_rate as f32);
        Self {
            clock: StepClock::new(sample_rate as f64, bpm, division),
            mixer: Mixer::new(),
            samples: Vec::new(),
            samples_generation: 0,
            accent_click: Arc::from(sound.get_click(ClickType::Accent)),
            regular_click: Arc::from(sound.get_click(ClickType::Regular)),
            lookahead_frames: (LOOKAHEAD.as_secs_f64() * sample_rate as f64) as u64,
        }
    }

    fn frame_at(&self, time: f64, now: u64) -> u64 {
        ((time * self.clock.sample_rate()).round() as u64).max(now)
    }

    pub fn apply(&mut self, command: AudioCommand, now: u64) {
        match command {
            AudioCommand::StartLoop { delay_frames } => self.clock.start(now, delay_frames),
            AudioCommand::StopLoop => self.clock.stop(),
            AudioCommand::SetBpm(bpm) => self.clock.set_bpm(bpm),
            AudioCommand::SetDivision(division) => self.clock.set_division(division),
            AudioCommand::PlaySample { track, gain, at } => {
                if let Some(Some(data)) = self.samples.get(track) {
                    let start = at.map_or(now, |t| self.frame_at(t, now));
                    self.mixer.trigger(Arc::clone(data), gain, start);
                }
            }
            AudioCommand::PlayClick { click, at } => {
                let data = match click {
                    ClickType::Accent => Arc::clone(&self.accent_click),
                    ClickType::Regular => Arc::clone(&self.regular_click),
                };
                let start = self.frame_at(at, now);
                self.mixer.trigger(data, 1.0, start);
            }
            AudioCommand::InstallSamples {
                generation,
                samples,
            } => {
                // Loader threads can finish out of order
                if generation >= self.samples_generation {
                    self.samples_generation = generation;
                    self.samples = samples;
                }
            }
        }
    }

    /// Render `frames` mono frames starting at `now`, reporting ticks ahead
    pub fn render(
        &mut self,
        now: u64,
        frames: usize,
        on_tick: impl FnMut(Tick),
        mut write: impl FnMut(usize, f32),
    ) {
        self.clock
            .poll(now + frames as u64 + self.lookahead_frames, on_tick);

        for i in 0..frames {
            let sample = self.mixer.next_sample(now + i as u64);
            write(i, sample);
        }
    }

    pub fn progress(&self, now: u64) -> f64 {
        self.clock.progress(now)
    }

    /// Loop progress at the tick horizon of a `frames` long render at `now`
    ///
    /// Taps are quantized against this value, so it has to run on the same
    /// lookahead clock as the ticks already handed out.
    pub fn published_progress(&self, now: u64, frames: usize) -> f64 {
        self.clock
            .progress(now + frames as u64 + self.lookahead_frames)
    }

    pub fn samples_generation(&self) -> u64 {
        self.samples_generation
    }
}

pub struct CpalBackend {
    _device: Device,
    _stream: Stream,
    sample_rate: u32,
    commands: Arc<Mutex<CommandProducer>>,
    signals: Arc<Mutex<SignalProducer>>,
    progress: AtomicF64,
    frames: FrameCounter,
}

impl CpalBackend {
    /// Open the default output device and start streaming
    ///
    /// The returned backend is ready once `BackendSignal::Ready` arrives.
    pub fn start(bpm: u32, division: usize) -> Result<(Self, BackendEvents), AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        log::info!(
            "Audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;

        let sample_format = supported_config.sample_format();
        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let (command_tx, command_rx) = HeapRb::<AudioCommand>::new(COMMAND_CAPACITY).split();
        let (tick_tx, tick_rx) = HeapRb::<Tick>::new(TICK_CAPACITY).split();
        let (signal_tx, signal_rx) = HeapRb::<BackendSignal>::new(SIGNAL_CAPACITY).split();
        let signals = Arc::new(Mutex::new(signal_tx));

        let state = CallbackState::new(sample_rate, bpm, division);
        let progress = AtomicF64::default();
        let frames = FrameCounter::default();

        let parts = StreamParts {
            channels,
            state,
            command_rx,
            tick_tx,
            signals: Arc::clone(&signals),
            progress: progress.clone(),
            frames: frames.clone(),
        };

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &config, parts),
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &config, parts),
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &config, parts),
            other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
        }?;

        stream
            .play()
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        log::info!("Audio backend started: {} Hz, {} channels", sample_rate, channels);
        push_signal(&signals, BackendSignal::Ready);

        let backend = Self {
            _device: device,
            _stream: stream,
            sample_rate,
            commands: Arc::new(Mutex::new(command_tx)),
            signals,
            progress,
            frames,
        };

        Ok((
            backend,
            BackendEvents {
                ticks: tick_rx,
                signals: signal_rx,
            },
        ))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds of audio rendered since the stream started
    pub fn current_time(&self) -> f64 {
        self.frames.get() as f64 / self.sample_rate as f64
    }

    fn send(&self, command: AudioCommand) {
        if let Ok(mut tx) = self.commands.lock() {
            if tx.try_push(command).is_err() {
                log::warn!("Audio command queue full, command dropped");
            }
        }
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        parts: StreamParts,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let StreamParts {
            channels,
            mut state,
            mut command_rx,
            mut tick_tx,
            signals,
            progress,
            frames,
        } = parts;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    // No allocations, no I/O, no blocking locks past this point
                    let now = frames.get();
                    while let Some(command) = command_rx.try_pop() {
                        state.apply(command, now);
                    }

                    let frame_count = data.len() / channels.max(1);
                    state.render(
                        now,
                        frame_count,
                        |tick| {
                            let _ = tick_tx.try_push(tick);
                        },
                        |i, sample| {
                            for out in &mut data[i * channels..(i + 1) * channels] {
                                *out = Sample::from_sample::<f32>(sample);
                            }
                        },
                    );

                    frames.advance(frame_count as u64);
                    progress.set(state.published_progress(now, frame_count));
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                    push_signal(&signals, BackendSignal::StreamError(err.to_string()));
                },
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))
    }
}

struct StreamParts {
    channels: usize,
    state: CallbackState,
    command_rx: CommandConsumer,
    tick_tx: TickProducer,
    signals: Arc<Mutex<SignalProducer>>,
    progress: AtomicF64,
    frames: FrameCounter,
}

/// Never called from the audio callback itself
fn push_signal(signals: &Arc<Mutex<SignalProducer>>, signal: BackendSignal) {
    match signals.lock() {
        Ok(mut tx) => {
            if tx.try_push(signal).is_err() {
                log::warn!("Backend signal queue full, signal dropped");
            }
        }
        Err(_) => log::error!("Backend signal queue poisoned, signal dropped"),
    }
}

/// Decode every slot of a sample set; failed slots stay silent
fn decode_slots(
    config: &PlaybackConfig,
    sample_rate: u32,
    signals: &Arc<Mutex<SignalProducer>>,
) -> Vec<Option<Arc<[f32]>>> {
    config
        .slots
        .iter()
        .enumerate()
        .map(|(track, slot)| {
            let descriptor = slot.as_ref()?;
            match load_sample(Path::new(&descriptor.source), sample_rate) {
                Ok(buffer) => Some(Arc::from(buffer.data.into_boxed_slice())),
                Err(e) => {
                    log::warn!("Failed to load sample '{}': {}", descriptor.source, e);
                    push_signal(
                        signals,
                        BackendSignal::SampleLoadFailed {
                            track,
                            message: e.to_string(),
                        },
                    );
                    None
                }
            }
        })
        .collect()
}

impl AudioBackend for CpalBackend {
    fn start_loop(&mut self, delay: Duration) {
        let delay_frames = (delay.as_secs_f64() * self.sample_rate as f64) as u64;
        self.send(AudioCommand::StartLoop { delay_frames });
    }

    fn stop_loop(&mut self) {
        self.send(AudioCommand::StopLoop);
    }

    fn set_bpm(&mut self, bpm: u32) {
        self.send(AudioCommand::SetBpm(bpm));
    }

    fn set_division(&mut self, division: usize) {
        self.send(AudioCommand::SetDivision(division));
    }

    fn loop_progress(&self) -> f64 {
        self.progress.get()
    }

    fn load_samples(&mut self, config: &PlaybackConfig) {
        let config = config.clone();
        let sample_rate = self.sample_rate;
        let commands = Arc::clone(&self.commands);
        let signals = Arc::clone(&self.signals);

        std::thread::spawn(move || {
            let buffers = decode_slots(&config, sample_rate, &signals);

            if let Ok(mut tx) = commands.lock() {
                let install = AudioCommand::InstallSamples {
                    generation: config.generation,
                    samples: buffers,
                };
                if tx.try_push(install).is_err() {
                    log::warn!("Audio command queue full, sample set dropped");
                    return;
                }
            }
            push_signal(
                &signals,
                BackendSignal::SamplesLoaded {
                    generation: config.generation,
                },
            );
        });
    }

    fn play_sample(&mut self, track: usize, gain: f32, at: Option<f64>) {
        self.send(AudioCommand::PlaySample { track, gain, at });
    }

    fn play_click(&mut self, click: ClickType, at: f64) {
        self.send(AudioCommand::PlayClick { click, at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::recorder::quantize;

    fn render(state: &mut CallbackState, now: u64, frames: usize) -> (Vec<Tick>, Vec<f32>) {
        let mut ticks = Vec::new();
        let mut out = vec![0.0; frames];
        state.render(now, frames, |t| ticks.push(t), |i, s| out[i] = s);
        (ticks, out)
    }

    fn buffer(value: f32, len: usize) -> Arc<[f32]> {
        Arc::from(vec![value; len].into_boxed_slice())
    }

    fn install(generation: u64, samples: Vec<Option<Arc<[f32]>>>) -> AudioCommand {
        AudioCommand::InstallSamples {
            generation,
            samples,
        }
    }

    #[test]
    fn test_ticks_include_lookahead() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(AudioCommand::StartLoop { delay_frames: 0 }, 0);

        // 512 frames plus 50ms lookahead covers steps at 0 only (next is at 6000)
        let (ticks, _) = render(&mut state, 0, 512);
        assert_eq!(ticks, vec![Tick { time: 0.0, step: 0 }]);

        // Step 1 sits at 6000 frames; it is reported once inside the horizon
        let (ticks, _) = render(&mut state, 3500, 512);
        assert_eq!(ticks.len(), 1);
        assert_eq!(ticks[0].step, 1);
    }

    #[test]
    fn test_scheduled_sample_starts_on_frame() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(install(1, vec![Some(buffer(0.5, 64))]), 0);
        // 100 frames into the stream
        state.apply(
            AudioCommand::PlaySample {
                track: 0,
                gain: 1.0,
                at: Some(100.0 / 48000.0),
            },
            0,
        );

        let (_, out) = render(&mut state, 0, 128);
        assert!(out[..100].iter().all(|&s| s == 0.0));
        assert!(out[100] > 0.0);
    }

    #[test]
    fn test_missing_sample_is_silent() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(install(1, vec![None]), 0);
        state.apply(
            AudioCommand::PlaySample {
                track: 0,
                gain: 1.0,
                at: None,
            },
            0,
        );
        state.apply(
            AudioCommand::PlaySample {
                track: 3,
                gain: 1.0,
                at: None,
            },
            0,
        );

        let (_, out) = render(&mut state, 0, 64);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_click_in_the_past_plays_now() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(
            AudioCommand::PlayClick {
                click: ClickType::Accent,
                at: 0.0,
            },
            1000,
        );

        let (_, out) = render(&mut state, 1000, 64);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_progress_stops_with_loop() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(AudioCommand::StartLoop { delay_frames: 0 }, 0);
        render(&mut state, 0, 512);
        assert!(state.progress(24000) > 0.0);

        state.apply(AudioCommand::StopLoop, 512);
        assert_eq!(state.progress(24000), 0.0);
    }

    #[test]
    fn test_tap_before_boundary_lands_on_ticked_step() {
        // 120 bpm, 16 steps: step 4 starts at frame 24000
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(AudioCommand::StartLoop { delay_frames: 0 }, 0);

        let mut now = 0;
        loop {
            let (ticks, _) = render(&mut state, now, 512);
            if ticks.iter().any(|t| t.step == 4) {
                break;
            }
            now += 512;
        }
        // The step 4 tick is out while the playhead is still inside step 3
        assert!(now < 24000);

        let tap = quantize(state.published_progress(now, 512), 16);
        assert_eq!(tap.step, 4);
        assert!(!tap.pending);
    }

    #[test]
    fn test_published_progress_wraps_with_ticks() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(AudioCommand::StartLoop { delay_frames: 0 }, 0);

        // Horizon 96000 + 512 + 2400 is past the loop end, step 0 is handed out
        let (ticks, _) = render(&mut state, 0, 512);
        assert_eq!(ticks[0].step, 0);
        let mut now = 512;
        let mut wrapped = false;
        while now < 96000 {
            let (ticks, _) = render(&mut state, now, 512);
            if ticks.iter().any(|t| t.step == 0) {
                wrapped = true;
                break;
            }
            now += 512;
        }
        assert!(wrapped);
        assert!(state.published_progress(now, 512) < 0.05);
    }

    #[test]
    fn test_older_sample_set_does_not_replace_newer() {
        let mut state = CallbackState::new(48000, 120, 16);
        state.apply(install(3, vec![Some(buffer(0.25, 64))]), 0);
        state.apply(install(2, vec![Some(buffer(0.75, 64))]), 0);
        assert_eq!(state.samples_generation(), 3);

        state.apply(
            AudioCommand::PlaySample {
                track: 0,
                gain: 1.0,
                at: None,
            },
            0,
        );
        let (_, out) = render(&mut state, 0, 8);
        assert!(out[0] > 0.0);
        assert!(out[0] < 0.5);
    }
}
