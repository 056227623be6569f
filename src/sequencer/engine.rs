// Sequencer engine - Owns the grid, transport and sample bank
//
// Single-threaded: ticks from the backend and user input are applied one at
// a time by whoever owns the `Sequencer`. Observers follow along through the
// event channel.

use ringbuf::traits::Producer;
use std::time::Duration;

use crate::audio::backend::{AudioBackend, BackendSignal, Tick};
use crate::config::{EngineConfig, is_valid_gain};
use crate::error::{SequencerError, SequencerResult};
use crate::messaging::channels::EventProducer;
use crate::messaging::event::SequencerEvent;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sampler::{SampleBank, SampleDescriptor};
use crate::sequencer::grid::{CellState, Grid};
use crate::sequencer::input::{Key, KeyState, UiAction};
use crate::sequencer::metronome::Metronome;
use crate::sequencer::notation::DecodeReport;
use crate::sequencer::recorder::{HitId, Recorder, generate_hit_id, quantize};
use crate::sequencer::transport::{Transport, TransportState, parse_bpm};

pub struct Sequencer<B: AudioBackend> {
    config: EngineConfig,
    backend: B,
    events: EventProducer,
    transport: Transport,
    grid: Grid,
    bank: SampleBank,
    recorder: Recorder,
    metronome: Metronome,
    keys: KeyState,
    backend_ready: bool,
    samples_loaded: bool,
}

impl<B: AudioBackend> Sequencer<B> {
    pub fn new(config: EngineConfig, backend: B, events: EventProducer) -> SequencerResult<Self> {
        config.validate()?;

        let tracks = config.track_count();
        let division = config.division as usize;

        Ok(Self {
            transport: Transport::new(config.bpm, division),
            grid: Grid::new(tracks, division),
            bank: SampleBank::new(config.kit.samples.clone()),
            recorder: Recorder::new(config.recording),
            metronome: Metronome::new(config.metronome),
            keys: KeyState::default(),
            backend_ready: false,
            samples_loaded: false,
            config,
            backend,
            events,
        })
    }

    // ---- accessors ----

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn bank(&self) -> &SampleBank {
        &self.bank
    }

    pub fn key_state(&self) -> &KeyState {
        &self.keys
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn bpm(&self) -> u32 {
        self.transport.bpm()
    }

    pub fn division(&self) -> usize {
        self.transport.division()
    }

    pub fn track_count(&self) -> usize {
        self.grid.tracks()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_metronome_enabled(&self) -> bool {
        self.metronome.is_enabled()
    }

    pub fn is_backend_ready(&self) -> bool {
        self.backend_ready
    }

    pub fn samples_loaded(&self) -> bool {
        self.samples_loaded
    }

    fn emit(&mut self, event: SequencerEvent) {
        if let Err(event) = self.events.try_push(event) {
            log::warn!("Event queue full, dropping {:?}", event);
        }
    }

    fn diagnostic(&mut self, category: NotificationCategory, error: &SequencerError) {
        log::warn!("{}", error);
        self.emit(SequencerEvent::Diagnostic(Notification::warning(
            category,
            error.to_string(),
        )));
    }

    fn emit_sequence_changed(&mut self) {
        let notation = self.grid.serialize();
        self.emit(SequencerEvent::SequenceChanged);
        self.emit(SequencerEvent::SequenceSaved { notation });
    }

    fn check_track(&self, track: usize) -> SequencerResult<()> {
        if track < self.grid.tracks() {
            Ok(())
        } else {
            Err(SequencerError::InvalidTrack {
                track,
                tracks: self.grid.tracks(),
            })
        }
    }

    // ---- lifecycle ----

    /// Load the sample set and wait for the backend
    pub fn start(&mut self) {
        if !self.transport.begin_start() {
            log::debug!("start() ignored in state {:?}", self.transport.state());
            return;
        }
        log::info!("Sequencer starting at {} bpm", self.transport.bpm());

        self.rebuild_samples();
        if self.backend_ready {
            self.finish_start();
        }
    }

    /// Backend acknowledged it can play
    pub fn on_backend_ready(&mut self) {
        self.backend_ready = true;
        if self.transport.state() == TransportState::Starting {
            self.finish_start();
        }
    }

    fn finish_start(&mut self) {
        // Tempo and division set while waiting are forwarded now
        self.backend.set_bpm(self.transport.bpm());
        self.backend.set_division(self.transport.division());

        if self.transport.mark_ready() {
            self.backend.start_loop(self.config.startup_delay());
            log::info!("Transport running");
            self.emit(SequencerEvent::PlaybackStarted);
        }
    }

    /// Dispatch a backend notification
    pub fn on_backend_signal(&mut self, signal: BackendSignal) {
        match signal {
            BackendSignal::Ready => self.on_backend_ready(),
            BackendSignal::SamplesLoaded { generation } => self.on_samples_loaded(generation),
            BackendSignal::SampleLoadFailed { track, message } => {
                log::warn!("Sample for track {} failed to load: {}", track, message);
                self.emit(SequencerEvent::Diagnostic(Notification::error(
                    NotificationCategory::Samples,
                    format!("Track {}: {}", track, message),
                )));
            }
            BackendSignal::StreamError(message) => {
                self.emit(SequencerEvent::Diagnostic(Notification::error(
                    NotificationCategory::Transport,
                    message,
                )));
            }
        }
    }

    // ---- clock ----

    pub fn on_tick(&mut self, time: f64, step: usize) {
        if !self.transport.record_tick(time, step) {
            log::debug!("Tick for step {} ignored", step);
            return;
        }

        let division = self.transport.division();
        if let Some(click) = self.metronome.click_at(step, division) {
            self.backend.play_click(click, time);
        }

        let Ok(column) = self.grid.column(step) else {
            return;
        };

        let mut played = false;
        for (track, cell) in column.into_iter().enumerate() {
            if cell != CellState::Committed {
                continue;
            }
            let Some(gain) = self.bank.active(track).map(|d| d.gain) else {
                continue;
            };
            self.backend.play_sample(track, gain, Some(time));
            self.emit(SequencerEvent::SamplePlayed { track });
            played = true;
        }
        if played {
            self.emit(SequencerEvent::StepPlayed { step });
        }

        // Promoted cells sound from the next pass on
        self.grid.promote_pending(step);

        self.emit(SequencerEvent::StepAdvanced { step, time });
    }

    pub fn handle_tick(&mut self, tick: Tick) {
        self.on_tick(tick.time, tick.step);
    }

    // ---- transport ----

    pub fn toggle_playback(&mut self) -> SequencerResult<()> {
        match self.transport.state() {
            TransportState::Starting => Ok(()),
            TransportState::Running => {
                self.transport.stop();
                self.backend.stop_loop();
                log::info!("Transport stopped");
                self.emit(SequencerEvent::PlaybackStopped);
                Ok(())
            }
            TransportState::Stopped => {
                if !self.backend_ready {
                    return Err(SequencerError::BackendNotReady);
                }
                // Playing without start() still needs a sample set
                if !self.samples_loaded && !self.bank.is_rebuilding() {
                    self.rebuild_samples();
                }
                self.transport.resume();
                self.backend.start_loop(Duration::ZERO);
                log::info!("Transport running");
                self.emit(SequencerEvent::PlaybackStarted);
                Ok(())
            }
        }
    }

    pub fn set_bpm(&mut self, bpm: u32) -> SequencerResult<()> {
        self.transport.set_bpm(bpm)?;
        if self.backend_ready {
            self.backend.set_bpm(bpm);
        }
        log::debug!("BPM set to {}", bpm);
        self.emit(SequencerEvent::BpmChanged { bpm });
        Ok(())
    }

    /// Tempo from user text; rejected input leaves the tempo unchanged
    pub fn set_bpm_str(&mut self, input: &str) -> SequencerResult<()> {
        match parse_bpm(input) {
            Ok(bpm) => self.set_bpm(bpm),
            Err(e) => {
                self.diagnostic(NotificationCategory::Transport, &e);
                Err(e)
            }
        }
    }

    /// Change the number of steps; the grid is rebuilt empty
    pub fn set_division(&mut self, division: u32) -> SequencerResult<()> {
        self.transport.set_division(division)?;
        let division = self.transport.division();

        self.grid = Grid::new(self.grid.tracks(), division);
        if self.backend_ready {
            self.backend.set_division(division);
        }

        self.emit(SequencerEvent::DivisionChanged { division });
        self.emit(SequencerEvent::SequenceCleared);
        self.emit(SequencerEvent::SequenceChanged);
        Ok(())
    }

    // ---- metronome & recording ----

    pub fn toggle_metronome(&mut self) -> bool {
        let enabled = self.metronome.toggle();
        self.emit(SequencerEvent::MetronomeToggled { enabled });
        enabled
    }

    pub fn set_metronome(&mut self, enabled: bool) {
        if self.metronome.is_enabled() != enabled {
            self.toggle_metronome();
        }
    }

    pub fn start_recording(&mut self) {
        if self.recorder.start() {
            self.emit(SequencerEvent::RecordingStarted);
        }
    }

    pub fn stop_recording(&mut self) {
        if self.recorder.stop() {
            self.emit(SequencerEvent::RecordingStopped);
        }
    }

    // ---- input ----

    /// Play a track right away
    ///
    /// Silently dropped until the backend is ready and samples are loaded.
    pub fn tap(&mut self, track: usize) -> SequencerResult<()> {
        self.check_track(track)?;
        if !self.backend_ready || !self.samples_loaded {
            log::debug!("Tap on track {} dropped, audio not ready", track);
            return Ok(());
        }

        if let Some(gain) = self.bank.active(track).map(|d| d.gain) {
            self.backend.play_sample(track, gain, None);
            self.emit(SequencerEvent::SamplePlayed { track });
        }
        Ok(())
    }

    /// Record a hit for `track` at the current loop position
    ///
    /// Returns the id of the new hit, or `None` when nothing was recorded
    /// (not recording, transport not running, or the cell already holds a hit).
    pub fn add_hit(&mut self, track: usize) -> SequencerResult<Option<HitId>> {
        self.check_track(track)?;
        if !self.recorder.is_recording() || !self.transport.is_running() {
            return Ok(None);
        }

        let division = self.transport.division();
        let target = quantize(self.backend.loop_progress(), division);
        log::debug!(
            "Tap at {:.3} steps -> step {} ({:?})",
            target.position,
            target.step,
            target.cell_state()
        );

        if !self.grid.set(track, target.step, target.cell_state())? {
            return Ok(None);
        }

        let id = generate_hit_id();
        self.emit_sequence_changed();
        self.emit(SequencerEvent::HitAdded {
            step: target.step,
            track,
            division,
            id,
        });
        Ok(Some(id))
    }

    /// Remove a hit, typically on undo
    ///
    /// A `division` other than the current one means the grid was rebuilt
    /// since the hit was recorded, and the request is rejected.
    pub fn remove_hit(
        &mut self,
        step: usize,
        track: usize,
        division: usize,
        id: HitId,
    ) -> SequencerResult<bool> {
        if division != self.grid.division() {
            return Err(SequencerError::InvalidStep {
                step,
                division: self.grid.division(),
            });
        }
        if !self.grid.clear(track, step)? {
            return Ok(false);
        }

        self.emit_sequence_changed();
        self.emit(SequencerEvent::HitRemoved {
            step,
            track,
            division,
            id,
        });
        Ok(true)
    }

    pub fn handle_action(&mut self, action: UiAction) -> SequencerResult<()> {
        match action {
            UiAction::Tap(track) => {
                self.tap(track)?;
                self.add_hit(track)?;
            }
            UiAction::TogglePlayback => self.toggle_playback()?,
            UiAction::Clear => self.clear_sequence(),
            UiAction::ToggleMetronome => {
                self.toggle_metronome();
            }
        }
        Ok(())
    }

    /// Raw key press from the front end
    pub fn key_down(&mut self, key: Key) {
        let Some(action) = self.keys.press(key, &self.config.keys) else {
            return;
        };
        if let Err(e) = self.handle_action(action) {
            self.diagnostic(NotificationCategory::Input, &e);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        self.keys.release(key, &self.config.keys);
    }

    // ---- sequence ----

    pub fn clear_sequence(&mut self) {
        self.grid.clear_all();
        self.emit(SequencerEvent::SequenceCleared);
        self.emit_sequence_changed();
    }

    pub fn save_sequence(&self) -> String {
        self.grid.serialize()
    }

    /// Replace the grid with a decoded sequence
    ///
    /// Bad tokens are reported as diagnostics; everything else loads.
    pub fn load_sequence(&mut self, input: &str) -> DecodeReport {
        let report = self.grid.deserialize(input);
        self.emit(SequencerEvent::SequenceCleared);

        for error in &report.errors {
            self.diagnostic(NotificationCategory::Sequence, error);
        }

        let division = self.grid.division();
        for &(track, step) in &report.hits {
            let id = generate_hit_id();
            self.emit(SequencerEvent::HitAdded {
                step,
                track,
                division,
                id,
            });
        }
        self.emit_sequence_changed();
        report
    }

    /// Sequence from a shared link, or a single kick on the downbeat
    pub fn load_initial(&mut self, shared: Option<&str>) -> Option<DecodeReport> {
        match shared.map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => Some(self.load_sequence(text)),
            None => {
                self.grid.clear_all();
                self.emit(SequencerEvent::SequenceCleared);
                if let Ok(true) = self.grid.set(0, 0, CellState::Committed) {
                    let id = generate_hit_id();
                    self.emit(SequencerEvent::HitAdded {
                        step: 0,
                        track: 0,
                        division: self.grid.division(),
                        id,
                    });
                }
                self.emit_sequence_changed();
                None
            }
        }
    }

    // ---- samples ----

    /// Store a custom sample for a track; audible after `rebuild_samples()`
    pub fn load_custom_sample(
        &mut self,
        track: usize,
        source: impl Into<String>,
        gain: Option<f32>,
    ) -> SequencerResult<()> {
        let gain = gain.unwrap_or(self.config.custom_sample_gain);
        if !is_valid_gain(gain) {
            return Err(SequencerError::InvalidConfig(format!(
                "gain {} is outside (0, 1]",
                gain
            )));
        }

        self.bank
            .set_override(track, SampleDescriptor::new(source, gain))?;
        log::info!("Custom sample stored for track {}", track);
        self.emit(SequencerEvent::CustomSampleLoaded { track });
        Ok(())
    }

    /// Hand the resolved sample set to the backend
    pub fn rebuild_samples(&mut self) {
        let config = self.bank.rebuild();
        log::debug!("Loading sample set generation {}", config.generation);
        self.backend.load_samples(&config);
    }

    /// Drop every custom sample and reload the defaults right away
    pub fn revert_to_default_samples(&mut self) {
        self.bank.clear_overrides();
        self.rebuild_samples();
    }

    pub fn on_samples_loaded(&mut self, generation: u64) {
        if !self.bank.activate(generation) {
            log::debug!("Ignoring stale sample set generation {}", generation);
            return;
        }
        self.samples_loaded = true;
        log::info!("Sample set generation {} active", generation);
        self.emit(SequencerEvent::SamplesLoaded { generation });
    }
}
