//! End-to-end behaviour of the sequencer engine driven by a manual clock

use step108::audio::{BackendCall, ManualBackend};
use step108::messaging::channels::{EventConsumer, drain_events};
use step108::{
    CellState, EngineConfig, HitHistory, Sequencer, SequencerError, SequencerEvent, Session,
    TransportState, create_event_channel,
};
use tempfile::tempdir;

fn ready_sequencer(config: EngineConfig) -> (Sequencer<ManualBackend>, EventConsumer) {
    let (tx, rx) = create_event_channel(4096);
    let mut seq = Sequencer::new(config, ManualBackend::new(), tx).unwrap();
    seq.start();
    seq.on_backend_ready();
    let generation = seq.backend().last_generation().unwrap();
    seq.on_samples_loaded(generation);
    (seq, rx)
}

/// Run one full loop pass; returns the tracks played per step
fn play_pass(seq: &mut Sequencer<ManualBackend>, start_time: f64) -> Vec<Vec<usize>> {
    let division = seq.division();
    let mut played = Vec::with_capacity(division);

    for step in 0..division {
        seq.backend_mut().take_calls();
        seq.on_tick(start_time + step as f64 * 0.1, step);
        let mut tracks: Vec<usize> = seq
            .backend()
            .played_samples()
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        tracks.sort_unstable();
        played.push(tracks);
    }
    played
}

#[test]
fn test_shared_sequence_plays_back() {
    let (mut seq, _rx) = ready_sequencer(EngineConfig::default());
    seq.load_initial(Some("A0C13"));

    let played = play_pass(&mut seq, 0.0);
    assert_eq!(played[0], vec![0]);
    assert_eq!(played[2], vec![1, 3]);
    assert_eq!(played.iter().filter(|p| !p.is_empty()).count(), 2);
}

#[test]
fn test_recorded_pending_hit_plays_from_next_pass() {
    let (mut seq, _rx) = ready_sequencer(EngineConfig::default());
    seq.clear_sequence();

    // 3.6 steps in: rounds up to step 4, ahead of the playhead
    seq.backend_mut().set_progress(3.6 / 16.0);
    seq.add_hit(2).unwrap().unwrap();
    assert_eq!(seq.grid().get(2, 4).unwrap(), CellState::Pending);

    let first = play_pass(&mut seq, 0.0);
    assert!(first[4].is_empty());
    assert_eq!(seq.grid().get(2, 4).unwrap(), CellState::Committed);

    let second = play_pass(&mut seq, 1.6);
    assert_eq!(second[4], vec![2]);
}

#[test]
fn test_gain_comes_from_active_sample() {
    let (mut seq, _rx) = ready_sequencer(EngineConfig::default());
    seq.load_sequence("A2");
    seq.backend_mut().take_calls();

    seq.on_tick(0.0, 0);
    assert_eq!(
        seq.backend().calls(),
        &[BackendCall::PlaySample {
            track: 2,
            gain: 0.75,
            at: Some(0.0)
        }]
    );
}

#[test]
fn test_malformed_tokens_reported_as_diagnostics() {
    let mut config = EngineConfig::default();
    config.division = 10;
    let (mut seq, mut rx) = ready_sequencer(config);
    drain_events(&mut rx);

    let report = seq.load_sequence("A0Z99C1");
    assert_eq!(report.errors.len(), 1);
    assert_eq!(seq.save_sequence(), "A0C1");

    let events = drain_events(&mut rx);
    let diagnostics = events
        .iter()
        .filter(|e| matches!(e, SequencerEvent::Diagnostic(_)))
        .count();
    let added = events
        .iter()
        .filter(|e| matches!(e, SequencerEvent::HitAdded { .. }))
        .count();
    assert_eq!(diagnostics, 1);
    assert_eq!(added, 2);
    assert!(events.contains(&SequencerEvent::SequenceSaved {
        notation: "A0C1".to_string()
    }));
}

#[test]
fn test_undo_through_history() {
    let (mut seq, mut rx) = ready_sequencer(EngineConfig::default());
    seq.clear_sequence();
    let mut history = HitHistory::new();

    seq.backend_mut().set_progress(0.0);
    seq.add_hit(0).unwrap();
    seq.backend_mut().set_progress(0.5);
    seq.add_hit(1).unwrap();
    for event in drain_events(&mut rx) {
        history.observe(&event);
    }
    assert_eq!(history.undo_count(), 2);

    let undone = history.undo_on(&mut seq).unwrap().unwrap();
    assert_eq!((undone.track, undone.step), (1, 8));
    assert_eq!(seq.save_sequence(), "A0");

    // Undo after the grid was rebuilt is rejected without touching it
    seq.set_division(8).unwrap();
    seq.backend_mut().set_progress(0.0);
    seq.add_hit(3).unwrap();
    assert!(matches!(
        history.undo_on(&mut seq),
        Err(SequencerError::InvalidStep { .. })
    ));
    assert_eq!(seq.save_sequence(), "A3");
}

#[test]
fn test_stop_and_restart() {
    let (mut seq, mut rx) = ready_sequencer(EngineConfig::default());
    drain_events(&mut rx);

    seq.toggle_playback().unwrap();
    assert_eq!(seq.state(), TransportState::Stopped);
    assert!(!seq.backend().is_running());

    seq.toggle_playback().unwrap();
    assert_eq!(seq.state(), TransportState::Running);
    assert_eq!(
        seq.backend().calls().last(),
        Some(&BackendCall::StartLoop(std::time::Duration::ZERO))
    );
    assert_eq!(
        drain_events(&mut rx),
        vec![SequencerEvent::PlaybackStopped, SequencerEvent::PlaybackStarted]
    );
}

#[test]
fn test_toggle_while_starting_is_noop() {
    let (tx, _rx) = create_event_channel(64);
    let mut seq = Sequencer::new(EngineConfig::default(), ManualBackend::new(), tx).unwrap();
    assert!(matches!(
        seq.toggle_playback(),
        Err(SequencerError::BackendNotReady)
    ));

    seq.start();
    seq.toggle_playback().unwrap();
    assert_eq!(seq.state(), TransportState::Starting);
}

#[test]
fn test_stale_sample_generation_ignored() {
    let (mut seq, _rx) = ready_sequencer(EngineConfig::default());
    seq.load_custom_sample(1, "first.wav", None).unwrap();
    seq.rebuild_samples();
    let stale = seq.backend().last_generation().unwrap();
    seq.load_custom_sample(1, "second.wav", None).unwrap();
    seq.rebuild_samples();
    let fresh = seq.backend().last_generation().unwrap();

    seq.on_samples_loaded(stale);
    assert_eq!(seq.bank().active(1).unwrap().source, "samples/808/clap.wav");

    seq.on_samples_loaded(fresh);
    let active = seq.bank().active(1).unwrap();
    assert_eq!(active.source, "second.wav");
    assert_eq!(active.gain, 0.9);
}

#[test]
fn test_session_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.ron");

    let (mut seq, _rx) = ready_sequencer(EngineConfig::default());
    seq.set_division(12).unwrap();
    seq.set_bpm(90).unwrap();
    seq.toggle_metronome();
    seq.load_sequence("A0B12L4");
    Session::capture(&seq).save(&path).unwrap();

    let (mut restored, _rx) = ready_sequencer(EngineConfig::default());
    let report = Session::load(&path).unwrap().apply(&mut restored).unwrap();
    assert!(report.is_clean());
    assert_eq!(restored.division(), 12);
    assert_eq!(restored.bpm(), 90);
    assert!(restored.is_metronome_enabled());
    assert_eq!(restored.save_sequence(), "A0B12L4");
}

#[test]
fn test_invalid_session_leaves_sequencer_alone() {
    let (mut seq, _rx) = ready_sequencer(EngineConfig::default());
    seq.load_sequence("A0");

    let session = Session {
        bpm: 0,
        division: 8,
        metronome: true,
        notation: "B1".to_string(),
    };
    assert!(session.apply(&mut seq).is_err());
    assert_eq!(seq.division(), 16);
    assert_eq!(seq.save_sequence(), "A0");
    assert!(!seq.is_metronome_enabled());
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = EngineConfig::default();
    config.division = 0;
    let (tx, _rx) = create_event_channel(8);
    assert!(Sequencer::new(config, ManualBackend::new(), tx).is_err());
}
