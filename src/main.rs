use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::HeapRb;
use std::io::BufRead;
use std::path::Path;
use std::time::Duration;
use step108::audio::{BackendEvents, CpalBackend};
use step108::command::HitHistory;
use step108::messaging::{EventConsumer, SequencerEvent, create_event_channel};
use step108::sequencer::{Key, Sequencer, UiAction};
use step108::session::Session;
use step108::EngineConfig;

const INPUT_RINGBUFFER_CAPACITY: usize = 64;
const POLL_INTERVAL: Duration = Duration::from_millis(2);

const HELP: &str = "\
Keys (type then Enter): c v b n m = tracks, space = play/stop, x = clear
Commands:
  bpm <n>            set tempo
  div <n>            set steps per loop (1-26)
  metro              toggle metronome
  rec                toggle recording
  undo               remove the last recorded hit
  save               print the sequence notation
  load <notation>    replace the sequence
  sample <t> <path>  use a custom sample for track t
  rebuild            load custom samples
  revert             back to the default kit
  session save|load <path>
  quit";

fn main() {
    println!("=== step108 ===");
    println!("Version {}\n", env!("CARGO_PKG_VERSION"));

    let config = match EngineConfig::load_or_default() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: invalid configuration: {}", e);
            return;
        }
    };
    println!("Kit: {} ({} tracks)", config.kit.name, config.track_count());

    let (event_tx, mut event_rx) = create_event_channel(config.event_capacity);

    println!("Audio engine initialisation...");
    let (backend, mut backend_events) =
        match CpalBackend::start(config.bpm, config.division as usize) {
            Ok(started) => started,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                return;
            }
        };

    let mut sequencer = match Sequencer::new(config, backend, event_tx) {
        Ok(sequencer) => sequencer,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            return;
        }
    };

    let shared = std::env::args().nth(1);
    sequencer.load_initial(shared.as_deref());
    sequencer.start();

    // Stdin is read on its own thread and handed over line by line
    let (mut line_tx, mut line_rx) = HeapRb::<String>::new(INPUT_RINGBUFFER_CAPACITY).split();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.try_push(line).is_err() {
                eprintln!("Input queue full, line dropped");
            }
        }
    });

    println!("\n{}\n", HELP);

    let mut history = HitHistory::new();
    loop {
        pump_backend(&mut sequencer, &mut backend_events);

        while let Some(line) = line_rx.try_pop() {
            if !run_line(&mut sequencer, &mut history, line.trim()) {
                return;
            }
        }

        print_events(&mut event_rx, &mut history);
        std::thread::sleep(POLL_INTERVAL);
    }
}

fn pump_backend(sequencer: &mut Sequencer<CpalBackend>, events: &mut BackendEvents) {
    while let Some(signal) = events.signals.try_pop() {
        sequencer.on_backend_signal(signal);
    }
    while let Some(tick) = events.ticks.try_pop() {
        sequencer.handle_tick(tick);
    }
}

/// Returns false when the user asked to quit
fn run_line(sequencer: &mut Sequencer<CpalBackend>, history: &mut HitHistory, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or("");
    let arg = parts.next();

    let result = match (command, arg) {
        ("quit" | "q", _) => return false,
        ("help", _) => {
            println!("{}", HELP);
            Ok(())
        }
        ("bpm", Some(value)) => sequencer.set_bpm_str(value),
        ("div", Some(value)) => match value.parse::<u32>() {
            Ok(division) => sequencer.set_division(division),
            Err(_) => {
                eprintln!("Division must be a number");
                Ok(())
            }
        },
        ("metro", _) => sequencer.handle_action(UiAction::ToggleMetronome),
        ("rec", _) => {
            if sequencer.is_recording() {
                sequencer.stop_recording();
            } else {
                sequencer.start_recording();
            }
            Ok(())
        }
        ("undo", _) => history.undo_on(sequencer).map(|record| {
            if record.is_none() {
                println!("Nothing to undo");
            }
        }),
        ("save", _) => {
            println!("Sequence: {}", sequencer.save_sequence());
            Ok(())
        }
        ("load", notation) => {
            let report = sequencer.load_sequence(notation.unwrap_or(""));
            println!("Loaded {} hits", report.hits.len());
            Ok(())
        }
        ("sample", Some(track)) => match (track.parse::<usize>(), parts.next()) {
            (Ok(track), Some(path)) => sequencer.load_custom_sample(track, path, None),
            _ => {
                eprintln!("Usage: sample <track> <path>");
                Ok(())
            }
        },
        ("rebuild", _) => {
            sequencer.rebuild_samples();
            Ok(())
        }
        ("revert", _) => {
            sequencer.revert_to_default_samples();
            Ok(())
        }
        ("session", Some(action)) => match (action, parts.next()) {
            ("save", Some(path)) => Session::capture(sequencer).save(Path::new(path)),
            ("load", Some(path)) => Session::load(Path::new(path))
                .and_then(|session| session.apply(sequencer))
                .map(|_| ()),
            _ => {
                eprintln!("Usage: session save|load <path>");
                Ok(())
            }
        },
        _ => {
            // Anything else is played as keys; an empty line is a space
            let keys: Vec<Key> = if line.is_empty() {
                vec![Key::Space]
            } else {
                line.chars().map(Key::from_char).collect()
            };
            for key in keys {
                sequencer.key_down(key);
                sequencer.key_up(key);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
    }
    true
}

fn print_events(events: &mut EventConsumer, history: &mut HitHistory) {
    while let Some(event) = events.try_pop() {
        history.observe(&event);

        match event {
            SequencerEvent::StepAdvanced { .. }
            | SequencerEvent::StepPlayed { .. }
            | SequencerEvent::SamplePlayed { .. }
            | SequencerEvent::SequenceChanged => {}
            SequencerEvent::SequenceSaved { notation } => println!("Sequence: {}", notation),
            SequencerEvent::Diagnostic(notification) => {
                eprintln!("[{:?}] {}", notification.level, notification.message)
            }
            other => println!("{:?}", other),
        }
    }
}
