// Notation - Compact text encoding of a grid
//
// Format: one group per step that holds at least one hit, in ascending step
// order. A group is the step letter ('A' + step) followed by one digit per
// track with a hit at that step, ascending, without separators.
//
//   track 0 at step 0, tracks 1 and 3 at step 2  ->  "A0C13"
//
// Only the letters A-Z and the digits 0-9 are available, so the format
// covers divisions up to 26 and at most 10 tracks.

use crate::error::SequencerError;
use crate::sequencer::grid::Grid;

/// Highest division the notation can address
pub const MAX_DIVISION: usize = 26;

/// Highest track count the notation can address
pub const MAX_TRACKS: usize = 10;

/// Outcome of a lenient decode
#[derive(Debug, Default)]
pub struct DecodeReport {
    /// Valid (track, step) hits, in order of appearance, without duplicates
    pub hits: Vec<(usize, usize)>,
    /// Tokens (or single track digits) that were dropped
    pub errors: Vec<SequencerError>,
    /// Number of input bytes that were not part of any token
    pub skipped_bytes: usize,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.skipped_bytes == 0
    }
}

/// Encode every non-empty cell, pending ones included
pub fn encode(grid: &Grid) -> String {
    let mut out = String::new();

    for step in 0..grid.division().min(MAX_DIVISION) {
        let tracks = grid.tracks_at(step);
        if tracks.is_empty() {
            continue;
        }

        out.push((b'A' + step as u8) as char);
        for track in tracks {
            match char::from_digit(track as u32, 10) {
                Some(digit) => out.push(digit),
                None => log::warn!("Track {} cannot be written in sequence notation", track),
            }
        }
    }

    out
}

/// Decode a sequence string for a grid of the given size
///
/// Scans for "one letter followed by one or more digits". Anything between
/// such tokens is skipped, and tokens that point outside the grid are
/// dropped without affecting the others.
pub fn decode(input: &str, tracks: usize, division: usize) -> DecodeReport {
    let bytes = input.as_bytes();
    let mut report = DecodeReport::default();
    let mut i = 0;

    while i < bytes.len() {
        let letter = bytes[i];
        let digits_end = if letter.is_ascii_alphabetic() {
            bytes[i + 1..]
                .iter()
                .position(|b| !b.is_ascii_digit())
                .map_or(bytes.len(), |p| i + 1 + p)
        } else {
            i + 1
        };

        if !letter.is_ascii_alphabetic() || digits_end == i + 1 {
            report.skipped_bytes += 1;
            i += 1;
            continue;
        }

        decode_token(&input[i..digits_end], tracks, division, &mut report);
        i = digits_end;
    }

    if report.skipped_bytes > 0 {
        log::debug!(
            "Sequence notation: skipped {} unparseable bytes in '{}'",
            report.skipped_bytes,
            input
        );
    }

    report
}

fn decode_token(token: &str, tracks: usize, division: usize, report: &mut DecodeReport) {
    let bytes = token.as_bytes();
    // Lowercase letters land past 'Z' and are rejected by the range check
    let step = (bytes[0] - b'A') as usize;

    if step >= division {
        report.errors.push(SequencerError::MalformedSerializedToken {
            token: token.to_string(),
            reason: format!("step {} is outside division {}", step, division),
        });
        return;
    }

    for &digit in &bytes[1..] {
        let track = (digit - b'0') as usize;
        if track >= tracks {
            report.errors.push(SequencerError::MalformedSerializedToken {
                token: token.to_string(),
                reason: format!("track {} is outside track count {}", track, tracks),
            });
            continue;
        }
        if !report.hits.contains(&(track, step)) {
            report.hits.push((track, step));
        }
    }
}
