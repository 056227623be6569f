// Input - Keyboard bindings and button actions
// Maps raw key events to sequencer actions with key-repeat suppression.

use serde::{Deserialize, Serialize};

/// A physical key as reported by the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Space,
    Shift,
    Other,
}

impl Key {
    /// Character keys are matched case-insensitively
    pub fn from_char(c: char) -> Self {
        match c {
            ' ' => Key::Space,
            c => Key::Char(c.to_ascii_lowercase()),
        }
    }

    fn normalized(self) -> Self {
        match self {
            Key::Char(c) => Key::from_char(c),
            other => other,
        }
    }
}

/// Something the user asked the sequencer to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiAction {
    /// Play a track live and record it
    Tap(usize),
    TogglePlayback,
    Clear,
    ToggleMetronome,
}

/// Key layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    /// One key per track, in track order
    pub tracks: Vec<Key>,
    pub toggle_playback: Key,
    pub clear: Key,
    /// Held as a modifier; pressing it toggles the metronome
    pub metronome: Key,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            tracks: "cvbnm".chars().map(Key::Char).collect(),
            toggle_playback: Key::Space,
            clear: Key::Char('x'),
            metronome: Key::Shift,
        }
    }
}

impl KeyBindings {
    pub fn action_for(&self, key: Key) -> Option<UiAction> {
        let key = key.normalized();

        if let Some(track) = self.tracks.iter().position(|k| k.normalized() == key) {
            return Some(UiAction::Tap(track));
        }
        if key == self.toggle_playback.normalized() {
            return Some(UiAction::TogglePlayback);
        }
        if key == self.clear.normalized() {
            return Some(UiAction::Clear);
        }
        if key == self.metronome.normalized() {
            return Some(UiAction::ToggleMetronome);
        }
        None
    }

    pub fn is_modifier(&self, key: Key) -> bool {
        key.normalized() == self.metronome.normalized()
    }

    /// Key bound to a track, if any
    pub fn key_for_track(&self, track: usize) -> Option<Key> {
        self.tracks.get(track).copied()
    }
}

/// Held-key tracking
///
/// Only one key acts at a time: while any key (or the modifier) is down,
/// further presses are ignored until it is released. Auto-repeat of the
/// modifier does not toggle the metronome again.
#[derive(Debug, Clone, Default)]
pub struct KeyState {
    key_held: bool,
    modifier_held: bool,
}

impl KeyState {
    pub fn is_key_held(&self) -> bool {
        self.key_held
    }

    pub fn is_modifier_held(&self) -> bool {
        self.modifier_held
    }

    /// Register a key press and return the action to perform
    pub fn press(&mut self, key: Key, bindings: &KeyBindings) -> Option<UiAction> {
        if bindings.is_modifier(key) {
            if self.modifier_held {
                return None;
            }
            self.modifier_held = true;
            return Some(UiAction::ToggleMetronome);
        }

        if self.key_held || self.modifier_held {
            return None;
        }
        self.key_held = true;
        bindings.action_for(key)
    }

    /// Any release frees the held key; the modifier needs its own release
    pub fn release(&mut self, key: Key, bindings: &KeyBindings) {
        self.key_held = false;
        if bindings.is_modifier(key) {
            self.modifier_held = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let bindings = KeyBindings::default();
        assert_eq!(bindings.action_for(Key::Char('c')), Some(UiAction::Tap(0)));
        assert_eq!(bindings.action_for(Key::Char('M')), Some(UiAction::Tap(4)));
        assert_eq!(bindings.action_for(Key::Space), Some(UiAction::TogglePlayback));
        assert_eq!(bindings.action_for(Key::from_char('X')), Some(UiAction::Clear));
        assert_eq!(bindings.action_for(Key::Shift), Some(UiAction::ToggleMetronome));
        assert_eq!(bindings.action_for(Key::Char('q')), None);
        assert_eq!(bindings.key_for_track(1), Some(Key::Char('v')));
    }

    #[test]
    fn test_held_key_blocks_others() {
        let bindings = KeyBindings::default();
        let mut state = KeyState::default();

        assert_eq!(state.press(Key::Char('c'), &bindings), Some(UiAction::Tap(0)));
        // Auto-repeat and other keys are ignored while held
        assert_eq!(state.press(Key::Char('c'), &bindings), None);
        assert_eq!(state.press(Key::Char('v'), &bindings), None);

        state.release(Key::Char('c'), &bindings);
        assert_eq!(state.press(Key::Char('v'), &bindings), Some(UiAction::Tap(1)));
    }

    #[test]
    fn test_unbound_key_still_holds() {
        let bindings = KeyBindings::default();
        let mut state = KeyState::default();

        assert_eq!(state.press(Key::Other, &bindings), None);
        assert!(state.is_key_held());
        assert_eq!(state.press(Key::Char('c'), &bindings), None);
    }

    #[test]
    fn test_modifier_toggles_once_per_press() {
        let bindings = KeyBindings::default();
        let mut state = KeyState::default();

        assert_eq!(state.press(Key::Shift, &bindings), Some(UiAction::ToggleMetronome));
        assert_eq!(state.press(Key::Shift, &bindings), None);
        // Track keys are blocked while the modifier is down
        assert_eq!(state.press(Key::Char('c'), &bindings), None);

        state.release(Key::Shift, &bindings);
        assert!(!state.is_modifier_held());
        assert_eq!(state.press(Key::Shift, &bindings), Some(UiAction::ToggleMetronome));
    }

    #[test]
    fn test_releasing_other_key_keeps_modifier() {
        let bindings = KeyBindings::default();
        let mut state = KeyState::default();

        state.press(Key::Shift, &bindings);
        state.release(Key::Char('c'), &bindings);
        assert!(state.is_modifier_held());
    }

    #[test]
    fn test_bindings_serde() {
        let bindings = KeyBindings::default();
        let text = ron::to_string(&bindings).unwrap();
        let parsed: KeyBindings = ron::from_str(&text).unwrap();
        assert_eq!(parsed, bindings);
    }
}
