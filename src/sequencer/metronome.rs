// Metronome - Click track aligned to quarter subdivisions of the loop

use std::f32::consts::PI;

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickType {
    /// First step of the loop (high click)
    Accent,
    /// Other quarter boundaries (low click)
    Regular,
}

/// On/off switch plus the click schedule
#[derive(Debug, Clone, Default)]
pub struct Metronome {
    enabled: bool,
}

impl Metronome {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Flip the switch, returning the new state
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// Click due at `step`, if the metronome is on
    pub fn click_at(&self, step: usize, division: usize) -> Option<ClickType> {
        if self.enabled {
            click_for_step(step, division)
        } else {
            None
        }
    }
}

/// Click schedule for one loop pass
///
/// Step 0 carries the accent. The other clicks fall on `division / 4 * n`
/// for n = 1..3, and only when that boundary lands exactly on a step.
pub fn click_for_step(step: usize, division: usize) -> Option<ClickType> {
    if division == 0 || step >= division {
        return None;
    }
    if step == 0 {
        return Some(ClickType::Accent);
    }
    if (step * 4) % division == 0 {
        Some(ClickType::Regular)
    } else {
        None
    }
}

/// Pre-rendered click sounds for backends that mix audio themselves
#[derive(Debug, Clone)]
pub struct MetronomeSound {
    accent_samples: Vec<f32>,
    regular_samples: Vec<f32>,
}

impl MetronomeSound {
    /// Duration of click in milliseconds
    const CLICK_DURATION_MS: f32 = 30.0;

    /// C5 for the accent, C4 for the other beats
    const ACCENT_FREQUENCY: f32 = 523.25;
    const REGULAR_FREQUENCY: f32 = 261.63;

    const AMPLITUDE: f32 = 0.8;

    pub fn new(sample_rate: f32) -> Self {
        let click_samples = ((Self::CLICK_DURATION_MS / 1000.0) * sample_rate) as usize;

        Self {
            accent_samples: Self::generate_click(
                sample_rate,
                click_samples,
                Self::ACCENT_FREQUENCY,
                Self::AMPLITUDE,
            ),
            regular_samples: Self::generate_click(
                sample_rate,
                click_samples,
                Self::REGULAR_FREQUENCY,
                Self::AMPLITUDE,
            ),
        }
    }

    /// Sine burst with a fast exponential decay
    fn generate_click(
        sample_rate: f32,
        num_samples: usize,
        frequency: f32,
        amplitude: f32,
    ) -> Vec<f32> {
        let phase_increment = 2.0 * PI * frequency / sample_rate;

        (0..num_samples)
            .map(|i| {
                let t = i as f32 / num_samples as f32;
                let envelope = (-t * 8.0).exp();
                (i as f32 * phase_increment).sin() * envelope * amplitude
            })
            .collect()
    }

    pub fn get_click(&self, click_type: ClickType) -> &[f32] {
        match click_type {
            ClickType::Accent => &self.accent_samples,
            ClickType::Regular => &self.regular_samples,
        }
    }

    pub fn click_duration(&self) -> usize {
        self.accent_samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clicks_per_pass_division_16() {
        let metronome = Metronome::new(true);
        let clicks: Vec<(usize, ClickType)> = (0..16)
            .filter_map(|step| metronome.click_at(step, 16).map(|c| (step, c)))
            .collect();

        assert_eq!(
            clicks,
            vec![
                (0, ClickType::Accent),
                (4, ClickType::Regular),
                (8, ClickType::Regular),
                (12, ClickType::Regular),
            ]
        );
    }

    #[test]
    fn test_disabled_metronome_is_silent() {
        let metronome = Metronome::default();
        assert!(!metronome.is_enabled());
        assert!((0..16).all(|step| metronome.click_at(step, 16).is_none()));
    }

    #[test]
    fn test_toggle() {
        let mut metronome = Metronome::default();
        assert!(metronome.toggle());
        assert!(metronome.is_enabled());
        assert!(!metronome.toggle());
    }

    #[test]
    fn test_division_not_multiple_of_four() {
        // 6 / 4 = 1.5: only 0 and 3 (= 6 / 4 * 2) are whole steps
        let clicks: Vec<usize> = (0..6).filter(|&s| click_for_step(s, 6).is_some()).collect();
        assert_eq!(clicks, vec![0, 3]);

        let clicks: Vec<usize> = (0..10).filter(|&s| click_for_step(s, 10).is_some()).collect();
        assert_eq!(clicks, vec![0, 5]);
    }

    #[test]
    fn test_out_of_range_step() {
        assert_eq!(click_for_step(16, 16), None);
        assert_eq!(click_for_step(0, 0), None);
    }

    #[test]
    fn test_metronome_sound_generation() {
        let sound = MetronomeSound::new(48000.0);

        let accent = sound.get_click(ClickType::Accent);
        let regular = sound.get_click(ClickType::Regular);

        assert_eq!(accent.len(), regular.len());
        // 30ms at 48kHz
        assert_eq!(sound.click_duration(), 1440);
        assert!(accent.iter().all(|s| s.abs() <= 0.8));
        assert!(accent.iter().any(|s| s.abs() > 0.1));
    }
}
