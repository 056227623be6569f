// Mixer - Fixed pool of one-shot sample voices
// Pre-allocated so triggering from the audio callback never allocates.

use std::sync::Arc;

pub const MAX_VOICES: usize = 32;

#[derive(Debug, Clone, Default)]
struct Voice {
    data: Option<Arc<[f32]>>,
    gain: f32,
    start_frame: u64,
    position: usize,
}

impl Voice {
    fn is_free(&self) -> bool {
        self.data.is_none()
    }
}

#[derive(Debug)]
pub struct Mixer {
    voices: Vec<Voice>,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            voices: vec![Voice::default(); MAX_VOICES],
        }
    }

    /// Schedule `data` to start at `start_frame`
    ///
    /// When every voice is busy, the one that started first is stolen.
    pub fn trigger(&mut self, data: Arc<[f32]>, gain: f32, start_frame: u64) {
        if data.is_empty() {
            return;
        }

        let index = match self.voices.iter().position(Voice::is_free) {
            Some(i) => i,
            None => self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.start_frame)
                .map(|(i, _)| i)
                .unwrap_or(0),
        };

        self.voices[index] = Voice {
            data: Some(data),
            gain,
            start_frame,
            position: 0,
        };
    }

    pub fn stop_all(&mut self) {
        for voice in self.voices.iter_mut() {
            voice.data = None;
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_free()).count()
    }

    /// Mono output for one frame
    pub fn next_sample(&mut self, frame: u64) -> f32 {
        let mut sum = 0.0;

        for voice in self.voices.iter_mut() {
            let Some(data) = &voice.data else {
                continue;
            };
            if frame < voice.start_frame {
                continue;
            }

            sum += data[voice.position] * voice.gain;
            voice.position += 1;
            if voice.position >= data.len() {
                voice.data = None;
            }
        }

        soft_clip(flush_denormals_to_zero(sum))
    }
}

#[inline]
fn flush_denormals_to_zero(x: f32) -> f32 {
    if x.abs() < 1e-15 { 0.0 } else { x }
}

/// tanh saturation keeps stacked hits inside [-1, 1]
#[inline]
fn soft_clip(x: f32) -> f32 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(values: &[f32]) -> Arc<[f32]> {
        Arc::from(values.to_vec().into_boxed_slice())
    }

    #[test]
    fn test_silence_without_voices() {
        let mut mixer = Mixer::new();
        assert_eq!(mixer.next_sample(0), 0.0);
    }

    #[test]
    fn test_voice_waits_for_start_frame() {
        let mut mixer = Mixer::new();
        mixer.trigger(buffer(&[0.5, 0.5]), 1.0, 2);

        assert_eq!(mixer.next_sample(0), 0.0);
        assert_eq!(mixer.next_sample(1), 0.0);
        assert!((mixer.next_sample(2) - 0.5f32.tanh()).abs() < 1e-6);
        assert!(mixer.next_sample(3) > 0.0);
        // Finished voices are released
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn test_gain_applied() {
        let mut mixer = Mixer::new();
        mixer.trigger(buffer(&[0.8]), 0.5, 0);
        assert!((mixer.next_sample(0) - 0.4f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_voice_stealing() {
        let mut mixer = Mixer::new();
        for i in 0..MAX_VOICES + 4 {
            mixer.trigger(buffer(&[0.1; 8]), 1.0, i as u64);
        }
        assert_eq!(mixer.active_voices(), MAX_VOICES);

        mixer.stop_all();
        assert_eq!(mixer.active_voices(), 0);
    }
}
