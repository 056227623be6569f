// Atomic parameters - Lock-free values shared with the audio thread

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe f64 stored as its bit pattern
#[derive(Clone, Debug)]
pub struct AtomicF64 {
    inner: Arc<AtomicU64>,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            inner: Arc::new(AtomicU64::new(value.to_bits())),
        }
    }

    pub fn set(&self, value: f64) {
        self.inner.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::Relaxed))
    }
}

impl Default for AtomicF64 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Frame counter advanced by the audio callback
#[derive(Clone, Debug, Default)]
pub struct FrameCounter {
    inner: Arc<AtomicU64>,
}

impl FrameCounter {
    pub fn get(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }

    pub fn advance(&self, frames: u64) {
        self.inner.fetch_add(frames, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_f64_shared() {
        let a = AtomicF64::new(0.25);
        let b = a.clone();
        b.set(0.75);
        assert_eq!(a.get(), 0.75);
    }

    #[test]
    fn test_frame_counter() {
        let counter = FrameCounter::default();
        let shared = counter.clone();
        shared.advance(512);
        shared.advance(512);
        assert_eq!(counter.get(), 1024);
    }
}
