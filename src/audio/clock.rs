// StepClock - Sample-counting loop clock
//
// One loop is one 4/4 measure split into `division` steps. The clock is
// polled from the audio callback with a horizon a little ahead of the
// current frame so the engine can schedule samples exactly on the boundary.

use crate::audio::backend::Tick;

const BEATS_PER_LOOP: f64 = 4.0;

#[derive(Debug, Clone)]
pub struct StepClock {
    sample_rate: f64,
    bpm: u32,
    division: usize,
    running: bool,
    /// Frame at which the loop first reaches step 0
    started_at: f64,
    /// Frame of the most recent step 0 boundary handed out
    loop_start: f64,
    next_tick: f64,
    next_step: usize,
}

impl StepClock {
    pub fn new(sample_rate: f64, bpm: u32, division: usize) -> Self {
        Self {
            sample_rate,
            bpm: bpm.max(1),
            division: division.max(1),
            running: false,
            started_at: 0.0,
            loop_start: 0.0,
            next_tick: 0.0,
            next_step: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn loop_frames(&self) -> f64 {
        self.sample_rate * 60.0 / self.bpm as f64 * BEATS_PER_LOOP
    }

    pub fn step_frames(&self) -> f64 {
        self.loop_frames() / self.division as f64
    }

    /// Start at step 0, `delay_frames` after `now`
    pub fn start(&mut self, now: u64, delay_frames: u64) {
        let first = (now + delay_frames) as f64;
        self.running = true;
        self.started_at = first;
        self.loop_start = first;
        self.next_tick = first;
        self.next_step = 0;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Change tempo without moving the next boundary
    pub fn set_bpm(&mut self, bpm: u32) {
        if bpm == 0 {
            return;
        }
        self.bpm = bpm;
        self.loop_start = self.next_tick - self.next_step as f64 * self.step_frames();
    }

    /// Change division; the next boundary becomes step 0
    pub fn set_division(&mut self, division: usize) {
        if division == 0 {
            return;
        }
        self.division = division;
        self.next_step = 0;
        self.loop_start = self.next_tick;
    }

    /// Hand out every boundary before `horizon`
    pub fn poll(&mut self, horizon: u64, mut on_tick: impl FnMut(Tick)) {
        if !self.running {
            return;
        }

        let step_frames = self.step_frames();
        while self.next_tick < horizon as f64 {
            if self.next_step == 0 {
                self.loop_start = self.next_tick;
            }
            on_tick(Tick {
                time: self.next_tick / self.sample_rate,
                step: self.next_step,
            });

            self.next_tick += step_frames;
            self.next_step = (self.next_step + 1) % self.division;
        }
    }

    /// Fraction of the loop played at frame `now`, in `[0, 1)`
    pub fn progress(&self, now: u64) -> f64 {
        let now = now as f64;
        if !self.running || now < self.started_at {
            return 0.0;
        }
        ((now - self.loop_start) / self.loop_frames()).rem_euclid(1.0)
    }
}
