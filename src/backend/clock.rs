//! Wall-clock playback position
//!
//! The rodio backend has no decoder position it can report, so it
//! approximates elapsed time from the wall clock: time since `start()` minus
//! time spent paused. Output latency and buffer underruns are not accounted
//! for, so the value can run ahead of what is audible by the device buffer
//! plus any stall. Treat it as approximate.

use std::time::{Duration, Instant};

/// Pause-aware stopwatch
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    started: Option<Instant>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from zero
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        self.started = Some(now);
        self.paused_at = None;
        self.paused_total = Duration::ZERO;
    }

    pub fn pause(&mut self) {
        self.pause_at(Instant::now());
    }

    pub fn pause_at(&mut self, now: Instant) {
        if self.started.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    pub fn resume(&mut self) {
        self.resume_at(Instant::now());
    }

    pub fn resume_at(&mut self, now: Instant) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_total += now.saturating_duration_since(paused_at);
        }
    }

    /// Forget everything; elapsed reads zero until the next start
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some() && self.paused_at.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        let Some(started) = self.started else {
            return Duration::ZERO;
        };
        let end = self.paused_at.unwrap_or(now);
        end.saturating_duration_since(started)
            .saturating_sub(self.paused_total)
    }
}
