//! Local delivery countdown
//!
//! The countdown is derived from the client's own clock at the moment the
//! task arrived. The server keeps its own start time and is the only judge
//! of success, so the two may disagree near the deadline.

use shared::GameConfig;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Remaining time dropped to the warning threshold. Fires once per run.
    Warning,
    /// Remaining time reached zero. The timer stops itself afterwards.
    Expired,
}

#[derive(Debug, Clone, Default)]
pub struct TimerState {
    start_time: Option<Instant>,
    time_limit: f32,
    has_warned: bool,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, now: Instant, time_limit: f32) {
        self.start_time = Some(now);
        self.time_limit = time_limit;
        self.has_warned = false;
    }

    pub fn stop(&mut self) {
        self.start_time = None;
    }

    pub fn is_active(&self) -> bool {
        self.start_time.is_some()
    }

    pub fn elapsed(&self, now: Instant) -> f32 {
        self.start_time
            .map(|start| now.saturating_duration_since(start).as_secs_f32())
            .unwrap_or(0.0)
    }

    /// Seconds left, never negative. Zero when the timer is not running.
    pub fn remaining(&self, now: Instant) -> f32 {
        if !self.is_active() {
            return 0.0;
        }
        (self.time_limit - self.elapsed(now)).max(0.0)
    }

    /// Advances the countdown to `now` and reports threshold crossings.
    pub fn update(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if !self.is_active() {
            return events;
        }

        let remaining = self.time_limit - self.elapsed(now);

        if remaining <= GameConfig::TIMER_WARNING_SECONDS && !self.has_warned {
            self.has_warned = true;
            events.push(TimerEvent::Warning);
        }

        if remaining <= 0.0 {
            self.stop();
            events.push(TimerEvent::Expired);
        }

        events
    }
}
