//! Per-side game clocks.
//!
//! Clocks count up. Elapsed wall-clock time is attributed to whichever side
//! owns the turn, and only while the game is running. Time is always passed
//! in as an [`Instant`] so the driver decides what "now" is.

use std::time::{Duration, Instant};

use crate::domain::Side;

/// Accumulated durations
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct TimerSnapshot {
    pub total: Duration,
    pub white: Duration,
    pub black: Duration,
}

impl TimerSnapshot {
    pub fn of(&self, side: Side) -> Duration {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    fn add(&mut self, side: Side, elapsed: Duration) {
        match side {
            Side::White => self.white += elapsed,
            Side::Black => self.black += elapsed,
        }
        self.total += elapsed;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerState {
    Stopped,
    Running(Side),
    Ended,
}

/// Two clocks gated by turn ownership and game-over
#[derive(Clone, Debug)]
pub struct TimerService {
    state: TimerState,
    snapshot: TimerSnapshot,
    defaults: TimerSnapshot,
    /// Instant up to which time has been attributed
    last_tick: Option<Instant>,
}

impl TimerService {
    pub fn new(defaults: TimerSnapshot) -> Self {
        Self {
            state: TimerState::Stopped,
            snapshot: defaults,
            defaults,
            last_tick: None,
        }
    }

    /// Resume from stored durations, stopped
    pub fn restore(defaults: TimerSnapshot, snapshot: TimerSnapshot) -> Self {
        Self {
            snapshot,
            ..Self::new(defaults)
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshot
    }

    /// Which side is currently accumulating time
    pub fn running_side(&self) -> Option<Side> {
        match self.state {
            TimerState::Running(side) => Some(side),
            _ => None,
        }
    }

    /// Stopped -> Running(side). Ignored in any other state.
    pub fn start(&mut self, side: Side, now: Instant) {
        if self.state == TimerState::Stopped {
            self.state = TimerState::Running(side);
            self.last_tick = Some(now);
        }
    }

    /// Running(x) -> Running(side), settling x's time up to `now` first
    pub fn switch_to(&mut self, side: Side, now: Instant) {
        if let TimerState::Running(current) = self.state {
            self.settle(current, now);
            self.state = TimerState::Running(side);
        }
    }

    /// Running(*) -> Ended
    pub fn end(&mut self, now: Instant) {
        if let TimerState::Running(current) = self.state {
            self.settle(current, now);
            self.state = TimerState::Ended;
            self.last_tick = None;
        }
    }

    /// Back to the configured defaults, stopped
    pub fn reset(&mut self) {
        self.state = TimerState::Stopped;
        self.snapshot = self.defaults;
        self.last_tick = None;
    }

    /// Periodic tick. Only the running side's clock and the total advance.
    pub fn tick(&mut self, now: Instant) {
        if let TimerState::Running(current) = self.state {
            self.settle(current, now);
        }
    }

    fn settle(&mut self, side: Side, now: Instant) {
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return;
        };
        // out-of-order instants attribute nothing
        let elapsed = now.saturating_duration_since(last);
        self.snapshot.add(side, elapsed);
        if now > last {
            self.last_tick = Some(now);
        }
    }
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new(TimerSnapshot::default())
    }
}
