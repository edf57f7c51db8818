//! Per-simulation tick metrics: rolling phase timers, per-tick counters and
//! the recent interaction faults.

use std::{
    collections::VecDeque,
    fmt,
    time::{Duration, Instant},
};

use crate::{error::InteractionError, types::ParticleId};

/// Samples kept by a [`PhaseTimer`].
pub const TIMER_HISTORY: usize = 1000;
/// Faults kept for the host between two [`TickStats::take_faults`] calls.
pub const MAX_RECENT_FAULTS: usize = 64;

/// Rolling window of durations for one phase of the tick.
#[derive(Clone, Debug)]
pub struct PhaseTimer {
    name: &'static str,
    history: VecDeque<Duration>,
    capacity: usize,
    sum: Duration,
}

impl PhaseTimer {
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, TIMER_HISTORY)
    }

    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            history: VecDeque::with_capacity(capacity.min(TIMER_HISTORY)),
            capacity: capacity.max(1),
            sum: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn record(&mut self, elapsed: Duration) {
        if self.history.len() == self.capacity
            && let Some(oldest) = self.history.pop_front()
        {
            self.sum -= oldest;
        }
        self.history.push_back(elapsed);
        self.sum += elapsed;
    }

    /// Records the time elapsed since `started`.
    pub fn record_since(&mut self, started: Instant) {
        self.record(started.elapsed());
    }

    /// Mean over the window, zero before the first sample.
    pub fn average(&self) -> Duration {
        match self.history.len() {
            0 => Duration::ZERO,
            n => self.sum / n as u32,
        }
    }

    pub fn last(&self) -> Option<Duration> {
        self.history.back().copied()
    }
}

/// A pairwise evaluation that failed during the force pass.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionFault {
    pub tick: u64,
    pub a: ParticleId,
    pub b: ParticleId,
    pub error: InteractionError,
}

impl fmt::Display for InteractionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {}: particles {} and {}: {}",
            self.tick, self.a, self.b, self.error
        )
    }
}

/// Counters for the most recent tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickCounters {
    /// Pairs within the cutoff.
    pub pairs: u64,
    /// Pairs that produced a force.
    pub contributions: u64,
    pub moving: usize,
    pub relocated: usize,
    pub faults: usize,
}

#[derive(Debug)]
pub struct TickStats {
    ticks: u64,
    pub last: TickCounters,
    total_faults: u64,
    pub force: PhaseTimer,
    pub integrate: PhaseTimer,
    pub rebucket: PhaseTimer,
    recent_faults: VecDeque<InteractionFault>,
}

impl Default for TickStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TickStats {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            last: TickCounters::default(),
            total_faults: 0,
            force: PhaseTimer::new("force"),
            integrate: PhaseTimer::new("integrate"),
            rebucket: PhaseTimer::new("rebucket"),
            recent_faults: VecDeque::new(),
        }
    }

    /// Starts counting a new tick and returns its number, starting at 1.
    pub fn begin_tick(&mut self) -> u64 {
        self.ticks += 1;
        self.last = TickCounters::default();
        self.ticks
    }

    /// Reports the faults of the tick just finished, once.
    pub fn finish_tick(&mut self) {
        if self.last.faults == 0 {
            return;
        }
        match self.recent_faults.back() {
            Some(latest) => log::warn!(
                "tick {}: {} pairwise interactions abandoned (latest: {latest})",
                self.ticks,
                self.last.faults
            ),
            None => log::warn!(
                "tick {}: {} pairwise interactions abandoned",
                self.ticks,
                self.last.faults
            ),
        }
    }

    pub fn record_fault(&mut self, fault: InteractionFault) {
        self.last.faults += 1;
        self.total_faults += 1;
        if self.recent_faults.len() == MAX_RECENT_FAULTS {
            self.recent_faults.pop_front();
        }
        self.recent_faults.push_back(fault);
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn total_faults(&self) -> u64 {
        self.total_faults
    }

    pub fn latest_fault(&self) -> Option<&InteractionFault> {
        self.recent_faults.back()
    }

    /// Hands the recent faults to the caller, oldest first.
    pub fn take_faults(&mut self) -> Vec<InteractionFault> {
        self.recent_faults.drain(..).collect()
    }

    pub fn timers(&self) -> [&PhaseTimer; 3] {
        [&self.force, &self.integrate, &self.rebucket]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;

    fn fault(tick: u64) -> InteractionFault {
        InteractionFault {
            tick,
            a: 1,
            b: 2,
            error: InteractionError::Distance(EvalError::new("nope")),
        }
    }

    #[test]
    fn timer_window_drops_oldest_samples() {
        let mut t = PhaseTimer::with_capacity("t", 2);
        t.record(Duration::from_millis(10));
        t.record(Duration::from_millis(20));
        t.record(Duration::from_millis(40));

        assert_eq!(t.average(), Duration::from_millis(30));
        assert_eq!(t.last(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn empty_timer_averages_to_zero() {
        let t = PhaseTimer::new("force");
        assert_eq!(t.average(), Duration::ZERO);
        assert_eq!(t.last(), None);
        assert_eq!(t.name(), "force");
    }

    #[test]
    fn begin_tick_resets_counters() {
        let mut stats = TickStats::new();
        assert_eq!(stats.begin_tick(), 1);
        stats.last.pairs = 5;
        stats.record_fault(fault(1));
        stats.finish_tick();

        assert_eq!(stats.begin_tick(), 2);
        assert_eq!(stats.last, TickCounters::default());
        assert_eq!(stats.total_faults(), 1);
    }

    #[test]
    fn recent_faults_are_bounded_and_drained() {
        let mut stats = TickStats::new();
        for tick in 0..(MAX_RECENT_FAULTS as u64 + 10) {
            stats.record_fault(fault(tick));
        }

        assert_eq!(stats.latest_fault().map(|f| f.tick), Some(MAX_RECENT_FAULTS as u64 + 9));
        let taken = stats.take_faults();
        assert_eq!(taken.len(), MAX_RECENT_FAULTS);
        assert_eq!(taken[0].tick, 10);
        assert!(stats.take_faults().is_empty());
        assert_eq!(stats.total_faults(), MAX_RECENT_FAULTS as u64 + 10);
    }

    #[test]
    fn fault_display_names_both_particles() {
        let text = fault(7).to_string();
        assert!(text.contains("tick 7"));
        assert!(text.contains("1 and 2"));
        assert!(text.contains("nope"));
    }
}
