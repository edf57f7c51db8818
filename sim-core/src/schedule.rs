//! Fixed-timestep pacing for the tick and draw loops.
//!
//! The host calls [`TickPacer::advance`] once per frame with the wall time
//! since the previous frame and runs that many steps. A pacer never asks
//! for more than `max_steps` at once; the rest of the backlog is dropped
//! and counted rather than replayed, so a stall never snowballs.

use std::time::Duration;

use crate::error::SimError;

#[derive(Clone, Debug)]
pub struct TickPacer {
    interval: Duration,
    accumulator: Duration,
    max_steps: u32,
    dropped: u64,
}

impl TickPacer {
    /// ### Errors
    /// [`SimError::InvalidParameter`] for a non-positive rate or a zero
    /// step limit.
    pub fn new(rate_hz: f64, max_steps: u32) -> Result<Self, SimError> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(SimError::InvalidParameter {
                name: "rate",
                reason: format!("{rate_hz} Hz must be positive"),
            });
        }
        if max_steps == 0 {
            return Err(SimError::InvalidParameter {
                name: "max_steps",
                reason: "must allow at least one step".to_owned(),
            });
        }
        Ok(Self {
            interval: Duration::from_secs_f64(rate_hz.recip()),
            accumulator: Duration::ZERO,
            max_steps,
            dropped: 0,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn rate(&self) -> f64 {
        self.interval.as_secs_f64().recip()
    }

    /// Changes the rate, keeping the accumulated time.
    pub fn set_rate(&mut self, rate_hz: f64) -> Result<(), SimError> {
        let fresh = Self::new(rate_hz, self.max_steps)?;
        self.interval = fresh.interval;
        Ok(())
    }

    /// Steps due after `elapsed` more wall time, at most `max_steps`.
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;
        let due = (self.accumulator.as_nanos() / self.interval.as_nanos()) as u64;
        let steps = due.min(u64::from(self.max_steps));

        if due > steps {
            let skipped = due - steps;
            self.dropped += skipped;
            log::debug!("pacer dropped {skipped} steps of backlog");
            self.accumulator = Duration::ZERO;
        } else {
            self.accumulator -= self.interval * steps as u32;
        }
        steps as u32
    }

    /// Steps discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
    }
}
