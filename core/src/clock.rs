//! Tick source abstraction.
//!
//! The engine never owns a timer loop; it consumes discrete tick events
//! from an external fixed-rate clock. `TickSource` is the read-only view
//! presentation code uses to interpolate the first partial window;
//! `ManualClock` converts wall-clock deltas into whole elapsed ticks for
//! the composition root and for deterministic tests.

/// Default tick period, matching the standard game tick.
pub const DEFAULT_TICK_PERIOD_SECONDS: f64 = 0.6;

/// Absorbs float drift when deltas arrive as multiples of the period,
/// so an accumulated `3 * 0.6` still yields three ticks.
const PERIOD_EPSILON: f64 = 1e-9;

/// Read-only view of a fixed-rate tick clock.
pub trait TickSource {
    /// The fixed period between ticks, in seconds.
    fn tick_period_seconds(&self) -> f64;

    /// Seconds until the next tick fires. Used only for presentation
    /// interpolation, never by the countdown logic itself.
    fn time_until_next_tick(&self) -> f64;
}

/// Fixed-period tick accumulator.
///
/// Feed it wall-clock deltas; it hands back the number of whole ticks
/// that elapsed and keeps the fractional remainder for the next call,
/// so no tick is lost across slow frames.
#[derive(Debug, Clone)]
pub struct ManualClock {
    period: f64,
    accumulator: f64,
}

impl ManualClock {
    pub fn new(period_seconds: f64) -> Self {
        let period = if period_seconds.is_finite() && period_seconds > 0.0 {
            period_seconds
        } else {
            DEFAULT_TICK_PERIOD_SECONDS
        };
        Self {
            period,
            accumulator: 0.0,
        }
    }

    /// Advance by `delta_seconds`, returning the number of whole ticks
    /// that elapsed. A delta spanning several periods yields them all.
    pub fn advance(&mut self, delta_seconds: f64) -> u32 {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return 0;
        }
        self.accumulator += delta_seconds;
        let mut ticks = 0u32;
        while self.accumulator + PERIOD_EPSILON >= self.period {
            self.accumulator -= self.period;
            ticks += 1;
        }
        if self.accumulator < 0.0 {
            self.accumulator = 0.0;
        }
        ticks
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD_SECONDS)
    }
}

impl TickSource for ManualClock {
    fn tick_period_seconds(&self) -> f64 {
        self.period
    }

    fn time_until_next_tick(&self) -> f64 {
        (self.period - self.accumulator).clamp(0.0, self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_fractional_deltas() {
        let mut clock = ManualClock::new(0.6);
        assert_eq!(clock.advance(0.3), 0);
        assert_eq!(clock.advance(0.3), 1);
        assert!(clock.time_until_next_tick() > 0.59);
    }

    #[test]
    fn multi_tick_delta_yields_all_ticks() {
        let mut clock = ManualClock::new(0.6);
        assert_eq!(clock.advance(1.9), 3);
        assert!((clock.time_until_next_tick() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn bad_period_falls_back_to_default() {
        let clock = ManualClock::new(0.0);
        assert_eq!(clock.tick_period_seconds(), DEFAULT_TICK_PERIOD_SECONDS);
    }
}
