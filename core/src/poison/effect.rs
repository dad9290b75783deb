//! The poison decay state machine.

use runeward_types::PoisonConfig;

/// Absorbs float drift when deltas arrive as multiples of the interval,
/// so an accumulated `3 * 0.6` still yields three hits.
const INTERVAL_EPSILON: f64 = 1e-9;

/// A single in-flight poison process.
///
/// `tick_timer` is the seconds elapsed within the current interval and
/// stays in `[0, tick_interval_seconds)` between calls; `current_damage`
/// is monotonically non-increasing between decay steps.
#[derive(Debug, Clone)]
pub struct PoisonEffect {
    config: PoisonConfig,
    current_damage: i32,
    ticks_since_decay: i32,
    tick_timer: f64,
}

impl PoisonEffect {
    /// (Re)initialize from a config. Always a hard restart: there is no
    /// refresh-without-reset for poison.
    pub fn new(config: PoisonConfig) -> Self {
        let config = config.normalized();
        Self {
            current_damage: config.start_damage_per_tick,
            ticks_since_decay: 0,
            tick_timer: 0.0,
            config,
        }
    }

    /// Accumulate elapsed time, returning the damage of every hit that
    /// fired. A delta spanning several intervals fires them all, stepping
    /// decay between hits exactly as if each interval had elapsed alone.
    pub fn advance(&mut self, delta_seconds: f64) -> Vec<i32> {
        let mut hits = Vec::new();
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return hits;
        }

        let interval = self.config.tick_interval_seconds;
        self.tick_timer += delta_seconds;
        while self.tick_timer + INTERVAL_EPSILON >= interval {
            self.tick_timer -= interval;
            hits.push(self.current_damage);
            self.ticks_since_decay += 1;
            if self.ticks_since_decay >= self.config.hits_per_decay_step {
                self.current_damage =
                    (self.current_damage / self.config.decay_divisor).max(self.config.min_damage);
                self.ticks_since_decay = 0;
            }
        }
        if self.tick_timer < 0.0 {
            self.tick_timer = 0.0;
        }
        hits
    }

    /// Load-time transplant. Does not re-trigger damage application; the
    /// next hit fires when the restored `tick_timer` reaches the interval.
    pub fn restore_state(&mut self, damage: i32, ticks_since_decay: i32, tick_timer: f64) {
        let interval = self.config.tick_interval_seconds;
        self.current_damage = damage.max(0);
        self.ticks_since_decay = ticks_since_decay.clamp(0, self.config.hits_per_decay_step - 1);
        // Clamp guards against stale records whose interval shrank.
        self.tick_timer = if tick_timer.is_finite() {
            tick_timer.clamp(0.0, interval)
        } else {
            0.0
        };
    }

    /// Seconds until the next hit fires; this is what gets persisted.
    pub fn time_to_next_tick(&self) -> f64 {
        let interval = self.config.tick_interval_seconds;
        (interval - self.tick_timer).clamp(0.0, interval)
    }

    pub fn config(&self) -> &PoisonConfig {
        &self.config
    }

    pub fn current_damage(&self) -> i32 {
        self.current_damage
    }

    pub fn ticks_since_decay(&self) -> i32 {
        self.ticks_since_decay
    }

    pub fn tick_timer(&self) -> f64 {
        self.tick_timer
    }
}
