//! Poison effect configuration.
//!
//! Loaded from TOML assets by the core config registry. The damage curve
//! is stepped, not continuous: damage stays flat for `hits_per_decay_step`
//! consecutive hits, then steps down by `decay_divisor`, floor-clamped to
//! `min_damage`.

use serde::{Deserialize, Serialize};

/// Configuration for the poison damage-over-time effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoisonConfig {
    /// Unique identifier for this config asset (e.g., "poison_standard").
    pub id: String,

    /// Seconds between damage applications.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: f64,

    /// Damage dealt per hit when the effect is first applied.
    #[serde(default = "default_start_damage")]
    pub start_damage_per_tick: i32,

    /// Hits dealt at the current damage level before a decay step.
    #[serde(default = "default_hits_per_decay_step")]
    pub hits_per_decay_step: i32,

    /// Divisor applied at each decay step (2 = halving).
    #[serde(default = "default_decay_divisor")]
    pub decay_divisor: i32,

    /// Floor the per-hit damage never decays below.
    #[serde(default = "default_min_damage")]
    pub min_damage: i32,
}

impl PoisonConfig {
    /// Clamp malformed numeric input to safe minimums.
    pub fn normalized(mut self) -> Self {
        if !self.tick_interval_seconds.is_finite() || self.tick_interval_seconds <= 0.0 {
            self.tick_interval_seconds = default_tick_interval();
        }
        self.start_damage_per_tick = self.start_damage_per_tick.max(0);
        self.hits_per_decay_step = self.hits_per_decay_step.max(1);
        self.decay_divisor = self.decay_divisor.max(1);
        self.min_damage = self.min_damage.max(0);
        self
    }
}

impl Default for PoisonConfig {
    fn default() -> Self {
        Self {
            id: "poison_standard".to_string(),
            tick_interval_seconds: default_tick_interval(),
            start_damage_per_tick: default_start_damage(),
            hits_per_decay_step: default_hits_per_decay_step(),
            decay_divisor: default_decay_divisor(),
            min_damage: default_min_damage(),
        }
    }
}

fn default_tick_interval() -> f64 {
    0.6
}

fn default_start_damage() -> i32 {
    4
}

fn default_hits_per_decay_step() -> i32 {
    4
}

fn default_decay_divisor() -> i32 {
    2
}

fn default_min_damage() -> i32 {
    1
}
