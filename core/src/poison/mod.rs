//! Poison damage-over-time effect
//!
//! This module provides:
//! - **Effect**: the continuously-decaying damage state machine with its
//!   own sub-tick timer
//! - **Controller**: the per-entity owning component that gates
//!   application behind the immunity window and applies hits to health
//!
//! The effect's damage curve is stepped, not continuous: damage stays
//! flat for `hits_per_decay_step` consecutive hits, then steps down by
//! the configured divisor, floor-clamped.

mod controller;
mod effect;

pub use controller::{Health, PoisonController};
pub use effect::PoisonEffect;
