//! Buff timer registry
//!
//! This module provides:
//! - **Instances**: runtime state of active buffs, keyed by (entity, kind)
//! - **Service**: the registry that applies refresh/reset rules and drives
//!   countdowns on each external clock tick
//! - **Events**: ordered lifecycle notifications drained by the caller
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │              BuffDefinition (value template)               │
//! │   "Poison, recurring every 18s, warn 5 ticks from expiry"  │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                    BuffTimerService::apply
//!                              │
//!                              ▼
//! ┌────────────────────────────────────────────────────────────┐
//! │            BuffTimerInstance (runtime countdown)           │
//! │   "entity 7 has Poison, 12 of 30 ticks remaining"          │
//! └────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!            drained BuffEvents → HUD / save bridge / controllers
//! ```

mod instance;
mod service;

#[cfg(test)]
mod service_tests;

pub use instance::{BuffKey, BuffTimerInstance};
pub use service::{BuffApplyContext, BuffEvent, BuffTimerService, DEFAULT_WARNING_TICKS};
