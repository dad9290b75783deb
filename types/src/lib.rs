//! Shared buff and effect configuration types for Runeward.
//!
//! These types are the vocabulary shared between the core engine, the
//! persistence layer and any presentation front end: buff kinds and
//! definitions, source categorization, and the poison effect config.

mod buff;
mod poison;

pub use buff::{
    BuffDefinition, BuffKind, BuffSourceType, EndReason, EntityId, ExpiryWarning, INDEFINITE_TICKS,
};
pub use poison::PoisonConfig;
