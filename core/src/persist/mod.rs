//! Buff persistence
//!
//! This module provides:
//! - **Records**: the versioned serde shape written to the save store
//! - **Store**: the string-keyed JSON persistence contract plus in-memory
//!   and on-disk implementations
//! - **Bridge**: the per-entity adapter that snapshots live registry
//!   state, writes/reads records, and drives the deferred restore loop

mod bridge;
mod records;
mod store;

pub use bridge::{BuffSaveBridge, RestoreDeps, RestorePoll};
pub use records::{BuffSaveFile, BuffSaveRecord, SAVE_FORMAT_VERSION};
pub use store::{JsonFileStore, MemoryStore, SaveStore, StoreError, load_record, save_record};
