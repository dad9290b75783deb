pub mod buffs;
pub mod clock;
pub mod config;
pub mod persist;
pub mod poison;
pub mod runtime;

// Re-exports for convenience
pub use buffs::{BuffApplyContext, BuffEvent, BuffTimerInstance, BuffTimerService};
pub use clock::{DEFAULT_TICK_PERIOD_SECONDS, ManualClock, TickSource};
pub use config::PoisonConfigRegistry;
pub use persist::{BuffSaveBridge, JsonFileStore, MemoryStore, RestorePoll, SaveStore};
pub use poison::{Health, PoisonController, PoisonEffect};
pub use runtime::BuffRuntime;
