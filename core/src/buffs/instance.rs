//! Active buff instance state.

use runeward_types::{
    BuffDefinition, BuffKind, BuffSourceType, EntityId, INDEFINITE_TICKS,
};

/// Registry key: at most one live instance per (entity, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BuffKey {
    pub entity: EntityId,
    pub kind: BuffKind,
}

impl BuffKey {
    pub fn new(entity: EntityId, kind: BuffKind) -> Self {
        Self { entity, kind }
    }
}

/// A live buff countdown, owned by the registry (never by the entity).
///
/// `remaining_ticks` is always in `[1, interval_ticks]` for recurring
/// buffs, `[1, duration_ticks]` for finite ones, or exactly
/// `INDEFINITE_TICKS` for indefinite ones.
#[derive(Debug, Clone)]
pub struct BuffTimerInstance {
    pub key: BuffKey,

    /// Latest applied definition; replaced wholesale on refresh.
    pub definition: BuffDefinition,

    pub source_type: BuffSourceType,

    /// Origin identifier; defaults to the kind's name when the caller
    /// supplies none.
    pub source_id: String,

    /// Countdown within the current cycle. -1 encodes "indefinite".
    pub remaining_ticks: i64,

    /// Monotonic per registry; orders notifications deterministically
    /// when many instances tick in the same frame.
    pub sequence_id: u64,

    /// Latch so an expiry warning fires at most once per countdown.
    /// Re-armed on timer reset and at the top of each recurring cycle.
    pub(crate) warning_fired: bool,
}

impl BuffTimerInstance {
    pub fn entity(&self) -> EntityId {
        self.key.entity
    }

    pub fn kind(&self) -> BuffKind {
        self.key.kind
    }

    pub fn is_indefinite(&self) -> bool {
        self.remaining_ticks == INDEFINITE_TICKS
    }

    /// Display name with kind fallback.
    pub fn display_name(&self) -> &str {
        self.definition.effective_name()
    }
}
