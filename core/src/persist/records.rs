//! Save record shapes.
//!
//! These structs define the exact contract written to the persistence
//! store; every field carries a serde default so records from older (or
//! newer) builds stay readable. Poison fields are zero/empty when the
//! record's kind is not Poison.

use serde::{Deserialize, Serialize};

use runeward_types::{BuffDefinition, BuffKind, BuffSourceType};

use crate::buffs::BuffTimerInstance;
use crate::poison::PoisonController;

/// Bumped when the record shape changes incompatibly.
pub const SAVE_FORMAT_VERSION: u32 = 1;

/// One persisted buff instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffSaveRecord {
    pub kind: BuffKind,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub icon_id: Option<String>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub recurring_interval_seconds: f64,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub source_type: BuffSourceType,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub remaining_ticks: i64,

    // Poison sub-state; zero/empty for every other kind.
    #[serde(default)]
    pub poison_current_damage: i32,
    #[serde(default)]
    pub poison_ticks_since_decay: i32,
    #[serde(default)]
    pub poison_time_to_next_tick: f64,
    #[serde(default)]
    pub poison_immunity_timer: f64,
}

impl BuffSaveRecord {
    /// Snapshot a live instance, pulling poison sub-state from the
    /// entity's controller when the instance is the poison slot.
    pub fn from_instance(instance: &BuffTimerInstance, poison: Option<&PoisonController>) -> Self {
        let mut record = Self {
            kind: instance.kind(),
            display_name: instance.definition.display_name.clone(),
            icon_id: instance.definition.icon_id.clone(),
            duration_seconds: instance.definition.duration_seconds,
            recurring_interval_seconds: instance.definition.recurring_interval_seconds,
            is_recurring: instance.definition.is_recurring,
            source_type: instance.source_type,
            source_id: instance.source_id.clone(),
            remaining_ticks: instance.remaining_ticks,
            poison_current_damage: 0,
            poison_ticks_since_decay: 0,
            poison_time_to_next_tick: 0.0,
            poison_immunity_timer: 0.0,
        };
        if instance.kind() == BuffKind::Poison {
            if let Some(controller) = poison {
                if let Some(effect) = controller.effect() {
                    record.poison_current_damage = effect.current_damage();
                    record.poison_ticks_since_decay = effect.ticks_since_decay();
                    record.poison_time_to_next_tick = effect.time_to_next_tick();
                }
                record.poison_immunity_timer = controller.immunity_seconds();
            }
        }
        record
    }

    /// Rebuild the definition for the restore path. The expiry warning
    /// is not part of the persisted shape and comes back unset.
    pub fn to_definition(&self) -> BuffDefinition {
        BuffDefinition {
            kind: self.kind,
            display_name: self.display_name.clone(),
            icon_id: self.icon_id.clone(),
            duration_seconds: self.duration_seconds,
            recurring_interval_seconds: self.recurring_interval_seconds,
            is_recurring: self.is_recurring,
            expiry_warning: None,
        }
    }
}

/// Per-entity save file: version tag plus the instance records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuffSaveFile {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub buffs: Vec<BuffSaveRecord>,
}

impl BuffSaveFile {
    pub fn new(buffs: Vec<BuffSaveRecord>) -> Self {
        Self {
            version: SAVE_FORMAT_VERSION,
            buffs,
        }
    }
}

fn default_version() -> u32 {
    SAVE_FORMAT_VERSION
}
