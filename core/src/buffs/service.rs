//! Buff timer service: the registry that owns all active buff instances.
//!
//! All mutation happens synchronously on the caller's thread, either from
//! `apply`/`remove`/`restore` calls or from the clock-tick callback.
//! Lifecycle notifications are queued in ascending `sequence_id` order and
//! drained by the composition root, which makes replay deterministic and
//! keeps same-key reentrancy (a consumer reacting to `Started` by calling
//! `remove`) well-defined: the resulting `Ended` lands in the same queue.

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use runeward_types::{
    BuffDefinition, BuffKind, BuffSourceType, EndReason, EntityId, INDEFINITE_TICKS,
};

use crate::clock::DEFAULT_TICK_PERIOD_SECONDS;

use super::{BuffKey, BuffTimerInstance};

/// Warning threshold used when `expiry_warning` has no explicit tick count.
pub const DEFAULT_WARNING_TICKS: i64 = 5;

/// Context for an apply/refresh/restore call.
#[derive(Debug, Clone)]
pub struct BuffApplyContext {
    pub entity: EntityId,
    pub definition: BuffDefinition,
    pub source_type: BuffSourceType,
    /// Origin identifier; `None` falls back to the kind's name.
    pub source_id: Option<String>,
    /// When updating an existing instance, `true` recomputes the full
    /// countdown; `false` preserves the current one.
    pub reset_timer: bool,
}

impl BuffApplyContext {
    pub fn new(entity: EntityId, definition: BuffDefinition) -> Self {
        Self {
            entity,
            definition,
            source_type: BuffSourceType::default(),
            source_id: None,
            reset_timer: true,
        }
    }

    pub fn with_source(mut self, source_type: BuffSourceType, source_id: impl Into<String>) -> Self {
        self.source_type = source_type;
        self.source_id = Some(source_id.into());
        self
    }

    pub fn refresh_only(mut self) -> Self {
        self.reset_timer = false;
        self
    }
}

/// Lifecycle notification, carrying a snapshot of the instance at the
/// moment the event was produced.
#[derive(Debug, Clone)]
pub enum BuffEvent {
    /// A new instance entered the registry.
    Started(BuffTimerInstance),
    /// An existing instance was mutated (refresh, reset, recurring cycle).
    Updated(BuffTimerInstance),
    /// Countdown crossed the configured warning threshold.
    Warning(BuffTimerInstance),
    /// The instance left the registry.
    Ended(BuffTimerInstance, EndReason),
    /// Load-time transplant; distinct from `Started` so persistence
    /// listeners don't double-count the application.
    Restored(BuffTimerInstance),
}

impl BuffEvent {
    pub fn instance(&self) -> &BuffTimerInstance {
        match self {
            Self::Started(i)
            | Self::Updated(i)
            | Self::Warning(i)
            | Self::Ended(i, _)
            | Self::Restored(i) => i,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.instance().entity()
    }

    pub fn kind(&self) -> BuffKind {
        self.instance().kind()
    }
}

/// The buff registry.
#[derive(Debug)]
pub struct BuffTimerService {
    tick_period_seconds: f64,

    /// All live instances, keyed by (entity, kind).
    instances: HashMap<BuffKey, BuffTimerInstance>,

    /// Monotonic counter for deterministic notification ordering.
    next_sequence_id: u64,

    /// Pending notifications, in the order they were produced.
    events: Vec<BuffEvent>,
}

impl BuffTimerService {
    pub fn new(tick_period_seconds: f64) -> Self {
        let period = if tick_period_seconds.is_finite() && tick_period_seconds > 0.0 {
            tick_period_seconds
        } else {
            DEFAULT_TICK_PERIOD_SECONDS
        };
        Self {
            tick_period_seconds: period,
            instances: HashMap::new(),
            next_sequence_id: 0,
            events: Vec::new(),
        }
    }

    pub fn tick_period_seconds(&self) -> f64 {
        self.tick_period_seconds
    }

    /// Apply a buff: create the instance if the key is free, otherwise
    /// update the existing one under the reset/refresh rules.
    pub fn apply(&mut self, ctx: BuffApplyContext) -> &BuffTimerInstance {
        self.apply_inner(ctx, None)
    }

    /// Convenience for `apply` with `reset_timer = false`.
    pub fn refresh(&mut self, ctx: BuffApplyContext) -> &BuffTimerInstance {
        self.apply_inner(ctx.refresh_only(), None)
    }

    /// Load-time transplant: identical to `apply` but with an explicit
    /// remaining-tick count, and a `Restored` notification instead of the
    /// regular `Started`/`Updated` side effects.
    pub fn restore(&mut self, ctx: BuffApplyContext, remaining_ticks: i64) -> &BuffTimerInstance {
        self.apply_inner(ctx, Some(remaining_ticks))
    }

    fn apply_inner(
        &mut self,
        ctx: BuffApplyContext,
        restore_ticks: Option<i64>,
    ) -> &BuffTimerInstance {
        let period = self.tick_period_seconds;
        let definition = ctx.definition.normalized();
        let key = BuffKey::new(ctx.entity, definition.kind);
        let source_id = ctx
            .source_id
            .unwrap_or_else(|| definition.kind.name().to_string());

        let mut created = false;
        let instance = match self.instances.entry(key) {
            Entry::Occupied(entry) => {
                let instance = entry.into_mut();
                let old_interval = instance.definition.interval_ticks(period);
                instance.definition = definition;
                instance.source_type = ctx.source_type;
                instance.source_id = source_id;

                if restore_ticks.is_none() {
                    if ctx.reset_timer {
                        instance.remaining_ticks = full_countdown(&instance.definition, period);
                        instance.warning_fired = false;
                    } else if instance.definition.is_recurring {
                        let interval = instance.definition.interval_ticks(period);
                        if interval != old_interval {
                            // Interval changed mid-flight: safer to treat
                            // as a full reset than to stretch the cycle.
                            instance.remaining_ticks = interval;
                            instance.warning_fired = false;
                        } else if instance.remaining_ticks < 1
                            || instance.remaining_ticks > interval
                        {
                            instance.remaining_ticks = instance.remaining_ticks.clamp(1, interval);
                        }
                    }
                }
                instance
            }
            Entry::Vacant(entry) => {
                created = true;
                let sequence_id = self.next_sequence_id;
                self.next_sequence_id += 1;
                entry.insert(BuffTimerInstance {
                    key,
                    remaining_ticks: full_countdown(&definition, period),
                    definition,
                    source_type: ctx.source_type,
                    source_id,
                    sequence_id,
                    warning_fired: false,
                })
            }
        };

        if let Some(ticks) = restore_ticks {
            instance.remaining_ticks = clamp_restored(&instance.definition, period, ticks);
            instance.warning_fired = false;
        }

        let snapshot = instance.clone();
        let event = match (restore_ticks.is_some(), created) {
            (true, _) => BuffEvent::Restored(snapshot),
            (false, true) => BuffEvent::Started(snapshot),
            (false, false) => BuffEvent::Updated(snapshot),
        };
        self.events.push(event);

        instance
    }

    /// Delete the instance if present. Absent keys are a no-op, not an
    /// error.
    pub fn remove(&mut self, entity: EntityId, kind: BuffKind) {
        let key = BuffKey::new(entity, kind);
        if let Some(instance) = self.instances.remove(&key) {
            self.events.push(BuffEvent::Ended(instance, EndReason::Manual));
        }
    }

    /// Snapshot read of an entity's active buffs, ascending sequence order.
    pub fn get_buffs_for(&self, entity: EntityId) -> Vec<&BuffTimerInstance> {
        let mut buffs: Vec<&BuffTimerInstance> = self
            .instances
            .values()
            .filter(|i| i.entity() == entity)
            .collect();
        buffs.sort_unstable_by_key(|i| i.sequence_id);
        buffs
    }

    pub fn get(&self, entity: EntityId, kind: BuffKind) -> Option<&BuffTimerInstance> {
        self.instances.get(&BuffKey::new(entity, kind))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Drop every instance without emitting notifications. Used by scene
    /// teardown before a load-time rebuild.
    pub fn clear(&mut self) {
        self.instances.clear();
    }

    /// Advance every live instance by one clock tick.
    ///
    /// Instances are visited in ascending `sequence_id` order so the
    /// produced notifications are deterministic within the tick.
    pub fn on_tick(&mut self) {
        let period = self.tick_period_seconds;

        let mut order: Vec<(u64, BuffKey)> = self
            .instances
            .iter()
            .map(|(key, instance)| (instance.sequence_id, *key))
            .collect();
        order.sort_unstable();

        for (_, key) in order {
            let Some(instance) = self.instances.get_mut(&key) else {
                continue;
            };
            if instance.remaining_ticks == INDEFINITE_TICKS {
                continue;
            }

            instance.remaining_ticks -= 1;

            if let Some(threshold) = warning_threshold(instance) {
                if !instance.warning_fired
                    && instance.remaining_ticks == threshold
                    && instance.remaining_ticks > 0
                {
                    instance.warning_fired = true;
                    self.events.push(BuffEvent::Warning(instance.clone()));
                }
            }

            if instance.remaining_ticks <= 0 {
                if instance.definition.is_recurring {
                    // Top of a new cycle: the buff does not end.
                    instance.remaining_ticks = instance.definition.interval_ticks(period);
                    instance.warning_fired = false;
                    self.events.push(BuffEvent::Updated(instance.clone()));
                } else if let Some(instance) = self.instances.remove(&key) {
                    self.events.push(BuffEvent::Ended(instance, EndReason::Expired));
                }
            }
        }
    }

    /// Take all pending notifications, in production order.
    pub fn drain_events(&mut self) -> Vec<BuffEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn has_pending_events(&self) -> bool {
        !self.events.is_empty()
    }
}

impl Default for BuffTimerService {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_PERIOD_SECONDS)
    }
}

/// Full countdown for a fresh or reset instance.
fn full_countdown(definition: &BuffDefinition, period: f64) -> i64 {
    if definition.is_recurring {
        definition.interval_ticks(period)
    } else {
        definition.duration_ticks(period)
    }
}

/// Clamp a transplanted countdown back into the instance's legal range.
/// Guards against stale records whose definition shrank since the save.
fn clamp_restored(definition: &BuffDefinition, period: f64, ticks: i64) -> i64 {
    let full = full_countdown(definition, period);
    if full == INDEFINITE_TICKS {
        return INDEFINITE_TICKS;
    }
    ticks.clamp(1, full)
}

fn warning_threshold(instance: &BuffTimerInstance) -> Option<i64> {
    instance
        .definition
        .expiry_warning
        .map(|w| w.threshold_ticks.unwrap_or(DEFAULT_WARNING_TICKS))
}
