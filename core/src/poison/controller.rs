//! Per-entity poison controller.
//!
//! Owns the optional `PoisonEffect` and the orthogonal immunity window,
//! applies hits to the entity's health, and reports readiness to the
//! save bridge (enabled + live target). The immunity countdown runs
//! independently of the damage sub-timer and survives cure.

use runeward_types::{EntityId, PoisonConfig};

use crate::buffs::BuffEvent;

use super::PoisonEffect;

/// Minimal health component for the poison target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub current: i32,
    pub max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        let max = max.max(0);
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    pub fn apply_damage(&mut self, amount: i32) {
        self.current = (self.current - amount.max(0)).max(0);
    }
}

/// The component that owns an entity's poison state.
#[derive(Debug)]
pub struct PoisonController {
    entity: EntityId,
    effect: Option<PoisonEffect>,

    /// Seconds during which poison cannot be (re)applied. Ticks down
    /// independently of the damage sub-timer.
    immunity_seconds: f64,

    enabled: bool,
    target: Option<Health>,

    /// Cached countdown for HUD display, refreshed by `resync`.
    hud_time_to_next_tick: f64,
}

impl PoisonController {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            effect: None,
            immunity_seconds: 0.0,
            enabled: true,
            target: None,
            hud_time_to_next_tick: 0.0,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_target(&mut self, target: Health) {
        self.target = Some(target);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn target(&self) -> Option<&Health> {
        self.target.as_ref()
    }

    pub fn has_live_target(&self) -> bool {
        self.target.is_some_and(|h| h.is_alive())
    }

    /// Readiness gate used by the save bridge before restoring.
    pub fn is_ready(&self) -> bool {
        self.enabled && self.has_live_target()
    }

    pub fn is_immune(&self) -> bool {
        self.immunity_seconds > 0.0
    }

    pub fn immunity_seconds(&self) -> f64 {
        self.immunity_seconds
    }

    pub fn set_immunity(&mut self, seconds: f64) {
        self.immunity_seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_some()
    }

    pub fn effect(&self) -> Option<&PoisonEffect> {
        self.effect.as_ref()
    }

    /// Start (or hard-restart) the poison process. Refused while the
    /// immunity window is open.
    pub fn try_apply(&mut self, config: &PoisonConfig) -> bool {
        if self.is_immune() {
            tracing::debug!(
                entity = %self.entity,
                remaining = self.immunity_seconds,
                "poison apply refused by immunity window"
            );
            return false;
        }
        self.effect = Some(PoisonEffect::new(config.clone()));
        self.resync();
        true
    }

    /// Remove the effect. Immunity is untouched.
    pub fn cure(&mut self) {
        self.effect = None;
        self.hud_time_to_next_tick = 0.0;
    }

    /// Load-time transplant: rebuild the effect from persisted fields.
    /// `time_to_next_tick` is what was saved; the sub-timer is re-derived
    /// as `interval - remaining`, clamped against stale configs.
    pub fn restore_effect(
        &mut self,
        config: &PoisonConfig,
        damage: i32,
        ticks_since_decay: i32,
        time_to_next_tick: f64,
    ) {
        let mut effect = PoisonEffect::new(config.clone());
        let interval = effect.config().tick_interval_seconds;
        let remaining = if time_to_next_tick.is_finite() {
            time_to_next_tick.clamp(0.0, interval)
        } else {
            interval
        };
        effect.restore_state(damage, ticks_since_decay, interval - remaining);
        self.effect = Some(effect);
        self.resync();
    }

    /// Advance both the immunity window and, when active with a live
    /// target, the damage process.
    pub fn advance(&mut self, delta_seconds: f64) {
        if !delta_seconds.is_finite() || delta_seconds <= 0.0 {
            return;
        }
        self.immunity_seconds = (self.immunity_seconds - delta_seconds).max(0.0);

        let Some(effect) = self.effect.as_mut() else {
            return;
        };
        let Some(target) = self.target.as_mut() else {
            return;
        };
        if !target.is_alive() {
            return;
        }
        for hit in effect.advance(delta_seconds) {
            target.apply_damage(hit);
        }
        self.hud_time_to_next_tick = effect.time_to_next_tick();
    }

    /// Recompute derived display state after an out-of-band mutation
    /// (apply, restore).
    pub fn resync(&mut self) {
        self.hud_time_to_next_tick = self
            .effect
            .as_ref()
            .map(|e| e.time_to_next_tick())
            .unwrap_or(0.0);
    }

    pub fn hud_time_to_next_tick(&self) -> f64 {
        self.hud_time_to_next_tick
    }

    /// React to registry notifications for this entity's poison slot:
    /// the effect is cured when its buff instance ends for any reason.
    pub fn handle_event(&mut self, event: &BuffEvent) {
        if event.entity() != self.entity || event.kind() != runeward_types::BuffKind::Poison {
            return;
        }
        if let BuffEvent::Ended(_, _) = event {
            self.cure();
        }
    }
}

#[cfg(test)]
mod tests {
    use runeward_types::{BuffDefinition, BuffKind, EndReason};

    use crate::buffs::{BuffApplyContext, BuffTimerService};

    use super::*;

    fn make_controller() -> PoisonController {
        let mut controller = PoisonController::new(EntityId(7));
        controller.set_target(Health::new(100));
        controller
    }

    #[test]
    fn test_immunity_refuses_apply_until_elapsed() {
        let mut controller = make_controller();
        controller.set_immunity(1.0);

        assert!(!controller.try_apply(&PoisonConfig::default()));
        assert!(!controller.is_active());

        controller.advance(1.5);
        assert!(!controller.is_immune());
        assert!(controller.try_apply(&PoisonConfig::default()));
        assert!(controller.is_active());
    }

    #[test]
    fn test_advance_applies_hits_to_health() {
        let mut controller = make_controller();
        controller.try_apply(&PoisonConfig::default());

        // Two full intervals: two hits of 4.
        controller.advance(1.2);
        assert_eq!(controller.target().unwrap().current, 92);
    }

    #[test]
    fn test_cure_keeps_immunity() {
        let mut controller = make_controller();
        controller.try_apply(&PoisonConfig::default());
        controller.set_immunity(30.0);
        controller.cure();

        assert!(!controller.is_active());
        assert!(controller.is_immune());
    }

    #[test]
    fn test_readiness_requires_enabled_and_live_target() {
        let mut controller = make_controller();
        assert!(controller.is_ready());

        controller.set_enabled(false);
        assert!(!controller.is_ready());

        controller.set_enabled(true);
        controller.set_target(Health { current: 0, max: 100 });
        assert!(!controller.is_ready());

        controller.clear_target();
        assert!(!controller.is_ready());
    }

    #[test]
    fn test_ended_event_cures_effect() {
        let mut controller = make_controller();
        controller.try_apply(&PoisonConfig::default());

        let mut service = BuffTimerService::new(0.6);
        service.apply(BuffApplyContext::new(
            EntityId(7),
            BuffDefinition::new(BuffKind::Poison, 1.2),
        ));
        service.drain_events();
        service.remove(EntityId(7), BuffKind::Poison);

        for event in service.drain_events() {
            controller.handle_event(&event);
            if let crate::buffs::BuffEvent::Ended(_, reason) = event {
                assert_eq!(reason, EndReason::Manual);
            }
        }
        assert!(!controller.is_active());
    }

    #[test]
    fn test_events_for_other_entities_are_ignored() {
        let mut controller = make_controller();
        controller.try_apply(&PoisonConfig::default());

        let mut service = BuffTimerService::new(0.6);
        service.apply(BuffApplyContext::new(
            EntityId(99),
            BuffDefinition::new(BuffKind::Poison, 1.2),
        ));
        service.remove(EntityId(99), BuffKind::Poison);

        for event in service.drain_events() {
            controller.handle_event(&event);
        }
        assert!(controller.is_active());
    }
}
