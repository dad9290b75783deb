//! Composition root wiring the clock, registry, poison controllers, and
//! save bridges together.
//!
//! ```text
//!   wall-clock delta
//!         │
//!         ▼
//!   ManualClock ──whole ticks──▶ BuffTimerService ──events──▶ dispatch
//!         │                                                      │
//!         ▼                                              ┌───────┴───────┐
//!   PoisonController.advance                             ▼               ▼
//!   (sub-tick damage process)                    PoisonController   BuffSaveBridge
//! ```
//!
//! The runtime owns one controller and one bridge per registered entity
//! and is the only place that drains the service's event queue, so every
//! listener observes the same deterministic order.

use hashbrown::HashMap;

use runeward_types::{BuffDefinition, BuffKind, EntityId};

use crate::buffs::{BuffApplyContext, BuffTimerService};
use crate::clock::{DEFAULT_TICK_PERIOD_SECONDS, ManualClock, TickSource};
use crate::config::PoisonConfigRegistry;
use crate::persist::{BuffSaveBridge, RestoreDeps, RestorePoll, SaveStore, StoreError};
use crate::poison::{Health, PoisonController};

/// Owns the per-scene effect machinery.
pub struct BuffRuntime {
    clock: ManualClock,
    service: BuffTimerService,
    configs: PoisonConfigRegistry,
    store: Box<dyn SaveStore>,

    poison: HashMap<EntityId, PoisonController>,
    bridges: HashMap<EntityId, BuffSaveBridge>,
}

impl BuffRuntime {
    pub fn new(configs: PoisonConfigRegistry, store: Box<dyn SaveStore>) -> Self {
        Self::with_tick_period(DEFAULT_TICK_PERIOD_SECONDS, configs, store)
    }

    pub fn with_tick_period(
        period_seconds: f64,
        configs: PoisonConfigRegistry,
        store: Box<dyn SaveStore>,
    ) -> Self {
        Self {
            clock: ManualClock::new(period_seconds),
            service: BuffTimerService::new(period_seconds),
            configs,
            store,
            poison: HashMap::new(),
            bridges: HashMap::new(),
        }
    }

    pub fn service(&self) -> &BuffTimerService {
        &self.service
    }

    pub fn configs(&self) -> &PoisonConfigRegistry {
        &self.configs
    }

    pub fn clock(&self) -> &dyn TickSource {
        &self.clock
    }

    pub fn poison_controller(&self, entity: EntityId) -> Option<&PoisonController> {
        self.poison.get(&entity)
    }

    pub fn bridge(&self, entity: EntityId) -> Option<&BuffSaveBridge> {
        self.bridges.get(&entity)
    }

    /// Register an entity, creating its poison controller and save
    /// bridge. Re-registering replaces both.
    pub fn register_entity(&mut self, entity: EntityId, health: Health) {
        let mut controller = PoisonController::new(entity);
        controller.set_target(health);
        self.poison.insert(entity, controller);
        self.bridges.insert(entity, BuffSaveBridge::new(entity));
    }

    /// Tear down an entity, saving its buffs first. A failed save is
    /// logged; teardown proceeds regardless.
    pub fn unregister_entity(&mut self, entity: EntityId) {
        if let Err(err) = self.save_entity(entity) {
            tracing::error!(%entity, error = %err, "failed to save buffs at teardown");
        }
        self.poison.remove(&entity);
        self.bridges.remove(&entity);
        let kinds: Vec<BuffKind> = self
            .service
            .get_buffs_for(entity)
            .iter()
            .map(|i| i.kind())
            .collect();
        for kind in kinds {
            self.service.remove(entity, kind);
        }
        self.dispatch_events();
    }

    /// Enable or disable an entity's effect processing. Disabling also
    /// cancels any in-flight restore for it.
    pub fn set_entity_enabled(&mut self, entity: EntityId, enabled: bool) {
        if let Some(controller) = self.poison.get_mut(&entity) {
            controller.set_enabled(enabled);
        }
        if let Some(bridge) = self.bridges.get_mut(&entity) {
            bridge.set_enabled(enabled);
        }
    }

    /// Apply a non-poison buff and dispatch the resulting notifications.
    pub fn apply(&mut self, ctx: BuffApplyContext) {
        self.service.apply(ctx);
        self.dispatch_events();
    }

    /// Apply a poison buff: the controller gates on the immunity window,
    /// and only an accepted application touches the registry. Returns
    /// whether the poison took hold.
    pub fn apply_poison(
        &mut self,
        entity: EntityId,
        definition: BuffDefinition,
        profile_id: &str,
    ) -> bool {
        let config = self.configs.canonical(profile_id).clone();
        let Some(controller) = self.poison.get_mut(&entity) else {
            tracing::warn!(%entity, "poison applied to unregistered entity");
            return false;
        };
        if !controller.try_apply(&config) {
            return false;
        }
        self.service.apply(
            BuffApplyContext::new(entity, definition)
                .with_source(runeward_types::BuffSourceType::Combat, config.id.clone()),
        );
        self.dispatch_events();
        true
    }

    /// Remove a buff; consumers learn about it through the `Ended`
    /// notification (the poison controller cures itself from it).
    pub fn remove(&mut self, entity: EntityId, kind: BuffKind) {
        self.service.remove(entity, kind);
        self.dispatch_events();
    }

    pub fn grant_poison_immunity(&mut self, entity: EntityId, seconds: f64) {
        if let Some(controller) = self.poison.get_mut(&entity) {
            controller.set_immunity(seconds);
        }
    }

    /// Advance the whole runtime by a wall-clock delta. Poison damage
    /// runs on its own sub-timer; the registry countdown only moves on
    /// whole clock ticks.
    pub fn advance(&mut self, delta_seconds: f64) {
        for controller in self.poison.values_mut() {
            controller.advance(delta_seconds);
        }

        let ticks = self.clock.advance(delta_seconds);
        for _ in 0..ticks {
            self.service.on_tick();
            self.dispatch_events();
            self.poll_bridges();
        }
    }

    /// Persist one entity's buffs.
    pub fn save_entity(&mut self, entity: EntityId) -> Result<(), StoreError> {
        let Some(bridge) = self.bridges.get_mut(&entity) else {
            return Ok(());
        };
        bridge.save(
            Some(&self.service),
            self.poison.get(&entity),
            &mut *self.store,
        )
    }

    /// Persist every registered entity, reporting the first failure
    /// after attempting all of them.
    pub fn save_all(&mut self) -> Result<(), StoreError> {
        let mut first_err = None;
        let entities: Vec<EntityId> = self.bridges.keys().copied().collect();
        for entity in entities {
            if let Err(err) = self.save_entity(entity) {
                tracing::error!(%entity, error = %err, "buff save failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Load one entity's buffs and attempt restoration. A `Deferred`
    /// outcome is retried automatically once per tick.
    pub fn load_entity(&mut self, entity: EntityId) -> Result<RestorePoll, StoreError> {
        let Some(bridge) = self.bridges.get_mut(&entity) else {
            return Ok(RestorePoll::Idle);
        };
        let outcome = bridge.load(
            &*self.store,
            RestoreDeps {
                service: Some(&mut self.service),
                poison: self.poison.get_mut(&entity),
                poison_config: Some(self.configs.default_config()),
            },
        )?;
        self.dispatch_events();
        Ok(outcome)
    }

    pub fn load_all(&mut self) -> Result<(), StoreError> {
        let entities: Vec<EntityId> = self.bridges.keys().copied().collect();
        for entity in entities {
            self.load_entity(entity)?;
        }
        Ok(())
    }

    /// Drain the registry's notification queue and route each event to
    /// the owning entity's controller and bridge.
    fn dispatch_events(&mut self) {
        let events = self.service.drain_events();
        for event in &events {
            if let Some(controller) = self.poison.get_mut(&event.entity()) {
                controller.handle_event(event);
            }
            if let Some(bridge) = self.bridges.get_mut(&event.entity()) {
                bridge.handle_event(event);
            }
        }
    }

    /// One restore poll per pending bridge per tick.
    fn poll_bridges(&mut self) {
        let pending: Vec<EntityId> = self
            .bridges
            .iter()
            .filter(|(_, b)| b.pending_len() > 0)
            .map(|(entity, _)| *entity)
            .collect();
        for entity in pending {
            let Some(bridge) = self.bridges.get_mut(&entity) else {
                continue;
            };
            bridge.poll_restore(RestoreDeps {
                service: Some(&mut self.service),
                poison: self.poison.get_mut(&entity),
                poison_config: Some(self.configs.default_config()),
            });
        }
        self.dispatch_events();
    }
}

#[cfg(test)]
mod tests {
    use runeward_types::{BuffDefinition, BuffKind, EntityId};

    use crate::persist::MemoryStore;

    use super::*;

    const TICK: f64 = 0.6;
    const PLAYER: EntityId = EntityId(1);

    fn make_runtime() -> BuffRuntime {
        let mut runtime = BuffRuntime::with_tick_period(
            TICK,
            PoisonConfigRegistry::new(),
            Box::new(MemoryStore::new()),
        );
        runtime.register_entity(PLAYER, Health::new(100));
        runtime
    }

    fn poison_buff() -> BuffDefinition {
        BuffDefinition::recurring(BuffKind::Poison, 30.0 * TICK)
    }

    #[test]
    fn test_poison_damages_health_while_buff_counts_down() {
        let mut runtime = make_runtime();
        assert!(runtime.apply_poison(PLAYER, poison_buff(), "poison_standard"));

        // Three tick periods: three hits of 4.
        runtime.advance(3.0 * TICK);
        let controller = runtime.poison_controller(PLAYER).unwrap();
        assert_eq!(controller.target().unwrap().current, 88);

        let instance = runtime.service().get(PLAYER, BuffKind::Poison).unwrap();
        assert_eq!(instance.remaining_ticks, 27);
    }

    #[test]
    fn test_immunity_blocks_poison_application() {
        let mut runtime = make_runtime();
        runtime.grant_poison_immunity(PLAYER, 60.0);

        assert!(!runtime.apply_poison(PLAYER, poison_buff(), "poison_standard"));
        assert!(runtime.service().get(PLAYER, BuffKind::Poison).is_none());
        assert_eq!(
            runtime.poison_controller(PLAYER).unwrap().target().unwrap().current,
            100
        );
    }

    #[test]
    fn test_buff_expiry_cures_the_poison_effect() {
        let mut runtime = make_runtime();
        assert!(runtime.apply_poison(
            PLAYER,
            BuffDefinition::new(BuffKind::Poison, 2.0 * TICK),
            "poison_standard",
        ));
        assert!(runtime.poison_controller(PLAYER).unwrap().is_active());

        runtime.advance(2.0 * TICK);
        assert!(runtime.service().get(PLAYER, BuffKind::Poison).is_none());
        assert!(!runtime.poison_controller(PLAYER).unwrap().is_active());
    }

    #[test]
    fn test_save_load_round_trip_through_runtime() {
        let mut runtime = make_runtime();
        runtime.apply(BuffApplyContext::new(
            PLAYER,
            BuffDefinition::new(BuffKind::Antifire, 10.0 * TICK),
        ));
        runtime.advance(4.0 * TICK);
        runtime.save_entity(PLAYER).unwrap();

        // Wipe live state, as a scene reload would.
        runtime.remove(PLAYER, BuffKind::Antifire);
        assert!(runtime.service().is_empty());

        let outcome = runtime.load_entity(PLAYER).unwrap();
        assert_eq!(outcome, RestorePoll::Completed);
        let instance = runtime.service().get(PLAYER, BuffKind::Antifire).unwrap();
        assert_eq!(instance.remaining_ticks, 6);
    }

    #[test]
    fn test_deferred_restore_retries_until_entity_is_ready() {
        let mut runtime = make_runtime();
        assert!(runtime.apply_poison(PLAYER, poison_buff(), "poison_standard"));
        runtime.save_entity(PLAYER).unwrap();

        // Reload with the controller not yet ready.
        runtime.remove(PLAYER, BuffKind::Poison);
        runtime.register_entity(PLAYER, Health::new(100));
        if let Some(controller) = runtime.poison.get_mut(&PLAYER) {
            controller.set_enabled(false);
        }

        assert_eq!(runtime.load_entity(PLAYER).unwrap(), RestorePoll::Deferred);
        runtime.advance(3.0 * TICK);
        assert!(runtime.service().is_empty(), "still waiting on readiness");
        assert_eq!(runtime.bridge(PLAYER).unwrap().pending_len(), 1);

        // Readiness arrives; the next tick's poll restores everything.
        if let Some(controller) = runtime.poison.get_mut(&PLAYER) {
            controller.set_enabled(true);
        }
        runtime.advance(TICK);
        assert!(runtime.service().get(PLAYER, BuffKind::Poison).is_some());
        assert!(runtime.poison_controller(PLAYER).unwrap().is_active());
        assert_eq!(runtime.bridge(PLAYER).unwrap().pending_len(), 0);
    }

    #[test]
    fn test_unregister_saves_then_removes_buffs() {
        let mut runtime = make_runtime();
        runtime.apply(BuffApplyContext::new(
            PLAYER,
            BuffDefinition::new(BuffKind::Antifire, 10.0 * TICK),
        ));
        runtime.unregister_entity(PLAYER);
        assert!(runtime.service().is_empty());
        assert!(runtime.bridge(PLAYER).is_none());

        // The teardown save is what a later load restores from.
        runtime.register_entity(PLAYER, Health::new(100));
        assert_eq!(runtime.load_entity(PLAYER).unwrap(), RestorePoll::Completed);
        assert!(runtime.service().get(PLAYER, BuffKind::Antifire).is_some());
    }

    #[test]
    fn test_disabling_entity_cancels_pending_restore() {
        let mut runtime = make_runtime();
        assert!(runtime.apply_poison(PLAYER, poison_buff(), "poison_standard"));
        runtime.save_entity(PLAYER).unwrap();

        runtime.remove(PLAYER, BuffKind::Poison);
        runtime.register_entity(PLAYER, Health::new(100));
        runtime.set_entity_enabled(PLAYER, false);

        assert_eq!(runtime.load_entity(PLAYER).unwrap(), RestorePoll::Idle);
        runtime.advance(5.0 * TICK);
        assert!(runtime.service().is_empty());
    }
}
