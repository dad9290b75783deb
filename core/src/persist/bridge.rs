//! Per-entity save bridge.
//!
//! The bridge sits between the buff timer service and the save store.
//! While live it mirrors the entity's registry state into a cached
//! snapshot (so a save can succeed even if the service is momentarily
//! unreachable), and after a load it drains a queue of pending restore
//! records. Restoration defers, without dropping records, until the
//! service and any effect-specific component are ready.
//!
//! Absence of the service or the poison component is not an error; it is
//! the expected scene-construction-order transient, handled entirely by
//! re-polling once per tick.

use std::collections::{HashSet, VecDeque};

use runeward_types::{BuffKind, EntityId, PoisonConfig};

use crate::buffs::{BuffApplyContext, BuffEvent, BuffTimerService};
use crate::poison::PoisonController;

use super::records::{BuffSaveFile, BuffSaveRecord, SAVE_FORMAT_VERSION};
use super::store::{SaveStore, StoreError, load_record, save_record};

/// Logical state of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No snapshot taken yet and no pending work.
    Idle,
    /// Mirroring live service state into the cache.
    Capturing,
    /// Draining a queue of pending restore records.
    Restoring,
}

/// Collaborators handed to each restore poll by the composition root.
/// `None` models "not yet constructed".
pub struct RestoreDeps<'a> {
    pub service: Option<&'a mut BuffTimerService>,
    pub poison: Option<&'a mut PoisonController>,
    /// Canonical poison config resolved by the caller; `None` degrades
    /// poison records to timer-and-immunity-only restoration.
    pub poison_config: Option<&'a PoisonConfig>,
}

/// Outcome of one restore poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePoll {
    /// Nothing pending.
    Idle,
    /// Dependencies not ready; queue untouched, poll again next tick.
    Deferred,
    /// Every pending record was restored on this pass.
    Completed,
}

/// Per-entity adapter between the registry and the save store.
#[derive(Debug)]
pub struct BuffSaveBridge {
    entity: EntityId,
    save_key: String,

    /// Kinds persisted elsewhere; never saved or restored here.
    ignored_kinds: HashSet<BuffKind>,

    /// Last known snapshot, maintained from notifications and refreshed
    /// in full on every reachable save.
    cache: Vec<BuffSaveRecord>,

    /// Restore records staged by `load`, drained by `poll_restore`.
    pending: VecDeque<BuffSaveRecord>,

    state: BridgeState,
    enabled: bool,

    /// Missing canonical config is logged once, not on every poll.
    missing_config_logged: bool,
}

impl BuffSaveBridge {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            save_key: format!("buffs/{entity}"),
            ignored_kinds: HashSet::new(),
            cache: Vec::new(),
            pending: VecDeque::new(),
            state: BridgeState::Idle,
            enabled: true,
            missing_config_logged: false,
        }
    }

    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn save_key(&self) -> &str {
        &self.save_key
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cached_snapshot(&self) -> &[BuffSaveRecord] {
        &self.cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Exclude a kind from persistence (saved elsewhere).
    pub fn ignore_kind(&mut self, kind: BuffKind) {
        self.ignored_kinds.insert(kind);
    }

    /// Disabling cancels all pending restores so no retry loop outlives
    /// its target.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            if !self.pending.is_empty() {
                tracing::debug!(
                    entity = %self.entity,
                    dropped = self.pending.len(),
                    "bridge disabled; cancelling pending restores"
                );
            }
            self.pending.clear();
            self.state = BridgeState::Idle;
        }
    }

    /// Mirror a registry notification into the cache. Poison sub-state
    /// in the cache is only refreshed by a full `capture`; event-driven
    /// maintenance keeps the timer fields current.
    pub fn handle_event(&mut self, event: &BuffEvent) {
        if !self.enabled || event.entity() != self.entity {
            return;
        }
        let kind = event.kind();
        if self.ignored_kinds.contains(&kind) {
            return;
        }
        match event {
            BuffEvent::Started(instance)
            | BuffEvent::Updated(instance)
            | BuffEvent::Restored(instance) => {
                let record = BuffSaveRecord::from_instance(instance, None);
                match self.cache.iter_mut().find(|r| r.kind == kind) {
                    Some(existing) => {
                        // Keep previously captured poison sub-state; only
                        // the timer fields are authoritative here.
                        let poison_fields = (
                            existing.poison_current_damage,
                            existing.poison_ticks_since_decay,
                            existing.poison_time_to_next_tick,
                            existing.poison_immunity_timer,
                        );
                        *existing = record;
                        (
                            existing.poison_current_damage,
                            existing.poison_ticks_since_decay,
                            existing.poison_time_to_next_tick,
                            existing.poison_immunity_timer,
                        ) = poison_fields;
                    }
                    None => self.cache.push(record),
                }
                if self.state == BridgeState::Idle {
                    self.state = BridgeState::Capturing;
                }
            }
            BuffEvent::Warning(_) => {}
            BuffEvent::Ended(_, _) => {
                self.cache.retain(|r| r.kind != kind);
            }
        }
    }

    /// Rebuild the cache from a full service snapshot, pulling poison
    /// sub-state from the entity's controller.
    pub fn capture(&mut self, service: &BuffTimerService, poison: Option<&PoisonController>) {
        self.cache = service
            .get_buffs_for(self.entity)
            .into_iter()
            .filter(|i| !self.ignored_kinds.contains(&i.kind()))
            .map(|i| BuffSaveRecord::from_instance(i, poison))
            .collect();
        if self.state == BridgeState::Idle && !self.cache.is_empty() {
            self.state = BridgeState::Capturing;
        }
    }

    /// Persist the entity's buffs. A reachable service yields a fresh
    /// snapshot; an unreachable one falls back to the cache so transient
    /// unavailability never loses data. Nothing to save deletes the
    /// stored record.
    pub fn save(
        &mut self,
        service: Option<&BuffTimerService>,
        poison: Option<&PoisonController>,
        store: &mut dyn SaveStore,
    ) -> Result<(), StoreError> {
        match service {
            Some(service) => self.capture(service, poison),
            None => {
                tracing::warn!(
                    entity = %self.entity,
                    cached = self.cache.len(),
                    "buff service unreachable at save time; using cached snapshot"
                );
            }
        }

        if self.cache.is_empty() {
            store.delete(&self.save_key)
        } else {
            save_record(store, &self.save_key, &BuffSaveFile::new(self.cache.clone()))
        }
    }

    /// Read the persisted record, stage pending restores, and make one
    /// eager restoration attempt. Returns the poll outcome; `Deferred`
    /// means the retry loop (one poll per tick) takes over.
    pub fn load(
        &mut self,
        store: &dyn SaveStore,
        deps: RestoreDeps<'_>,
    ) -> Result<RestorePoll, StoreError> {
        let Some(file) = load_record::<BuffSaveFile>(store, &self.save_key)? else {
            return Ok(RestorePoll::Idle);
        };
        if file.version != SAVE_FORMAT_VERSION {
            tracing::warn!(
                entity = %self.entity,
                version = file.version,
                expected = SAVE_FORMAT_VERSION,
                "buff save record has unexpected version; restoring best-effort"
            );
        }

        self.pending.clear();
        for record in file.buffs {
            if self.ignored_kinds.contains(&record.kind) {
                tracing::warn!(
                    entity = %self.entity,
                    kind = ?record.kind,
                    "skipping persisted buff of ignored kind"
                );
                continue;
            }
            self.pending.push_back(record);
        }

        if self.pending.is_empty() {
            self.state = BridgeState::Idle;
            return Ok(RestorePoll::Idle);
        }
        self.state = BridgeState::Restoring;
        Ok(self.poll_restore(deps))
    }

    /// One cooperative restoration attempt, to be invoked once per tick
    /// while pending records remain.
    ///
    /// Deferral is all-or-nothing: if any pending record needs the poison
    /// component and it is not ready, every record waits, so listeners
    /// never observe a partially restored registry.
    pub fn poll_restore(&mut self, mut deps: RestoreDeps<'_>) -> RestorePoll {
        if !self.enabled {
            self.pending.clear();
            self.state = BridgeState::Idle;
            return RestorePoll::Idle;
        }
        if self.pending.is_empty() {
            if self.state == BridgeState::Restoring {
                self.state = BridgeState::Capturing;
            }
            return RestorePoll::Idle;
        }

        let Some(service) = deps.service else {
            return RestorePoll::Deferred;
        };

        let needs_poison = self.pending.iter().any(|r| r.kind == BuffKind::Poison);
        if needs_poison && !deps.poison.as_deref().is_some_and(PoisonController::is_ready) {
            return RestorePoll::Deferred;
        }

        let mut requeue = VecDeque::new();
        while let Some(record) = self.pending.pop_front() {
            let ctx = BuffApplyContext {
                entity: self.entity,
                definition: record.to_definition(),
                source_type: record.source_type,
                source_id: if record.source_id.is_empty() {
                    None
                } else {
                    Some(record.source_id.clone())
                },
                reset_timer: true,
            };
            service.restore(ctx, record.remaining_ticks);

            if record.kind == BuffKind::Poison {
                match deps.poison.as_deref_mut() {
                    Some(controller) if controller.is_ready() => {
                        match deps.poison_config {
                            Some(config) => {
                                controller.restore_effect(
                                    config,
                                    record.poison_current_damage,
                                    record.poison_ticks_since_decay,
                                    record.poison_time_to_next_tick,
                                );
                            }
                            None => {
                                // Degraded restore: countdown and immunity
                                // only, fine-grained decay state is lost.
                                if !self.missing_config_logged {
                                    tracing::error!(
                                        entity = %self.entity,
                                        "canonical poison config unresolved; \
                                         restoring timer and immunity only"
                                    );
                                    self.missing_config_logged = true;
                                }
                            }
                        }
                        controller.set_immunity(record.poison_immunity_timer);
                        controller.resync();
                    }
                    _ => {
                        // Readiness lapsed mid-pass: keep the record for
                        // the next poll instead of dropping it. Replaying
                        // the registry transplant is harmless.
                        requeue.push_back(record);
                        continue;
                    }
                }
            }
        }

        self.pending = requeue;
        if self.pending.is_empty() {
            tracing::debug!(entity = %self.entity, "buff restore complete");
            self.state = BridgeState::Capturing;
            RestorePoll::Completed
        } else {
            self.state = BridgeState::Restoring;
            RestorePoll::Deferred
        }
    }
}
