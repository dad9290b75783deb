//! Tests for the buff timer service.
//!
//! Covers registry uniqueness, reset-vs-refresh semantics, the three
//! timer disciplines (finite, recurring, indefinite), warning emission,
//! and notification ordering.

use runeward_types::{
    BuffDefinition, BuffKind, BuffSourceType, EndReason, EntityId, ExpiryWarning, INDEFINITE_TICKS,
};

use super::service::{BuffApplyContext, BuffEvent, BuffTimerService};

const TICK: f64 = 0.6;

fn make_service() -> BuffTimerService {
    BuffTimerService::new(TICK)
}

fn entity(id: u64) -> EntityId {
    EntityId(id)
}

/// Definition with an exact finite tick count.
fn finite(kind: BuffKind, ticks: i64) -> BuffDefinition {
    BuffDefinition::new(kind, ticks as f64 * TICK)
}

/// Definition with an exact recurring interval in ticks.
fn recurring(kind: BuffKind, interval_ticks: i64) -> BuffDefinition {
    BuffDefinition::recurring(kind, interval_ticks as f64 * TICK)
}

fn apply_ctx(id: u64, definition: BuffDefinition) -> BuffApplyContext {
    BuffApplyContext::new(entity(id), definition)
}

fn remaining(service: &BuffTimerService, id: u64, kind: BuffKind) -> i64 {
    service
        .get(entity(id), kind)
        .map(|i| i.remaining_ticks)
        .unwrap_or(i64::MIN)
}

// ─────────────────────────────────────────────────────────────────────────────
// Uniqueness and refresh rules
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_applying_same_key_twice_yields_one_instance() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 10)));
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 10)));

    assert_eq!(service.get_buffs_for(entity(1)).len(), 1);

    let events = service.drain_events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], BuffEvent::Started(_)));
    assert!(matches!(events[1], BuffEvent::Updated(_)));
}

#[test]
fn test_different_kinds_occupy_different_slots() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 10)));
    service.apply(apply_ctx(1, finite(BuffKind::Overload, 10)));
    service.apply(apply_ctx(2, finite(BuffKind::Antifire, 10)));

    assert_eq!(service.get_buffs_for(entity(1)).len(), 2);
    assert_eq!(service.get_buffs_for(entity(2)).len(), 1);
}

#[test]
fn test_reset_restores_full_duration() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 5)));
    service.on_tick();
    service.on_tick();
    assert_eq!(remaining(&service, 1, BuffKind::Antifire), 3);

    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 5)));
    assert_eq!(remaining(&service, 1, BuffKind::Antifire), 5);
}

#[test]
fn test_refresh_preserves_countdown() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 5)));
    service.on_tick();
    service.on_tick();

    service.refresh(apply_ctx(1, finite(BuffKind::Antifire, 5)));
    assert_eq!(remaining(&service, 1, BuffKind::Antifire), 3);
}

#[test]
fn test_refresh_with_changed_recurring_interval_resets() {
    let mut service = make_service();
    service.apply(apply_ctx(1, recurring(BuffKind::Stamina, 6)));
    service.on_tick();
    service.on_tick();
    assert_eq!(remaining(&service, 1, BuffKind::Stamina), 4);

    // A shorter interval mid-flight resets to the new full cycle.
    service.refresh(apply_ctx(1, recurring(BuffKind::Stamina, 3)));
    assert_eq!(remaining(&service, 1, BuffKind::Stamina), 3);
}

#[test]
fn test_refresh_keeps_in_range_recurring_countdown() {
    let mut service = make_service();
    service.apply(apply_ctx(1, recurring(BuffKind::Stamina, 5)));
    service.on_tick();

    service.refresh(apply_ctx(1, recurring(BuffKind::Stamina, 5)));
    assert_eq!(remaining(&service, 1, BuffKind::Stamina), 4);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tick disciplines
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_recurring_cycles_and_never_expires() {
    let mut service = make_service();
    service.apply(apply_ctx(1, recurring(BuffKind::PrayerRenewal, 3)));
    service.drain_events();

    let mut observed = Vec::new();
    for _ in 0..9 {
        service.on_tick();
        observed.push(remaining(&service, 1, BuffKind::PrayerRenewal));
    }
    assert_eq!(observed, vec![2, 1, 3, 2, 1, 3, 2, 1, 3]);

    let ended = service
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, BuffEvent::Ended(_, _)))
        .count();
    assert_eq!(ended, 0, "recurring buffs must never expire");
}

#[test]
fn test_indefinite_is_immune_to_countdown() {
    let mut service = make_service();
    service.apply(apply_ctx(1, BuffDefinition::indefinite(BuffKind::Freeze)));

    for _ in 0..100 {
        service.on_tick();
    }
    assert_eq!(remaining(&service, 1, BuffKind::Freeze), INDEFINITE_TICKS);
    assert_eq!(service.get_buffs_for(entity(1)).len(), 1);
}

#[test]
fn test_finite_expires_exactly_on_final_tick() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Overload, 2)));
    service.drain_events();

    service.on_tick();
    assert!(service.get(entity(1), BuffKind::Overload).is_some());
    assert!(
        !service
            .drain_events()
            .iter()
            .any(|e| matches!(e, BuffEvent::Ended(_, _)))
    );

    service.on_tick();
    assert!(service.get(entity(1), BuffKind::Overload).is_none());
    let events = service.drain_events();
    assert!(matches!(
        events.as_slice(),
        [BuffEvent::Ended(_, EndReason::Expired)]
    ));
}

#[test]
fn test_warning_fires_once_at_threshold() {
    let mut service = make_service();
    let mut def = finite(BuffKind::Antifire, 10);
    def.expiry_warning = Some(ExpiryWarning {
        threshold_ticks: Some(3),
    });
    service.apply(apply_ctx(1, def));
    service.drain_events();

    for _ in 0..10 {
        service.on_tick();
    }
    let warnings: Vec<_> = service
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            BuffEvent::Warning(i) => Some(i.remaining_ticks),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![3]);
}

#[test]
fn test_warning_rearms_each_recurring_cycle() {
    let mut service = make_service();
    let mut def = recurring(BuffKind::Stamina, 4);
    def.expiry_warning = Some(ExpiryWarning {
        threshold_ticks: Some(2),
    });
    service.apply(apply_ctx(1, def));
    service.drain_events();

    for _ in 0..8 {
        service.on_tick();
    }
    let warnings = service
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, BuffEvent::Warning(_)))
        .count();
    assert_eq!(warnings, 2, "one warning per cycle");
}

// ─────────────────────────────────────────────────────────────────────────────
// Removal and notification ordering
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_remove_absent_key_is_noop() {
    let mut service = make_service();
    service.remove(entity(1), BuffKind::Venom);
    assert!(service.drain_events().is_empty());
}

#[test]
fn test_remove_emits_manual_end() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Venom, 10)));
    service.drain_events();

    service.remove(entity(1), BuffKind::Venom);
    let events = service.drain_events();
    assert!(matches!(
        events.as_slice(),
        [BuffEvent::Ended(_, EndReason::Manual)]
    ));
}

#[test]
fn test_clear_drops_everything_silently() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 10)));
    service.apply(apply_ctx(2, recurring(BuffKind::Stamina, 5)));
    service.drain_events();

    service.clear();
    assert!(service.is_empty());
    assert!(service.drain_events().is_empty(), "teardown emits no events");
}

#[test]
fn test_tick_events_follow_sequence_order() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Antifire, 2)));
    service.apply(apply_ctx(1, finite(BuffKind::Overload, 2)));
    service.apply(apply_ctx(2, finite(BuffKind::Antifire, 2)));
    service.drain_events();

    service.on_tick();
    service.on_tick();
    let sequence_ids: Vec<u64> = service
        .drain_events()
        .iter()
        .map(|e| e.instance().sequence_id)
        .collect();
    let mut sorted = sequence_ids.clone();
    sorted.sort_unstable();
    assert_eq!(sequence_ids, sorted, "events must be in sequence_id order");
    assert_eq!(sequence_ids.len(), 3);
}

#[test]
fn test_consumer_reacting_to_started_can_remove_same_key() {
    // Single-threaded reentrancy by design: a listener seeing Started may
    // immediately call remove; the Ended lands in the next drain.
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::Poison, 10)));

    for event in service.drain_events() {
        if let BuffEvent::Started(instance) = event {
            service.remove(instance.entity(), instance.kind());
        }
    }

    let events = service.drain_events();
    assert!(matches!(
        events.as_slice(),
        [BuffEvent::Ended(_, EndReason::Manual)]
    ));
    assert!(service.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Restore path
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_restore_emits_restored_not_started() {
    let mut service = make_service();
    service.restore(apply_ctx(1, recurring(BuffKind::Stamina, 5)), 2);

    assert_eq!(remaining(&service, 1, BuffKind::Stamina), 2);
    let events = service.drain_events();
    assert!(matches!(events.as_slice(), [BuffEvent::Restored(_)]));
}

#[test]
fn test_restore_clamps_out_of_range_countdown() {
    let mut service = make_service();
    service.restore(apply_ctx(1, recurring(BuffKind::Stamina, 5)), 99);
    assert_eq!(remaining(&service, 1, BuffKind::Stamina), 5);

    service.restore(apply_ctx(1, finite(BuffKind::Antifire, 8)), 0);
    assert_eq!(remaining(&service, 1, BuffKind::Antifire), 1);
}

#[test]
fn test_restore_indefinite_stays_indefinite() {
    let mut service = make_service();
    service.restore(apply_ctx(1, BuffDefinition::indefinite(BuffKind::Freeze)), 7);
    assert_eq!(remaining(&service, 1, BuffKind::Freeze), INDEFINITE_TICKS);
}

#[test]
fn test_source_id_defaults_to_kind_name() {
    let mut service = make_service();
    service.apply(apply_ctx(1, finite(BuffKind::PrayerRenewal, 4)));
    let instance = service.get(entity(1), BuffKind::PrayerRenewal).unwrap();
    assert_eq!(instance.source_id, "Prayer Renewal");

    let ctx = apply_ctx(2, finite(BuffKind::Antifire, 4))
        .with_source(BuffSourceType::Potion, "antifire_potion");
    service.apply(ctx);
    let instance = service.get(entity(2), BuffKind::Antifire).unwrap();
    assert_eq!(instance.source_id, "antifire_potion");
    assert_eq!(instance.source_type, BuffSourceType::Potion);
}
