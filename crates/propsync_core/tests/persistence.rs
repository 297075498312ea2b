//! Persistence tests against real and failing backends.

use propsync_codec::{Node, Opaque, Payload, Value};
use propsync_core::{CoreError, HydrationOutcome, PersistOptions, ScopeConfig, SyncContext};
use propsync_storage::{InMemoryBackend, StorageBackend};
use propsync_testkit::{
    init_tracing, scenarios, FailingBackend, RecordingBackend, TempFileBackend,
};
use std::sync::Arc;

fn value_context() -> SyncContext {
    SyncContext::builder()
        .name("Value")
        .initializer(|_| Payload::new().with("value", 0))
        .build()
}

#[test]
fn file_backend_survives_remount() {
    init_tracing();
    let storage = TempFileBackend::new();
    let ctx = value_context();

    {
        let scope = ctx
            .provider()
            .mount(ScopeConfig::new().persist(PersistOptions::new("value", storage.backend())));
        scope.evaluate(&Payload::new().with("value", 42).with("label", "saved"));
    }

    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("value", storage.backend())));
    let state = scope.store().get_state();
    assert_eq!(state.get("value"), Some(&Value::Integer(42)));
    assert_eq!(state.get("label"), Some(&Value::from("saved")));
}

#[test]
fn every_merge_is_written() {
    let backend = Arc::new(RecordingBackend::new());
    let ctx = scenarios::doubling_context();
    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("doubler", backend.clone())));

    scope.evaluate(&Payload::new().with("base", 2));
    scope.evaluate(&Payload::new().with("base", 2));

    // one direct and one derived merge, nothing for the skipped cycle
    assert_eq!(backend.write_count(), 2);
    let envelope = backend.last_envelope("doubler").unwrap();
    assert_eq!(envelope.state.get("doubled"), Some(&Value::Integer(4)));
    assert_eq!(envelope.version, 0);
}

#[test]
fn process_local_values_are_not_written() {
    let backend = Arc::new(RecordingBackend::new());
    let ctx = value_context();
    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("value", backend.clone())));

    scope.evaluate(
        &Payload::new()
            .with("value", 1)
            .with("children", Node::element("div"))
            .with("on_change", Opaque::new(())),
    );

    let envelope = backend.last_envelope("value").unwrap();
    assert_eq!(envelope.state, Payload::new().with("value", 1));
    assert!(scope.store().get_state().contains_key("children"));
}

#[test]
fn failing_backend_keeps_scope_usable() {
    init_tracing();
    let backend = Arc::new(FailingBackend::new());
    let ctx = value_context();
    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("value", backend.clone())));

    let persist = scope.persist().unwrap();
    assert!(!persist.has_hydrated());
    assert_eq!(scope.store().get_state().get("value"), Some(&Value::Integer(0)));

    assert!(scope.evaluate(&Payload::new().with("value", 5)).direct_merged);
    assert_eq!(scope.store().get_state().get("value"), Some(&Value::Integer(5)));
    // one failed read at mount, one failed write for the merge
    assert_eq!(backend.attempts(), 2);

    assert!(matches!(persist.clear_storage(), Err(CoreError::Storage(_))));
}

#[test]
fn props_win_over_restored_fields_at_mount() {
    let backend = Arc::new(RecordingBackend::with_envelope(
        "value",
        Payload::new().with("value", 99).with("label", "stale"),
        0,
    ));
    let ctx = value_context();
    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("value", backend)));

    scope.evaluate(&Payload::new().with("label", "fresh"));

    let state = scope.store().get_state();
    assert_eq!(state.get("value"), Some(&Value::Integer(99)));
    assert_eq!(state.get("label"), Some(&Value::from("fresh")));
}

#[test]
fn deferred_hydration_from_another_thread() {
    let backend = Arc::new(RecordingBackend::with_envelope(
        "value",
        Payload::new().with("value", 7),
        0,
    ));
    let ctx = value_context();
    let scope = ctx.provider().mount(
        ScopeConfig::new()
            .persist(PersistOptions::new("value", backend.clone()).skip_hydration(true)),
    );
    assert_eq!(backend.read_count(), 0);

    let persist = scope.persist().unwrap();
    let outcome = std::thread::spawn(move || persist.rehydrate()).join().unwrap();

    assert_eq!(outcome, HydrationOutcome::Restored);
    assert_eq!(scope.store().get_state().get("value"), Some(&Value::Integer(7)));
    assert_eq!(backend.read_count(), 1);
}

#[test]
fn migration_through_scope_config() {
    let backend = Arc::new(RecordingBackend::with_envelope(
        "value",
        Payload::new().with("amount", 3),
        1,
    ));
    let options = PersistOptions::new("value", backend.clone())
        .version(2)
        .migrate(|mut state, from| {
            if from != 1 {
                return Err(CoreError::migration(from, 2, "unknown version"));
            }
            let amount = state.remove("amount").unwrap_or(Value::Integer(0));
            Ok(state.with("value", amount))
        });

    let ctx = value_context();
    let scope = ctx.provider().mount(ScopeConfig::new().persist(options));

    assert_eq!(scope.store().get_state().get("value"), Some(&Value::Integer(3)));
    let written = backend.last_envelope("value").unwrap();
    assert_eq!(written.version, 2);
    assert_eq!(written.state, Payload::new().with("value", 3));
}

#[test]
fn clear_storage_then_remount_starts_fresh() {
    let storage = TempFileBackend::new();
    let ctx = value_context();
    let options = || PersistOptions::new("value", storage.backend());

    {
        let scope = ctx.provider().mount(ScopeConfig::new().persist(options()));
        scope.evaluate(&Payload::new().with("value", 11));
        scope.persist().unwrap().clear_storage().unwrap();
    }
    assert_eq!(storage.get_item("value").unwrap(), None);

    let scope = ctx.provider().mount(ScopeConfig::new().persist(options()));
    assert_eq!(scope.store().get_state().get("value"), Some(&Value::Integer(0)));
}

#[test]
fn deeply_nested_envelope_falls_back_to_initial_state() {
    init_tracing();
    let mut corrupt = vec![0x81; 500_000];
    corrupt.push(0x00);
    let backend = Arc::new(InMemoryBackend::with_item("value", corrupt));
    let ctx = value_context();

    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("value", backend)));

    assert_eq!(scope.store().get_state().get("value"), Some(&Value::Integer(0)));
    let persist = scope.persist().unwrap();
    assert!(!persist.has_hydrated());
    assert!(matches!(persist.rehydrate(), HydrationOutcome::Failed(_)));
}
