//! Engine lifecycle: shared limits, two-phase collection, fatal
//! poisoning and recovery, interrupt and continuation cancellation,
//! statistics and profiling.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use marten_engine::{Engine, EngineError, FatalKind};
use marten_host::TypeDescriptor;
use marten_value::{AccessError, ScriptValue};

struct Payload;

fn payload_descriptor() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Payload>("Payload")
        .getter("alive", |_| Ok(ScriptValue::Boolean(true)))
        .build()
}

#[test]
fn test_limits_propagate_across_sharing_engines() {
    let a = Engine::new("a");
    let b = Engine::builder()
        .name("b")
        .runtime(a.runtime().clone())
        .build();

    a.set_heap_limit(1 << 20);
    assert_eq!(b.heap_info().limit, 1 << 20);

    b.set_stack_depth(32);
    assert_eq!(a.runtime().stack_depth(), 32);
}

#[test]
fn test_weak_reclaim_requires_script_then_host_pass() {
    let engine = Engine::new("gc");
    let payload = Arc::new(Payload);
    let weak = Arc::downgrade(&payload);
    engine
        .add_host_object("thing", payload, payload_descriptor())
        .unwrap();
    assert_eq!(engine.evaluate("thing.alive").unwrap(), ScriptValue::Boolean(true));

    // Still referenced from script state: a full collection keeps it.
    engine.collect_garbage(true);
    assert!(weak.upgrade().is_some());

    engine.remove_global("thing");

    // Script pass alone: the host still pins the proxy.
    engine.collect_garbage(false);
    assert!(weak.upgrade().is_some());

    // Script pass followed by host sweep reclaims it.
    let report = engine.collect_garbage(true);
    assert_eq!(report.released, 1);
    assert!(weak.upgrade().is_none());
}

#[test]
fn test_dispose_releases_pinned_proxies() {
    let engine = Engine::new("short-lived");
    let payload = Arc::new(Payload);
    let weak = Arc::downgrade(&payload);
    engine
        .add_host_object("thing", payload, payload_descriptor())
        .unwrap();

    engine.dispose();
    assert!(engine.is_disposed());
    assert!(matches!(engine.evaluate("1"), Err(EngineError::Disposed)));
    // The backend global may survive until the backend drops with the
    // engine, but the host-side pin is gone.
    drop(engine);
    assert!(weak.upgrade().is_none());
}

fn heap_hungry_engine() -> Engine {
    let engine = Engine::new("hungry");
    engine.runtime().set_heap_sampling_interval(1);
    engine.set_heap_limit(4096);
    engine
}

const HEAP_HOG: &str = "let i = 0; \
    while (i < 100000) { let s = 'xxxxxxxxxxxxxxxx' + i; i = i + 1; }";

#[test]
fn test_heap_limit_fatal_poisons_until_limit_raised() {
    let engine = heap_hungry_engine();
    let err = engine.evaluate(HEAP_HOG).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Fatal(FatalKind::HeapLimitExceeded)
    ));

    // Poisoned: even trivial work is refused while still over the limit.
    assert!(matches!(
        engine.evaluate("1"),
        Err(EngineError::Fatal(FatalKind::HeapLimitExceeded))
    ));

    engine.set_heap_limit(1 << 30);
    assert_eq!(engine.evaluate("1").unwrap(), ScriptValue::Int32(1));
}

#[test]
fn test_successful_collection_clears_poisoning() {
    let engine = heap_hungry_engine();
    assert!(engine.evaluate(HEAP_HOG).is_err());
    assert!(engine.evaluate("1").is_err());

    // Collection re-baselines usage to what survives; the engine recovers
    // without touching the limit.
    engine.collect_garbage(true);
    assert_eq!(engine.evaluate("1").unwrap(), ScriptValue::Int32(1));
}

#[test]
fn test_stack_overflow_is_fatal_without_payload() {
    let engine = Engine::new("deep");
    engine.set_stack_depth(16);
    let err = engine
        .evaluate("function f(n) { return f(n + 1); } f(0)")
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Fatal(FatalKind::StackLimitExceeded)
    ));
    assert!(err.exception().is_none());
    // Stack exhaustion does not leave the engine over any heap limit.
    assert_eq!(engine.evaluate("1").unwrap(), ScriptValue::Int32(1));
}

#[test]
fn test_interrupt_from_another_thread() {
    let engine = Arc::new(Engine::new("busy"));
    let handle = engine.interrupt_handle();
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        handle.interrupt();
    });

    let err = engine
        .evaluate("let i = 0; while (true) { i = i + 1; }")
        .unwrap_err();
    trigger.join().unwrap();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(engine.stats().interrupts, 1);

    // A consumed interrupt does not stick.
    assert_eq!(engine.evaluate("1").unwrap(), ScriptValue::Int32(1));
}

#[test]
fn test_continuation_callback_cancels_cooperatively() {
    let engine = Engine::new("polled");
    let polls = Arc::new(AtomicU64::new(0));
    let seen = polls.clone();
    engine.set_continuation_callback(Some(Arc::new(move || {
        seen.fetch_add(1, Ordering::Relaxed) < 100
    })));

    let err = engine
        .evaluate("let i = 0; while (true) { i = i + 1; }")
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(polls.load(Ordering::Relaxed) >= 100);

    engine.set_continuation_callback(None);
    assert_eq!(engine.evaluate("1").unwrap(), ScriptValue::Int32(1));
}

fn exported_spin(engine: &Engine) -> marten_value::ScriptFunction {
    engine
        .evaluate("function spin(n) { let i = 0; while (i < n) { i = i + 1; } return i; }")
        .unwrap();
    match engine.get_global("spin") {
        Some(ScriptValue::Function(f)) => f,
        other => panic!("expected a function global, got {other:?}"),
    }
}

fn cancelled(err: AccessError) -> bool {
    matches!(
        &err,
        AccessError::Engine(inner)
            if matches!(inner.downcast_ref::<EngineError>(), Some(EngineError::Cancelled))
    )
}

#[test]
fn test_exported_function_observes_interrupt() {
    let engine = Engine::new("exported");
    let spin = exported_spin(&engine);

    engine.interrupt_handle().interrupt();
    let err = spin.call(&[ScriptValue::Int32(50_000)]).unwrap_err();
    assert!(cancelled(err));

    engine.cancel_interrupt();
    assert_eq!(
        spin.call(&[ScriptValue::Int32(3)]).unwrap(),
        ScriptValue::Int32(3)
    );
}

#[test]
fn test_exported_function_observes_continuation_callback() {
    let engine = Engine::new("exported");
    let polls = Arc::new(AtomicU64::new(0));
    let seen = polls.clone();
    engine.set_continuation_callback(Some(Arc::new(move || {
        seen.fetch_add(1, Ordering::Relaxed) < 200
    })));
    let spin = exported_spin(&engine);

    let err = spin.call(&[ScriptValue::Int32(1_000_000)]).unwrap_err();
    assert!(cancelled(err));
    assert!(polls.load(Ordering::Relaxed) >= 200);
}

#[test]
fn test_stats_track_boundary_operations() {
    let engine = Engine::new("counted");
    engine.evaluate("function f() { return 1; }").unwrap();
    engine.evaluate("2 + 2").unwrap();
    engine.invoke("f", &[]).unwrap();
    assert!(engine.evaluate("missing()").is_err());

    let stats = engine.stats();
    assert_eq!(stats.executions, 3);
    assert_eq!(stats.invocations, 1);
    assert_eq!(stats.errors, 1);

    engine.collect_garbage(true);
    assert_eq!(engine.stats().gc_cycles, 1);
}

#[test]
fn test_heap_info_reflects_configuration() {
    let engine = Engine::new("info");
    engine.set_heap_limit(1 << 16);
    engine.runtime().set_heap_sampling_interval(4);
    let info = engine.heap_info();
    assert_eq!(info.limit, 1 << 16);
    assert_eq!(info.sampling_interval, 4);
}

#[test]
fn test_cpu_profile_exports_json() {
    let engine = Engine::new("profiled");
    engine.start_cpu_profile("startup").unwrap();
    assert!(engine.start_cpu_profile("again").is_err());

    engine.evaluate("1 + 1").unwrap();
    let profile = engine.stop_cpu_profile().unwrap();
    assert_eq!(profile["name"], "startup");
    assert_eq!(profile["engine"], "profiled");
    let samples = profile["samples"].as_array().unwrap();
    assert!(!samples.is_empty());
    assert!(samples[0]["document"].as_str().unwrap().starts_with("Script ["));

    assert!(engine.stop_cpu_profile().is_err());
}
