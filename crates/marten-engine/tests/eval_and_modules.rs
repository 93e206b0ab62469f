//! Evaluation, globals, compiled scripts and caching, module categories,
//! and host objects reached from script code.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use marten_engine::{
    CacheKind, DocumentInfo, Engine, EngineBuilder, EngineError, EngineFlags, ModuleCategory,
    NativeComponentAdapter,
};
use marten_host::{HostObjectProxy, ParamType, TypeDescriptor};
use marten_value::{ScriptObject, ScriptValue};

#[test]
fn test_evaluate_basic_expressions() {
    let engine = Engine::new("eval");
    assert_eq!(engine.evaluate("1 + 2").unwrap(), ScriptValue::Int32(3));
    assert_eq!(
        engine.evaluate("'foo' + 'bar'").unwrap(),
        ScriptValue::string("foobar")
    );
    assert_eq!(engine.evaluate("2n + 3n").unwrap(), ScriptValue::bigint(5));
}

#[test]
fn test_globals_roundtrip_both_directions() {
    let engine = Engine::new("globals");
    engine.set_global("x", ScriptValue::Int32(41));
    assert_eq!(engine.evaluate("x + 1").unwrap(), ScriptValue::Int32(42));

    engine.evaluate("y = 7;").unwrap();
    assert_eq!(engine.get_global("y"), Some(ScriptValue::Int32(7)));
    assert_eq!(engine.get_global("absent"), None);
}

#[test]
fn test_invoke_script_function_by_name() {
    let engine = Engine::new("invoke");
    engine
        .evaluate("function add(a, b) { return a + b; }")
        .unwrap();
    let result = engine
        .invoke("add", &[ScriptValue::Int32(2), ScriptValue::Int32(40)])
        .unwrap();
    assert_eq!(result, ScriptValue::Int32(42));

    let err = engine.invoke("nope", &[]).unwrap_err();
    assert!(matches!(err, EngineError::Access(e) if e.is_not_found()));
}

#[test]
fn test_exported_script_function_is_callable_from_host() {
    let engine = Engine::new("export");
    engine
        .evaluate("function twice(x) { return x + x; }")
        .unwrap();
    let Some(ScriptValue::Function(twice)) = engine.get_global("twice") else {
        panic!("expected a function global");
    };
    assert_eq!(
        twice.call(&[ScriptValue::Int32(21)]).unwrap(),
        ScriptValue::Int32(42)
    );
}

#[test]
fn test_compiled_script_reruns_against_current_state() {
    let engine = Engine::new("compiled");
    engine.set_global("counter", ScriptValue::Int32(0));
    let script = engine
        .compile(
            DocumentInfo::script("tick"),
            "counter = counter + 1; counter",
        )
        .unwrap();
    assert_eq!(engine.run(&script).unwrap(), ScriptValue::Int32(1));
    assert_eq!(engine.run(&script).unwrap(), ScriptValue::Int32(2));
}

#[test]
fn test_compiled_script_is_bound_to_its_engine() {
    let a = Engine::new("a");
    let b = Engine::new("b");
    let script = a.compile(DocumentInfo::script("doc"), "1").unwrap();
    assert!(matches!(b.run(&script), Err(EngineError::Usage(_))));
}

#[test]
fn test_code_cache_accept_and_reject() {
    let engine = Engine::new("cache");
    let code = "1 + 1";
    let (_, blob) = engine
        .compile_cached(DocumentInfo::script("doc"), code, CacheKind::Code)
        .unwrap();
    assert!(!blob.is_empty());

    let (script, accepted) = engine
        .compile_with_cache(DocumentInfo::script("doc"), code, CacheKind::Code, &blob)
        .unwrap();
    assert!(accepted);
    assert_eq!(engine.run(&script).unwrap(), ScriptValue::Int32(2));

    // Stale blob: the source changed. Compilation still succeeds.
    let (script, accepted) = engine
        .compile_with_cache(DocumentInfo::script("doc"), "2 + 2", CacheKind::Code, &blob)
        .unwrap();
    assert!(!accepted);
    assert_eq!(engine.run(&script).unwrap(), ScriptValue::Int32(4));

    // A blob produced for one kind does not satisfy another.
    let (_, accepted) = engine
        .compile_with_cache(DocumentInfo::script("doc"), code, CacheKind::Eager, &blob)
        .unwrap();
    assert!(!accepted);

    let (_, blob) = engine
        .compile_cached(DocumentInfo::script("doc"), code, CacheKind::None)
        .unwrap();
    assert!(blob.is_empty());
}

#[test]
fn test_standard_module_evaluates_once_per_name() {
    let engine = Engine::new("modules");
    engine.set_global("hits", ScriptValue::Int32(0));
    let code = "hits = hits + 1; hits";

    let first = engine
        .evaluate_module("boot", code, Some(ModuleCategory::Standard))
        .unwrap();
    assert_eq!(first, ScriptValue::Int32(1));

    // Same document name: idempotent, side effects do not re-run.
    let second = engine
        .evaluate_module("boot", code, Some(ModuleCategory::Standard))
        .unwrap();
    assert_eq!(second, ScriptValue::Undefined);
    assert_eq!(engine.get_global("hits"), Some(ScriptValue::Int32(1)));

    // A different document name evaluates independently.
    engine
        .evaluate_module("boot2", code, Some(ModuleCategory::Standard))
        .unwrap();
    assert_eq!(engine.get_global("hits"), Some(ScriptValue::Int32(2)));
}

#[test]
fn test_script_category_reruns_every_time() {
    let engine = Engine::new("modules");
    engine.set_global("hits", ScriptValue::Int32(0));
    let code = "hits = hits + 1; hits";

    engine
        .evaluate_module("job", code, Some(ModuleCategory::Script))
        .unwrap();
    let second = engine
        .evaluate_module("job", code, Some(ModuleCategory::Script))
        .unwrap();
    assert_eq!(second, ScriptValue::Int32(2));

    // Unspecified category follows standards mode, which is off here.
    engine.evaluate_module("job", code, None).unwrap();
    assert_eq!(engine.get_global("hits"), Some(ScriptValue::Int32(3)));
}

// ---- host objects from script ------------------------------------------

struct Counter {
    value: AtomicI64,
}

fn counter_descriptor() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Counter>("Counter")
        .getter("value", |c| {
            Ok(ScriptValue::Int64(c.value.load(Ordering::Relaxed)))
        })
        .method("add", &[ParamType::Int64], |c, args| {
            let delta = args[0].try_to::<i64>().unwrap_or(0);
            c.value.fetch_add(delta, Ordering::Relaxed);
            Ok(ScriptValue::Undefined)
        })
        .build()
}

#[test]
fn test_host_object_members_from_script() {
    let engine = Engine::new("host");
    engine
        .add_host_object(
            "counter",
            Arc::new(Counter {
                value: AtomicI64::new(0),
            }),
            counter_descriptor(),
        )
        .unwrap();
    let value = engine.evaluate("counter.add(5); counter.value").unwrap();
    assert_eq!(value, ScriptValue::Int64(5));
}

struct Dict {
    entries: Mutex<FxHashMap<String, i64>>,
}

fn dict_descriptor() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Dict>("Dict")
        .indexer_with_setter(
            &[ParamType::String],
            |d, args| {
                let key = args[0].try_to::<String>().unwrap_or_default();
                Ok(d.entries
                    .lock()
                    .get(&key)
                    .map_or(ScriptValue::Undefined, |&v| ScriptValue::Int64(v)))
            },
            |d, args| {
                let key = args[0].try_to::<String>().unwrap_or_default();
                let value = args[1].try_to::<i64>().unwrap_or(0);
                d.entries.lock().insert(key, value);
                Ok(ScriptValue::Undefined)
            },
        )
        .default_member("Item")
        .build()
}

#[test]
fn test_default_member_tunneling_from_script() {
    let engine = Engine::new("host");
    engine
        .add_host_object(
            "dict",
            Arc::new(Dict {
                entries: Mutex::new(FxHashMap::default()),
            }),
            dict_descriptor(),
        )
        .unwrap();
    engine.evaluate("dict.Item.set('k', 3);").unwrap();
    assert_eq!(
        engine.evaluate("dict.Item('k')").unwrap(),
        ScriptValue::Int64(3)
    );
    assert_eq!(
        engine.evaluate("dict.Item.get('k')").unwrap(),
        ScriptValue::Int64(3)
    );
}

#[test]
fn test_missing_host_member_is_catchable() {
    let engine = Engine::new("host");
    engine
        .add_host_object(
            "counter",
            Arc::new(Counter {
                value: AtomicI64::new(0),
            }),
            counter_descriptor(),
        )
        .unwrap();
    let name = engine
        .evaluate("let n = undefined; try { counter.nope; } catch (e) { n = e.name; } n")
        .unwrap();
    assert_eq!(name, ScriptValue::string("Error"));
}

#[test]
fn test_set_global_host_respects_auto_wrap_flag() {
    let engine = Engine::new("wrap");
    engine.set_global_host("blob", 42i32).unwrap();
    assert!(matches!(
        engine.get_global("blob"),
        Some(ScriptValue::Object(_))
    ));

    let strict = Engine::builder()
        .name("strict")
        .flags(EngineFlags {
            auto_host_wrap: false,
            ..EngineFlags::default()
        })
        .build();
    assert!(matches!(
        strict.set_global_host("blob", 42i32),
        Err(EngineError::Usage(_))
    ));
}

// ---- component adapters ------------------------------------------------

struct FixedAdapter;

impl NativeComponentAdapter for FixedAdapter {
    fn adapter_name(&self) -> &str {
        "fixed"
    }

    fn resolve(&self, component: &str) -> Option<ScriptObject> {
        if component != "counter.service" {
            return None;
        }
        let proxy = HostObjectProxy::new(
            Arc::new(Counter {
                value: AtomicI64::new(10),
            }),
            counter_descriptor(),
        );
        Some(proxy.into_object())
    }
}

#[test]
fn test_import_component_through_adapter() {
    let engine = Engine::new("components");
    engine.add_component_adapter(Arc::new(FixedAdapter));
    engine.import_component("svc", "counter.service").unwrap();
    assert_eq!(
        engine.evaluate("svc.value").unwrap(),
        ScriptValue::Int64(10)
    );

    assert!(matches!(
        engine.import_component("other", "missing.service"),
        Err(EngineError::Usage(_))
    ));
}
