//! The engine facade.
//!
//! One [`Engine`] wraps one script engine behind the backend contract and
//! adds the host-facing lifecycle: object exposure, limits shared through
//! a [`SharedRuntime`], interrupt and continuation-callback cancellation,
//! two-phase garbage collection, statistics and CPU profiling.

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use marten_host::{HostObjectProxy, TypeDescriptor};
use marten_value::{ScriptValue, host_box};

use crate::adapter::NativeComponentAdapter;
use crate::backend::{ContinuationFn, EngineBackend, ExecutionContext};
use crate::error::{EngineError, EngineResult, FatalKind};
use crate::heap::{HeapCoordinator, SweepReport};
use crate::local::LocalBackend;
use crate::runtime::SharedRuntime;
use crate::script::{
    CacheKind, CompiledScript, DocumentInfo, ModuleCategory, cache_accepted, encode_cache,
};

/// How 64-bit integers cross into script code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LongMarshaling {
    /// Int64 stays Int64.
    #[default]
    Auto,
    /// Int64 beyond the f64 safe-integer threshold crosses as BigInt.
    UnsafeAsBigInt,
    /// Every Int64 crosses as BigInt.
    AllAsBigInt,
}

/// Engine-wide marshaling and behavior switches, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineFlags {
    /// Emit verbose boundary diagnostics.
    pub debugging: bool,
    /// Treat unspecified module evaluations as standard modules.
    pub standards_mode: bool,
    /// Allow `set_global_host` to wrap arbitrary host values implicitly.
    pub auto_host_wrap: bool,
    /// Pass dates through as date values; when off they cross as opaque
    /// host objects.
    pub date_conversion: bool,
    pub long_marshaling: LongMarshaling,
    /// Substitute null for undefined results crossing to the host.
    pub undefined_export_as_null: bool,
    /// Substitute undefined for null values imported into script globals.
    pub null_import_as_undefined: bool,
}

impl Default for EngineFlags {
    fn default() -> Self {
        Self {
            debugging: false,
            standards_mode: false,
            auto_host_wrap: true,
            date_conversion: true,
            long_marshaling: LongMarshaling::Auto,
            undefined_export_as_null: false,
            null_import_as_undefined: false,
        }
    }
}

/// Point-in-time engine statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub executions: u64,
    pub invocations: u64,
    pub errors: u64,
    pub interrupts: u64,
    pub gc_cycles: u64,
}

#[derive(Debug, Default)]
struct EngineStats {
    executions: AtomicU64,
    invocations: AtomicU64,
    errors: AtomicU64,
    interrupts: AtomicU64,
    gc_cycles: AtomicU64,
}

impl EngineStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            invocations: self.invocations.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
            gc_cycles: self.gc_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Script heap view at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapInfo {
    pub used: usize,
    pub limit: usize,
    pub sampling_interval: u64,
}

/// Cross-thread interrupt trigger. Cloneable and `Send`; the owning
/// engine observes the flag at its next statement checkpoint.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

#[derive(Serialize)]
struct ProfileSample {
    document: String,
    micros: u64,
}

struct CpuProfiler {
    name: String,
    started: Instant,
    samples: Vec<ProfileSample>,
}

thread_local! {
    static ENGINE_STACK: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// The engine executing on the current thread, innermost first. Nested
/// engine calls on one thread stack correctly; the marker unwinds on both
/// error returns and panics.
pub fn current_engine_id() -> Option<u64> {
    ENGINE_STACK.with_borrow(|stack| stack.last().copied())
}

struct EngineScope;

impl EngineScope {
    fn enter(id: u64) -> Self {
        ENGINE_STACK.with_borrow_mut(|stack| stack.push(id));
        Self
    }
}

impl Drop for EngineScope {
    fn drop(&mut self) {
        ENGINE_STACK.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

pub struct EngineBuilder {
    name: Option<String>,
    runtime: Option<Arc<SharedRuntime>>,
    flags: EngineFlags,
    backend: Option<Box<dyn EngineBackend>>,
}

impl EngineBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Share resource limits with other engines built on the same runtime.
    pub fn runtime(mut self, runtime: Arc<SharedRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn flags(mut self, flags: EngineFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn backend(mut self, backend: Box<dyn EngineBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn build(self) -> Engine {
        let runtime = self.runtime.unwrap_or_else(SharedRuntime::new);
        let id = runtime.next_engine_id();
        let name = self.name.unwrap_or_else(|| format!("engine-{id}"));
        let backend = self
            .backend
            .unwrap_or_else(|| Box::new(LocalBackend::new(id, &name, runtime.clone())));
        debug!(engine = %name, id, debugging = self.flags.debugging, "engine created");
        Engine {
            id,
            name,
            runtime,
            backend,
            coordinator: HeapCoordinator::new(),
            adapters: Mutex::new(Vec::new()),
            interrupt: Arc::new(AtomicBool::new(false)),
            continuation: Mutex::new(None),
            flags: self.flags,
            stats: EngineStats::default(),
            profiler: Mutex::new(None),
            next_document: AtomicU64::new(1),
            poisoned: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }
}

pub struct Engine {
    id: u64,
    name: String,
    runtime: Arc<SharedRuntime>,
    backend: Box<dyn EngineBackend>,
    coordinator: HeapCoordinator,
    adapters: Mutex<Vec<Arc<dyn NativeComponentAdapter>>>,
    interrupt: Arc<AtomicBool>,
    continuation: Mutex<Option<Arc<ContinuationFn>>>,
    flags: EngineFlags,
    stats: EngineStats,
    profiler: Mutex<Option<CpuProfiler>>,
    next_document: AtomicU64,
    poisoned: AtomicBool,
    disposed: AtomicBool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            name: None,
            runtime: None,
            flags: EngineFlags::default(),
            backend: None,
        }
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runtime(&self) -> &Arc<SharedRuntime> {
        &self.runtime
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    pub fn set_heap_limit(&self, bytes: usize) {
        self.runtime.set_heap_limit(bytes);
        // Raising the limit out of an over-limit condition lifts poisoning.
        if self.poisoned.load(Ordering::Acquire) && !self.runtime.over_limit() {
            self.poisoned.store(false, Ordering::Release);
        }
    }

    pub fn set_stack_depth(&self, frames: usize) {
        self.runtime.set_stack_depth(frames);
    }

    pub fn heap_info(&self) -> HeapInfo {
        HeapInfo {
            used: self.backend.heap_used(),
            limit: self.runtime.heap_limit(),
            sampling_interval: self.runtime.heap_sampling_interval(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // ---- host object exposure ----------------------------------------

    /// Exposes a host instance under `name` with its full descriptor.
    pub fn add_host_object<T: Any + Send + Sync>(
        &self,
        name: &str,
        target: Arc<T>,
        descriptor: Arc<TypeDescriptor>,
    ) -> EngineResult<()> {
        self.add_host_proxy(name, HostObjectProxy::new(target, descriptor))
    }

    /// Exposes a host instance through an interface descriptor that hides
    /// everything the interface does not declare.
    pub fn add_restricted_host_object<T: Any + Send + Sync>(
        &self,
        name: &str,
        target: Arc<T>,
        interface: Arc<TypeDescriptor>,
    ) -> EngineResult<()> {
        self.add_host_proxy(name, HostObjectProxy::restricted(target, interface))
    }

    /// Exposes a host type: statics and constructor, no instance.
    pub fn add_host_type(&self, name: &str, descriptor: Arc<TypeDescriptor>) -> EngineResult<()> {
        self.add_host_proxy(name, HostObjectProxy::new_type(descriptor))
    }

    /// Exposes a fully configured proxy (exposure flags, dynamic bridge,
    /// dispatch mode). Global-member flattening applies here: each visible
    /// member lands in the root namespace, last registration winning.
    pub fn add_host_proxy(&self, name: &str, proxy: HostObjectProxy) -> EngineResult<()> {
        self.ensure_live()?;
        let flatten = if proxy.flags().global_members {
            proxy.global_member_names()
        } else {
            Vec::new()
        };
        let object = proxy.into_object();
        self.coordinator.expose(object.clone());
        for member in flatten {
            if let Ok(value) = object.get(&member) {
                self.backend.set_global(&member, value);
            }
        }
        self.backend
            .set_global(name, ScriptValue::Object(object));
        Ok(())
    }

    /// Wraps an arbitrary host value as a memberless global.
    pub fn set_global_host<T: Any + Send + Sync>(
        &self,
        name: &str,
        value: T,
    ) -> EngineResult<()> {
        self.ensure_live()?;
        if !self.flags.auto_host_wrap {
            return Err(EngineError::usage(
                "implicit host wrapping is disabled for this engine",
            ));
        }
        let object = host_box(value);
        self.coordinator.expose(object.clone());
        self.backend.set_global(name, ScriptValue::Object(object));
        Ok(())
    }

    pub fn add_component_adapter(&self, adapter: Arc<dyn NativeComponentAdapter>) {
        self.adapters.lock().push(adapter);
    }

    /// Resolves a named native component through the registered adapters
    /// and exposes it under `name`.
    pub fn import_component(&self, name: &str, component: &str) -> EngineResult<()> {
        self.ensure_live()?;
        let adapters = self.adapters.lock();
        for adapter in adapters.iter() {
            if let Some(object) = adapter.resolve(component) {
                debug!(adapter = adapter.adapter_name(), component, "component resolved");
                self.coordinator.expose(object.clone());
                self.backend.set_global(name, ScriptValue::Object(object));
                return Ok(());
            }
        }
        Err(EngineError::usage(format!(
            "no adapter provides component '{component}'"
        )))
    }

    // ---- root-scope access --------------------------------------------

    pub fn get_global(&self, name: &str) -> Option<ScriptValue> {
        self.backend.get_global(name).map(|v| self.export_value(v))
    }

    pub fn set_global(&self, name: &str, value: ScriptValue) {
        self.backend.set_global(name, self.import_value(value));
    }

    pub fn remove_global(&self, name: &str) -> bool {
        self.backend.remove_global(name)
    }

    // ---- evaluation ----------------------------------------------------

    /// Evaluates `code` under a generated document name, returning the
    /// value of its last expression.
    pub fn evaluate(&self, code: &str) -> EngineResult<ScriptValue> {
        let n = self.next_document.fetch_add(1, Ordering::Relaxed);
        self.evaluate_document(&DocumentInfo::script(format!("Script [{n}]")), code)
    }

    pub fn evaluate_document(
        &self,
        document: &DocumentInfo,
        code: &str,
    ) -> EngineResult<ScriptValue> {
        let script = self.compile(document.clone(), code)?;
        self.run(&script)
    }

    /// Evaluates and discards the result.
    pub fn execute(&self, document: &DocumentInfo, code: &str) -> EngineResult<()> {
        self.evaluate_document(document, code).map(|_| ())
    }

    /// Evaluates a module. Standard modules are idempotent per document
    /// name: a repeat evaluation returns the undefined value without
    /// re-running side effects.
    pub fn evaluate_module(
        &self,
        name: &str,
        code: &str,
        category: Option<ModuleCategory>,
    ) -> EngineResult<ScriptValue> {
        let category = category.unwrap_or(if self.flags.standards_mode {
            ModuleCategory::Standard
        } else {
            ModuleCategory::Script
        });
        self.evaluate_document(&DocumentInfo::module(name, category), code)
    }

    pub fn compile(&self, document: DocumentInfo, code: &str) -> EngineResult<CompiledScript> {
        self.ensure_live()?;
        let unit = self.backend.compile(&document, code)?;
        Ok(CompiledScript::new(self.id, unit, document, code))
    }

    /// Compiles and emits a cache blob for `kind`.
    pub fn compile_cached(
        &self,
        document: DocumentInfo,
        code: &str,
        kind: CacheKind,
    ) -> EngineResult<(CompiledScript, Vec<u8>)> {
        let script = self.compile(document, code)?;
        let blob = encode_cache(kind, code)?;
        Ok((script, blob))
    }

    /// Compiles, consuming a previously emitted cache blob when it still
    /// matches the source. The boolean reports acceptance; a rejected blob
    /// silently falls back to plain compilation.
    pub fn compile_with_cache(
        &self,
        document: DocumentInfo,
        code: &str,
        kind: CacheKind,
        cache: &[u8],
    ) -> EngineResult<(CompiledScript, bool)> {
        let accepted = cache_accepted(kind, code, cache);
        let script = self.compile(document, code)?;
        Ok((script, accepted))
    }

    /// Runs a compiled script. Scripts are bound to the engine that
    /// compiled them.
    pub fn run(&self, script: &CompiledScript) -> EngineResult<ScriptValue> {
        if script.engine_id != self.id {
            return Err(EngineError::usage(
                "compiled script belongs to a different engine",
            ));
        }
        let started = Instant::now();
        let result = self.with_execution(|ctx| self.backend.run(script.unit, ctx));
        self.stats.executions.fetch_add(1, Ordering::Relaxed);
        self.record_sample(&script.document().name, started);
        result.map(|v| self.export_value(v))
    }

    /// Calls a script-global function by name.
    pub fn invoke(&self, name: &str, args: &[ScriptValue]) -> EngineResult<ScriptValue> {
        let started = Instant::now();
        let result = self.with_execution(|ctx| self.backend.invoke(name, args, ctx));
        self.stats.invocations.fetch_add(1, Ordering::Relaxed);
        self.record_sample(name, started);
        result.map(|v| self.export_value(v))
    }

    // ---- cancellation --------------------------------------------------

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            flag: self.interrupt.clone(),
        }
    }

    /// Clears a pending interrupt that no execution has consumed yet.
    pub fn cancel_interrupt(&self) {
        self.interrupt.store(false, Ordering::Release);
    }

    /// Installs (or clears) the cooperative cancellation callback. The
    /// callback is polled at statement boundaries; returning `false`
    /// cancels the running script.
    pub fn set_continuation_callback(&self, callback: Option<Arc<ContinuationFn>>) {
        *self.continuation.lock() = callback;
    }

    // ---- garbage collection -------------------------------------------

    /// Runs the script-side collection pass and, when `two_phase` is set,
    /// the host sweep releasing proxies the script no longer reaches.
    /// A successful collection that brings usage back under the limit
    /// clears fatal poisoning.
    pub fn collect_garbage(&self, two_phase: bool) -> SweepReport {
        let live = self.backend.collect_garbage();
        self.coordinator.note_script_live(live);
        let report = if two_phase {
            self.coordinator.sweep_host()
        } else {
            SweepReport {
                released: 0,
                retained: self.coordinator.exposed_count(),
            }
        };
        self.stats.gc_cycles.fetch_add(1, Ordering::Relaxed);
        if self.poisoned.load(Ordering::Acquire) && !self.runtime.over_limit() {
            self.poisoned.store(false, Ordering::Release);
        }
        report
    }

    // ---- profiling -----------------------------------------------------

    pub fn start_cpu_profile(&self, name: impl Into<String>) -> EngineResult<()> {
        let mut profiler = self.profiler.lock();
        if profiler.is_some() {
            return Err(EngineError::usage("a CPU profile is already running"));
        }
        *profiler = Some(CpuProfiler {
            name: name.into(),
            started: Instant::now(),
            samples: Vec::new(),
        });
        Ok(())
    }

    /// Stops the running profile and exports it as JSON.
    pub fn stop_cpu_profile(&self) -> EngineResult<serde_json::Value> {
        let profiler = self
            .profiler
            .lock()
            .take()
            .ok_or_else(|| EngineError::usage("no CPU profile is running"))?;
        let export = serde_json::json!({
            "name": profiler.name,
            "engine": self.name,
            "duration_micros": profiler.started.elapsed().as_micros() as u64,
            "samples": serde_json::to_value(&profiler.samples)
                .map_err(|e| EngineError::usage(format!("profile export failed: {e}")))?,
        });
        Ok(export)
    }

    fn record_sample(&self, document: &str, started: Instant) {
        let mut profiler = self.profiler.lock();
        if let Some(profiler) = profiler.as_mut() {
            profiler.samples.push(ProfileSample {
                document: document.to_string(),
                micros: started.elapsed().as_micros() as u64,
            });
        }
    }

    // ---- lifecycle -----------------------------------------------------

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Releases every pinned host proxy and rejects further operations.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let released = self.coordinator.release_all();
        debug!(engine = %self.name, released, "engine disposed");
    }

    fn ensure_live(&self) -> EngineResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(EngineError::Disposed);
        }
        if self.poisoned.load(Ordering::Acquire) {
            if self.runtime.over_limit() {
                return Err(EngineError::Fatal(FatalKind::HeapLimitExceeded));
            }
            self.poisoned.store(false, Ordering::Release);
        }
        Ok(())
    }

    fn with_execution<R>(
        &self,
        f: impl FnOnce(&ExecutionContext<'_>) -> EngineResult<R>,
    ) -> EngineResult<R> {
        self.ensure_live()?;
        let _scope = EngineScope::enter(self.id);
        let continuation = self.continuation.lock().clone();
        let ctx = ExecutionContext {
            engine_name: &self.name,
            interrupt: &self.interrupt,
            continuation: continuation.as_ref(),
            runtime: &self.runtime,
        };
        let result = f(&ctx);
        if let Err(err) = &result {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
            if err.is_fatal() {
                self.poisoned.store(true, Ordering::Release);
            }
            if err.is_cancelled() {
                self.stats.interrupts.fetch_add(1, Ordering::Relaxed);
                // A consumed interrupt does not stick to later executions.
                self.interrupt.store(false, Ordering::Release);
            }
        }
        result
    }

    // ---- marshaling policy --------------------------------------------

    /// Export-side substitutions applied to values handed to the host.
    fn export_value(&self, value: ScriptValue) -> ScriptValue {
        match value {
            ScriptValue::Undefined if self.flags.undefined_export_as_null => ScriptValue::Null,
            other => other,
        }
    }

    /// Import-side substitutions and marshaling policy for values entering
    /// script space.
    fn import_value(&self, value: ScriptValue) -> ScriptValue {
        match value {
            ScriptValue::Null if self.flags.null_import_as_undefined => ScriptValue::Undefined,
            ScriptValue::Int64(i) => match self.flags.long_marshaling {
                LongMarshaling::Auto => ScriptValue::Int64(i),
                LongMarshaling::AllAsBigInt => ScriptValue::bigint(i),
                LongMarshaling::UnsafeAsBigInt => {
                    if i.unsigned_abs() > marten_value::MAX_SAFE_INTEGER_F64 as u64 {
                        ScriptValue::bigint(i)
                    } else {
                        ScriptValue::Int64(i)
                    }
                }
            },
            ScriptValue::Date(d) if !self.flags.date_conversion => {
                ScriptValue::Object(host_box(d))
            }
            other => other,
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_engine_marker_unwinds_on_error() {
        let engine = Engine::new("marker");
        assert_eq!(current_engine_id(), None);
        let err = engine.evaluate("missing()");
        assert!(err.is_err());
        assert_eq!(current_engine_id(), None);
    }

    struct Peek {
        seen: Arc<Mutex<Vec<Option<u64>>>>,
    }

    fn peek_descriptor() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Peek>("Peek")
            .method("look", &[], |p, _| {
                p.seen.lock().push(current_engine_id());
                Ok(ScriptValue::Undefined)
            })
            .build()
    }

    struct Bridge {
        inner: Arc<Engine>,
        seen: Arc<Mutex<Vec<Option<u64>>>>,
    }

    fn bridge_descriptor() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Bridge>("Bridge")
            .method("run", &[], |b, _| {
                b.seen.lock().push(current_engine_id());
                b.inner
                    .evaluate("peek.look();")
                    .map_err(marten_value::AccessError::engine)?;
                b.seen.lock().push(current_engine_id());
                Ok(ScriptValue::Undefined)
            })
            .build()
    }

    #[test]
    fn test_nested_marker_reflects_innermost() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::new(Engine::new("inner"));
        inner
            .add_host_object(
                "peek",
                Arc::new(Peek { seen: seen.clone() }),
                peek_descriptor(),
            )
            .unwrap();
        let outer = Engine::new("outer");
        outer
            .add_host_object(
                "bridge",
                Arc::new(Bridge {
                    inner: inner.clone(),
                    seen: seen.clone(),
                }),
                bridge_descriptor(),
            )
            .unwrap();

        outer.evaluate("bridge.run();").unwrap();
        assert_eq!(
            *seen.lock(),
            vec![Some(outer.id()), Some(inner.id()), Some(outer.id())]
        );
        assert_eq!(current_engine_id(), None);
    }

    struct Volatile;

    fn volatile_descriptor() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder::<Volatile>("Volatile")
            .method("explode", &[], |_, _| panic!("host failure"))
            .build()
    }

    #[test]
    fn test_marker_unwinds_across_panic() {
        let engine = Engine::new("panicky");
        engine
            .add_host_object("boom", Arc::new(Volatile), volatile_descriptor())
            .unwrap();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.evaluate("boom.explode();")
        }));
        assert!(result.is_err());
        assert_eq!(current_engine_id(), None);
    }

    #[test]
    fn test_disposed_engine_rejects_evaluation() {
        let engine = Engine::new("gone");
        engine.dispose();
        assert!(matches!(
            engine.evaluate("1"),
            Err(EngineError::Disposed)
        ));
    }

    #[test]
    fn test_long_marshaling_all_as_bigint() {
        let engine = Engine::builder()
            .flags(EngineFlags {
                long_marshaling: LongMarshaling::AllAsBigInt,
                ..EngineFlags::default()
            })
            .build();
        engine.set_global("n", ScriptValue::Int64(7));
        assert_eq!(engine.get_global("n"), Some(ScriptValue::bigint(7)));
    }

    #[test]
    fn test_long_marshaling_unsafe_as_bigint() {
        let engine = Engine::builder()
            .flags(EngineFlags {
                long_marshaling: LongMarshaling::UnsafeAsBigInt,
                ..EngineFlags::default()
            })
            .build();
        let safe = marten_value::MAX_SAFE_INTEGER_F64;
        engine.set_global("safe", ScriptValue::Int64(safe));
        assert_eq!(engine.get_global("safe"), Some(ScriptValue::Int64(safe)));

        engine.set_global("unsafe", ScriptValue::Int64(safe + 1));
        assert_eq!(
            engine.get_global("unsafe"),
            Some(ScriptValue::bigint(safe + 1))
        );
        engine.set_global("negative", ScriptValue::Int64(i64::MIN));
        assert_eq!(
            engine.get_global("negative"),
            Some(ScriptValue::bigint(i64::MIN))
        );
    }

    #[test]
    fn test_undefined_export_substitution() {
        let engine = Engine::builder()
            .flags(EngineFlags {
                undefined_export_as_null: true,
                ..EngineFlags::default()
            })
            .build();
        let result = engine.evaluate("let x = 1;").unwrap();
        assert_eq!(result, ScriptValue::Null);
    }
}
