//! In-process reference backend.
//!
//! A small expression-statement dialect sufficient to exercise the full
//! boundary surface: globals, functions, host member access, throw and
//! try/catch, loops and cooperative cancellation. Production embeddings
//! plug real engines in through [`EngineBackend`]; this backend keeps the
//! facade honest and testable without one.

mod interp;
mod lexer;
mod parser;

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use marten_value::{
    AccessError, AccessResult, ScriptFunction, ScriptObject, ScriptObjectContract, ScriptValue,
};

use crate::backend::{ContinuationFn, EngineBackend, ExecutionContext};
use crate::error::{EngineError, EngineResult};
use crate::exception::{
    HostExceptionRef, HostInvocationError, ScriptEngineException, ScriptErrorPayload,
    flatten_engine_cause, host_exception_of, host_exception_value,
};
use crate::local::interp::{Flow, Interp, RunCtx, display};
use crate::local::parser::{Stmt, parse};
use crate::runtime::SharedRuntime;
use crate::script::{DocumentInfo, ModuleCategory};

/// A declared script function.
pub(crate) struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// Cancellation hooks shared with callables held by the host. Refreshed
/// on every engine-driven execution so host-initiated calls observe the
/// same interrupt flag and continuation callback.
#[derive(Default)]
struct CancelHooks {
    interrupt: Option<Arc<AtomicBool>>,
    continuation: Option<Arc<ContinuationFn>>,
}

/// Shared interpreter state: globals, functions, heap accounting.
pub(crate) struct LocalState {
    engine_id: u64,
    engine_name: String,
    pub(crate) runtime: Arc<SharedRuntime>,
    globals: Mutex<IndexMap<String, ScriptValue>>,
    functions: Mutex<FxHashMap<String, Arc<FunctionDef>>>,
    function_ids: Mutex<FxHashMap<u64, Arc<FunctionDef>>>,
    cancellation: Mutex<CancelHooks>,
    next_object: AtomicU64,
    heap_used: AtomicUsize,
}

impl LocalState {
    fn new(engine_id: u64, engine_name: String, runtime: Arc<SharedRuntime>) -> Arc<Self> {
        let state = Arc::new(Self {
            engine_id,
            engine_name,
            runtime,
            globals: Mutex::new(IndexMap::new()),
            functions: Mutex::new(FxHashMap::default()),
            function_ids: Mutex::new(FxHashMap::default()),
            cancellation: Mutex::new(CancelHooks::default()),
            next_object: AtomicU64::new(1),
            heap_used: AtomicUsize::new(0),
        });
        for ctor in ["Error", "TypeError", "RangeError", "ReferenceError"] {
            let value = ScriptValue::Function(ScriptFunction::new(Arc::new(ErrorCtor {
                id: state.alloc_object_id(),
                engine_id,
                name: ctor,
                state: Arc::downgrade(&state),
            })));
            state.set_global(ctor, value);
        }
        state
    }

    fn alloc_object_id(&self) -> u64 {
        self.next_object.fetch_add(1, Ordering::Relaxed)
    }

    fn bind_cancellation(&self, ctx: &ExecutionContext<'_>) {
        let mut hooks = self.cancellation.lock();
        hooks.interrupt = Some(ctx.interrupt.clone());
        hooks.continuation = ctx.continuation.cloned();
    }

    pub(crate) fn charge(&self, bytes: usize) {
        self.heap_used.fetch_add(bytes, Ordering::AcqRel);
        self.runtime.charge(bytes);
    }

    pub(crate) fn set_global(&self, name: &str, value: ScriptValue) {
        self.globals.lock().insert(name.to_string(), value);
    }

    pub(crate) fn get_global(&self, name: &str) -> Option<ScriptValue> {
        self.globals.lock().get(name).cloned()
    }

    fn remove_global(&self, name: &str) -> bool {
        self.globals.lock().shift_remove(name).is_some()
    }

    pub(crate) fn function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.lock().get(name).cloned()
    }

    pub(crate) fn function_of_value(&self, f: &ScriptFunction) -> Option<Arc<FunctionDef>> {
        self.function_ids
            .lock()
            .get(&f.as_object().object_id())
            .cloned()
    }

    pub(crate) fn declare_function(
        &self,
        name: &str,
        params: Vec<String>,
        body: Vec<Stmt>,
    ) -> Arc<FunctionDef> {
        let def = Arc::new(FunctionDef {
            name: name.to_string(),
            params,
            body,
        });
        self.functions.lock().insert(name.to_string(), def.clone());
        def
    }

    pub(crate) fn new_object(&self) -> ScriptObject {
        ScriptObject::new(Arc::new(LocalObject {
            id: self.alloc_object_id(),
            engine_id: self.engine_id,
            props: Mutex::new(IndexMap::new()),
            elements: Mutex::new(BTreeMap::new()),
        }))
    }

    pub(crate) fn new_error_object(
        &self,
        ctor: &str,
        message: &str,
        host_ref: Option<HostExceptionRef>,
    ) -> ScriptValue {
        self.charge(64 + message.len());
        let object = self.new_object();
        let _ = object.set("name", ScriptValue::string(ctor));
        let _ = object.set("message", ScriptValue::string(message));
        if let Some(host) = host_ref {
            let _ = object.set(
                crate::exception::HOST_EXCEPTION_PROPERTY,
                host_exception_value(host),
            );
        }
        ScriptValue::Object(object)
    }
}

/// Wraps a function definition in a callable boundary value tied to its
/// engine state.
pub(crate) fn function_value(state: &Arc<LocalState>, def: Arc<FunctionDef>) -> ScriptValue {
    let id = state.alloc_object_id();
    state.function_ids.lock().insert(id, def.clone());
    ScriptValue::Function(ScriptFunction::new(Arc::new(LocalFunction {
        id,
        engine_id: state.engine_id,
        state: Arc::downgrade(state),
        def,
    })))
}

/// A plain script data object.
struct LocalObject {
    id: u64,
    engine_id: u64,
    props: Mutex<IndexMap<String, ScriptValue>>,
    elements: Mutex<BTreeMap<u32, ScriptValue>>,
}

impl ScriptObjectContract for LocalObject {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn engine_id(&self) -> u64 {
        self.engine_id
    }

    // Absent properties read as undefined, matching script semantics.
    fn get_property(&self, name: &str) -> AccessResult<ScriptValue> {
        Ok(self
            .props
            .lock()
            .get(name)
            .cloned()
            .unwrap_or(ScriptValue::Undefined))
    }

    fn set_property(&self, name: &str, value: ScriptValue) -> AccessResult<()> {
        self.props.lock().insert(name.to_string(), value);
        Ok(())
    }

    fn get_index(&self, index: u32) -> AccessResult<ScriptValue> {
        Ok(self
            .elements
            .lock()
            .get(&index)
            .cloned()
            .unwrap_or(ScriptValue::Undefined))
    }

    fn set_index(&self, index: u32, value: ScriptValue) -> AccessResult<()> {
        self.elements.lock().insert(index, value);
        Ok(())
    }

    fn invoke(&self, _args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        Err(AccessError::NotSupported("object is not callable"))
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        let member = self.get_property(name)?;
        match member {
            ScriptValue::Function(f) => f.call(args),
            ScriptValue::Object(o) => o.invoke(args),
            _ => Err(AccessError::not_found(name)),
        }
    }

    fn property_names(&self) -> Vec<String> {
        self.props.lock().keys().cloned().collect()
    }

    fn property_indices(&self) -> Vec<u32> {
        self.elements.lock().keys().copied().collect()
    }
}

/// Script function exposed to the host as a callable value.
///
/// Host-initiated calls cross the boundary, so escaping script errors are
/// sealed in an exception wrapper here.
struct LocalFunction {
    id: u64,
    engine_id: u64,
    state: Weak<LocalState>,
    def: Arc<FunctionDef>,
}

impl ScriptObjectContract for LocalFunction {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn engine_id(&self) -> u64 {
        self.engine_id
    }

    fn get_property(&self, name: &str) -> AccessResult<ScriptValue> {
        if name == "name" {
            return Ok(ScriptValue::string(&self.def.name));
        }
        Err(AccessError::not_found(name))
    }

    fn set_property(&self, name: &str, _value: ScriptValue) -> AccessResult<()> {
        Err(AccessError::not_found(name))
    }

    fn get_index(&self, index: u32) -> AccessResult<ScriptValue> {
        Err(AccessError::not_found(format!("[{index}]")))
    }

    fn set_index(&self, index: u32, _value: ScriptValue) -> AccessResult<()> {
        Err(AccessError::not_found(format!("[{index}]")))
    }

    fn invoke(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        let state = self
            .state
            .upgrade()
            .ok_or(AccessError::NotSupported("engine is gone"))?;
        // Host-initiated calls honor the same cancellation hooks as
        // engine-driven runs.
        let (interrupt, continuation) = {
            let hooks = state.cancellation.lock();
            (hooks.interrupt.clone(), hooks.continuation.clone())
        };
        let ctx = RunCtx {
            interrupt: interrupt.as_deref(),
            continuation: continuation.as_deref(),
        };
        let mut interp = Interp::new(&state, ctx);
        interp
            .call_function(&self.def, args, 0)
            .map_err(|flow| {
                AccessError::engine(seal_flow(&state.engine_name, &self.def.name, flow))
            })
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        if name == "call" {
            return self.invoke(args);
        }
        Err(AccessError::not_found(name))
    }

    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn property_indices(&self) -> Vec<u32> {
        Vec::new()
    }
}

/// Builtin error constructors.
struct ErrorCtor {
    id: u64,
    engine_id: u64,
    name: &'static str,
    state: Weak<LocalState>,
}

impl ScriptObjectContract for ErrorCtor {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn engine_id(&self) -> u64 {
        self.engine_id
    }

    fn get_property(&self, name: &str) -> AccessResult<ScriptValue> {
        Err(AccessError::not_found(name))
    }

    fn set_property(&self, name: &str, _value: ScriptValue) -> AccessResult<()> {
        Err(AccessError::not_found(name))
    }

    fn get_index(&self, index: u32) -> AccessResult<ScriptValue> {
        Err(AccessError::not_found(format!("[{index}]")))
    }

    fn set_index(&self, index: u32, _value: ScriptValue) -> AccessResult<()> {
        Err(AccessError::not_found(format!("[{index}]")))
    }

    fn invoke(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        let state = self
            .state
            .upgrade()
            .ok_or(AccessError::NotSupported("engine is gone"))?;
        let message = args.first().map(display).unwrap_or_default();
        Ok(state.new_error_object(self.name, &message, None))
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        if name == "call" {
            return self.invoke(args);
        }
        Err(AccessError::not_found(name))
    }

    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn property_indices(&self) -> Vec<u32> {
        Vec::new()
    }
}

struct Unit {
    document: DocumentInfo,
    stmts: Arc<Vec<Stmt>>,
}

/// The reference [`EngineBackend`].
pub struct LocalBackend {
    state: Arc<LocalState>,
    units: Mutex<FxHashMap<u64, Arc<Unit>>>,
    evaluated_modules: Mutex<FxHashSet<String>>,
    next_unit: AtomicU64,
}

impl LocalBackend {
    pub fn new(engine_id: u64, engine_name: &str, runtime: Arc<SharedRuntime>) -> Self {
        Self {
            state: LocalState::new(engine_id, engine_name.to_string(), runtime),
            units: Mutex::new(FxHashMap::default()),
            evaluated_modules: Mutex::new(FxHashSet::default()),
            next_unit: AtomicU64::new(1),
        }
    }

    fn unit(&self, id: u64) -> EngineResult<Arc<Unit>> {
        self.units
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| EngineError::usage(format!("unknown compiled script #{id}")))
    }
}

impl EngineBackend for LocalBackend {
    fn set_global(&self, name: &str, value: ScriptValue) {
        self.state.set_global(name, value);
    }

    fn get_global(&self, name: &str) -> Option<ScriptValue> {
        self.state.get_global(name)
    }

    fn remove_global(&self, name: &str) -> bool {
        self.state.remove_global(name)
    }

    fn compile(&self, document: &DocumentInfo, code: &str) -> EngineResult<u64> {
        let stmts = parse(code)?;
        let id = self.next_unit.fetch_add(1, Ordering::Relaxed);
        self.units.lock().insert(
            id,
            Arc::new(Unit {
                document: document.clone(),
                stmts: Arc::new(stmts),
            }),
        );
        Ok(id)
    }

    fn run(&self, unit: u64, ctx: &ExecutionContext<'_>) -> EngineResult<ScriptValue> {
        let unit = self.unit(unit)?;
        if unit.document.module == Some(ModuleCategory::Standard) {
            let mut evaluated = self.evaluated_modules.lock();
            if evaluated.contains(&unit.document.name) {
                // Standard modules evaluate once per document.
                return Ok(ScriptValue::Undefined);
            }
            evaluated.insert(unit.document.name.clone());
        }
        self.state.bind_cancellation(ctx);
        let run_ctx = RunCtx {
            interrupt: Some(ctx.interrupt.as_ref()),
            continuation: ctx.continuation.map(|c| c.as_ref()),
        };
        let mut interp = Interp::new(&self.state, run_ctx);
        interp
            .run(&unit.stmts)
            .map_err(|flow| seal_flow(ctx.engine_name, &unit.document.name, flow))
    }

    fn invoke(
        &self,
        name: &str,
        args: &[ScriptValue],
        ctx: &ExecutionContext<'_>,
    ) -> EngineResult<ScriptValue> {
        if let Some(def) = self.state.function(name) {
            self.state.bind_cancellation(ctx);
            let run_ctx = RunCtx {
                interrupt: Some(ctx.interrupt.as_ref()),
                continuation: ctx.continuation.map(|c| c.as_ref()),
            };
            let mut interp = Interp::new(&self.state, run_ctx);
            return interp
                .call_function(&def, args, 0)
                .map_err(|flow| seal_flow(ctx.engine_name, name, flow));
        }
        match self.state.get_global(name) {
            Some(ScriptValue::Function(f)) => f.call(args).map_err(EngineError::Access),
            Some(_) => Err(EngineError::usage(format!("global '{name}' is not callable"))),
            None => Err(EngineError::Access(AccessError::not_found(name))),
        }
    }

    fn collect_garbage(&self) -> Vec<u64> {
        let mut visited = FxHashSet::default();
        let mut live = FxHashSet::default();
        let mut bytes = 0usize;
        {
            let globals = self.state.globals.lock();
            for value in globals.values() {
                walk_value(self.state.engine_id, value, &mut visited, &mut live, &mut bytes);
            }
        }
        // Re-baseline heap accounting to what survived collection.
        let old = self.state.heap_used.swap(bytes, Ordering::AcqRel);
        if old > bytes {
            self.state.runtime.release(old - bytes);
        } else {
            self.state.runtime.charge(bytes - old);
        }
        live.into_iter().collect()
    }

    fn heap_used(&self) -> usize {
        self.state.heap_used.load(Ordering::Acquire)
    }
}

/// Reachability walk over script state. Host-side objects are recorded as
/// live without recursing into them (their members run host code).
fn walk_value(
    engine_id: u64,
    value: &ScriptValue,
    visited: &mut FxHashSet<(u64, u64)>,
    live: &mut FxHashSet<u64>,
    bytes: &mut usize,
) {
    match value {
        ScriptValue::String(s) => *bytes += s.len() + 16,
        ScriptValue::BigInt(_) => *bytes += 32,
        ScriptValue::Object(o) => walk_object(engine_id, o, visited, live, bytes),
        ScriptValue::Function(f) => walk_object(engine_id, f.as_object(), visited, live, bytes),
        _ => *bytes += 16,
    }
}

fn walk_object(
    engine_id: u64,
    object: &ScriptObject,
    visited: &mut FxHashSet<(u64, u64)>,
    live: &mut FxHashSet<u64>,
    bytes: &mut usize,
) {
    let key = (object.engine_id(), object.object_id());
    if !visited.insert(key) {
        return;
    }
    *bytes += 64;
    if object.engine_id() != engine_id {
        live.insert(object.object_id());
        return;
    }
    for name in object.property_names() {
        if let Ok(value) = object.get(&name) {
            walk_value(engine_id, &value, visited, live, bytes);
        }
    }
    for index in object.property_indices() {
        if let Ok(value) = object.get_index(index) {
            walk_value(engine_id, &value, visited, live, bytes);
        }
    }
}

/// Seals a non-local exit into a boundary error. One wrapper per
/// boundary crossing; cancellation and fatal exits carry no payload.
pub(crate) fn seal_flow(engine_name: &str, document: &str, flow: Flow) -> EngineError {
    match flow {
        Flow::Cancelled => EngineError::Cancelled,
        Flow::Fatal(kind) => EngineError::Fatal(kind),
        Flow::Thrown { value, cause, line } => {
            let (ctor, text) = error_identity(&value);
            let host_ref = value.as_object().and_then(host_exception_of);
            let message = format!("{ctor}: {text}");
            let detail = format!("{message}\n    at {document}:{line}");
            let inner = cause.map(|c| {
                Box::new(HostInvocationError::new(
                    format!("host invocation failed: {text}"),
                    host_ref.clone(),
                    Some(flatten_engine_cause(c)),
                )) as Box<dyn Error + Send + Sync>
            });
            EngineError::Script(Box::new(ScriptEngineException::new(
                engine_name,
                message,
                detail,
                Some(ScriptErrorPayload::new(ctor, text)),
                host_ref,
                inner,
                false,
            )))
        }
    }
}

fn error_identity(value: &ScriptValue) -> (String, String) {
    if let Some(object) = value.as_object() {
        let ctor = match object.get("name") {
            Ok(ScriptValue::String(s)) => s.to_string(),
            _ => "Error".to_string(),
        };
        let message = match object.get("message") {
            Ok(ScriptValue::String(s)) => s.to_string(),
            _ => String::new(),
        };
        return (ctor, message);
    }
    ("Error".to_string(), display(value))
}
