//! The contract between the engine facade and a concrete script engine.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use marten_value::ScriptValue;

use crate::error::EngineResult;
use crate::runtime::SharedRuntime;
use crate::script::DocumentInfo;

/// Continuation callback polled during execution; returning `false`
/// cancels the running script.
pub type ContinuationFn = dyn Fn() -> bool + Send + Sync;

/// Per-execution state threaded into the backend.
pub struct ExecutionContext<'a> {
    /// Engine name, used in exception wrappers.
    pub engine_name: &'a str,
    /// Set from any thread to interrupt the running script. Shared so
    /// backends can hand it to callables that outlive this execution.
    pub interrupt: &'a Arc<AtomicBool>,
    /// Optional cooperative cancellation callback.
    pub continuation: Option<&'a Arc<ContinuationFn>>,
    /// Shared limits and heap accounting.
    pub runtime: &'a SharedRuntime,
}

/// A script engine as seen by the facade.
///
/// Backends own globals, compiled units and module state. They check the
/// interrupt flag and the continuation callback at statement boundaries,
/// sample heap usage against the shared limit, and wrap script errors in
/// boundary exceptions before returning.
pub trait EngineBackend: Send + Sync {
    fn set_global(&self, name: &str, value: ScriptValue);

    fn get_global(&self, name: &str) -> Option<ScriptValue>;

    fn remove_global(&self, name: &str) -> bool;

    /// Compiles `code` into a reusable unit, returning its handle.
    fn compile(&self, document: &DocumentInfo, code: &str) -> EngineResult<u64>;

    /// Runs a previously compiled unit.
    fn run(&self, unit: u64, ctx: &ExecutionContext<'_>) -> EngineResult<ScriptValue>;

    /// Calls a script-global function by name.
    fn invoke(
        &self,
        name: &str,
        args: &[ScriptValue],
        ctx: &ExecutionContext<'_>,
    ) -> EngineResult<ScriptValue>;

    /// Script-side collection pass. Returns the object ids of host-proxied
    /// objects still reachable from script state; everything pinned but
    /// absent from this set becomes eligible for the host sweep.
    fn collect_garbage(&self) -> Vec<u64>;

    /// Bytes of script heap attributed to this backend.
    fn heap_used(&self) -> usize;
}
