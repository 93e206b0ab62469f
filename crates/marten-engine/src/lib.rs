//! Engine lifecycle and exception marshaling.
//!
//! Wraps a script engine behind the [`EngineBackend`] contract and provides
//! the host-facing surface: host object exposure, shared resource limits,
//! interrupt and continuation-callback cancellation, two-phase garbage
//! collection coordinated with the script engine, the exception bridge that
//! preserves host error identity across the boundary, compiled scripts with
//! code caching, statistics and CPU profiling.

pub mod adapter;
pub mod backend;
pub mod engine;
pub mod error;
pub mod exception;
pub mod heap;
pub mod local;
pub mod runtime;
pub mod script;

pub use adapter::NativeComponentAdapter;
pub use backend::{ContinuationFn, EngineBackend, ExecutionContext};
pub use engine::{
    Engine, EngineBuilder, EngineFlags, HeapInfo, InterruptHandle, LongMarshaling, StatsSnapshot,
    current_engine_id,
};
pub use error::{EngineError, EngineResult, FatalKind};
pub use exception::{
    HOST_EXCEPTION_PROPERTY, HostExceptionRef, HostInvocationError, HostThrown,
    ScriptEngineException, ScriptErrorPayload, host_exception_from_value, host_exception_of,
    host_exception_value,
};
pub use heap::{HeapCoordinator, SweepReport};
pub use local::LocalBackend;
pub use runtime::SharedRuntime;
pub use script::{CacheKind, CompiledScript, DocumentInfo, ModuleCategory};
