//! Shared runtime state.
//!
//! Engines created from the same [`SharedRuntime`] observe one set of
//! resource limits. Changing a limit through any participating engine is
//! immediately visible to all of them.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default heap ceiling. Zero means unlimited.
pub const DEFAULT_HEAP_LIMIT: usize = 0;

/// Default script stack depth.
pub const DEFAULT_STACK_DEPTH: usize = 256;

/// Default interval between heap size samples, in executed statements.
pub const DEFAULT_HEAP_SAMPLING_INTERVAL: u64 = 16;

/// Resource limits and accounting shared by a group of engines.
#[derive(Debug)]
pub struct SharedRuntime {
    heap_limit: AtomicUsize,
    stack_depth: AtomicUsize,
    heap_sampling_interval: AtomicU64,
    heap_used: AtomicUsize,
    next_engine_id: AtomicU64,
}

impl SharedRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            heap_limit: AtomicUsize::new(DEFAULT_HEAP_LIMIT),
            stack_depth: AtomicUsize::new(DEFAULT_STACK_DEPTH),
            heap_sampling_interval: AtomicU64::new(DEFAULT_HEAP_SAMPLING_INTERVAL),
            heap_used: AtomicUsize::new(0),
            next_engine_id: AtomicU64::new(1),
        })
    }

    /// Maximum script heap size in bytes; zero disables the check.
    pub fn heap_limit(&self) -> usize {
        self.heap_limit.load(Ordering::Acquire)
    }

    pub fn set_heap_limit(&self, bytes: usize) {
        self.heap_limit.store(bytes, Ordering::Release);
    }

    pub fn stack_depth(&self) -> usize {
        self.stack_depth.load(Ordering::Acquire)
    }

    pub fn set_stack_depth(&self, frames: usize) {
        self.stack_depth.store(frames, Ordering::Release);
    }

    pub fn heap_sampling_interval(&self) -> u64 {
        self.heap_sampling_interval.load(Ordering::Acquire)
    }

    pub fn set_heap_sampling_interval(&self, statements: u64) {
        self.heap_sampling_interval
            .store(statements.max(1), Ordering::Release);
    }

    /// Current tracked heap usage across all participating engines.
    pub fn heap_used(&self) -> usize {
        self.heap_used.load(Ordering::Acquire)
    }

    pub(crate) fn charge(&self, bytes: usize) {
        self.heap_used.fetch_add(bytes, Ordering::AcqRel);
    }

    pub(crate) fn release(&self, bytes: usize) {
        let mut current = self.heap_used.load(Ordering::Acquire);
        loop {
            let next = current.saturating_sub(bytes);
            match self.heap_used.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Whether tracked usage currently exceeds the configured limit.
    pub fn over_limit(&self) -> bool {
        let limit = self.heap_limit();
        limit != 0 && self.heap_used() > limit
    }

    pub(crate) fn next_engine_id(&self) -> u64 {
        self.next_engine_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_propagate_through_shared_handle() {
        let runtime = SharedRuntime::new();
        let other = runtime.clone();
        runtime.set_heap_limit(4096);
        assert_eq!(other.heap_limit(), 4096);
        other.set_stack_depth(8);
        assert_eq!(runtime.stack_depth(), 8);
    }

    #[test]
    fn test_heap_accounting_never_underflows() {
        let runtime = SharedRuntime::new();
        runtime.charge(100);
        runtime.release(500);
        assert_eq!(runtime.heap_used(), 0);
    }

    #[test]
    fn test_over_limit_requires_nonzero_limit() {
        let runtime = SharedRuntime::new();
        runtime.charge(1 << 20);
        assert!(!runtime.over_limit());
        runtime.set_heap_limit(1024);
        assert!(runtime.over_limit());
    }
}
