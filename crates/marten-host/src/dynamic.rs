//! Late-bound dispatch for host objects that opt into it.
//!
//! A host object implementing [`DynamicHost`] intercepts member access after
//! static binding misses. Each capability reports its own authoritative
//! hit/miss; a miss at the dynamic layer is a definitive "missing member",
//! never silently absorbed. Script code can force static-only resolution
//! with [`DispatchMode::StaticOnly`].

use marten_value::{AccessResult, ScriptValue, ValueTag};

/// How a proxy routes member access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Static binding first, then the dynamic bridge.
    #[default]
    Full,
    /// Resolve against the declared member table only, bypassing the
    /// dynamic bridge entirely.
    StaticOnly,
}

/// The dynamic capability set.
///
/// Every operation defaults to a miss, so implementors override only what
/// they support. `Option` is the hit/miss channel; the inner `AccessResult`
/// carries failures from operations that did claim the access.
#[allow(unused_variables)]
pub trait DynamicHost: Send + Sync {
    fn try_get_member(&self, name: &str) -> Option<ScriptValue> {
        None
    }

    fn try_set_member(&self, name: &str, value: &ScriptValue) -> bool {
        false
    }

    fn try_invoke_member(&self, name: &str, args: &[ScriptValue]) -> Option<AccessResult<ScriptValue>> {
        None
    }

    /// Invoke the object itself (call).
    fn try_invoke(&self, args: &[ScriptValue]) -> Option<AccessResult<ScriptValue>> {
        None
    }

    fn try_create_instance(&self, args: &[ScriptValue]) -> Option<AccessResult<ScriptValue>> {
        None
    }

    /// Convert the object to the requested tag.
    fn try_convert(&self, target: ValueTag) -> Option<ScriptValue> {
        None
    }

    fn try_get_index(&self, index: &ScriptValue) -> Option<ScriptValue> {
        None
    }

    fn try_set_index(&self, index: &ScriptValue, value: &ScriptValue) -> bool {
        false
    }

    /// `Some(removed)` when deletion is supported; deleting an absent key is
    /// a successful no-op reporting `false`.
    fn try_delete_index(&self, index: &ScriptValue) -> Option<bool> {
        None
    }
}
