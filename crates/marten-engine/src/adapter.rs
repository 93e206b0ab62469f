//! Pluggable adapters for externally built native components.

use marten_value::ScriptObject;

/// Resolves named native components into script-exposable objects.
///
/// Adapters are consulted in registration order; the first one that
/// recognizes a name wins. A component resolved this way is pinned and
/// exposed exactly like a directly added host object.
pub trait NativeComponentAdapter: Send + Sync {
    /// Stable name of this adapter, for diagnostics.
    fn adapter_name(&self) -> &str;

    /// Wraps the named component, or `None` when this adapter does not
    /// provide it.
    fn resolve(&self, component: &str) -> Option<ScriptObject>;
}
