//! Object and function references crossing the boundary.
//!
//! A [`ScriptObject`] is a handle to something that lives on the other side
//! of the boundary — a script-side object projected into the host, or a host
//! object proxied into script. The backing implementation is a trait object
//! so engines and proxies plug in symmetrically.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::{AccessError, AccessResult};
use crate::value::ScriptValue;

/// The operations every boundary-crossing object supports.
///
/// Implemented by script engines (projecting script objects into the host)
/// and by host proxies (projecting host objects into script). Named and
/// indexed access are separate operations; enumeration of names and of
/// integer indices are separate as well.
pub trait ScriptObjectContract: Send + Sync {
    /// Stable identity of the underlying object. Two handles with equal
    /// `(engine_id, object_id)` refer to the same object.
    fn object_id(&self) -> u64;

    /// The engine (or host registry) this object belongs to. A handle must
    /// not outlive the engine identified here.
    fn engine_id(&self) -> u64;

    fn get_property(&self, name: &str) -> AccessResult<ScriptValue>;

    fn set_property(&self, name: &str, value: ScriptValue) -> AccessResult<()>;

    fn get_index(&self, index: u32) -> AccessResult<ScriptValue>;

    fn set_index(&self, index: u32, value: ScriptValue) -> AccessResult<()>;

    /// Invoke the object itself (function call).
    fn invoke(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue>;

    /// Invoke a named member with positional arguments.
    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue>;

    /// All enumerable property names, in the object's own order.
    fn property_names(&self) -> Vec<String>;

    /// All integer-indexed properties, ascending.
    fn property_indices(&self) -> Vec<u32>;

    /// The wrapped host target, when this handle proxies a host object back
    /// across the boundary. `None` for genuine script objects.
    fn host_target(&self) -> Option<&(dyn Any + Send + Sync)> {
        None
    }
}

/// A reference-counted handle to a boundary-crossing object.
#[derive(Clone)]
pub struct ScriptObject {
    inner: Arc<dyn ScriptObjectContract>,
}

impl ScriptObject {
    pub fn new(contract: Arc<dyn ScriptObjectContract>) -> Self {
        Self { inner: contract }
    }

    pub fn contract(&self) -> &Arc<dyn ScriptObjectContract> {
        &self.inner
    }

    pub fn object_id(&self) -> u64 {
        self.inner.object_id()
    }

    pub fn engine_id(&self) -> u64 {
        self.inner.engine_id()
    }

    pub fn get(&self, name: &str) -> AccessResult<ScriptValue> {
        self.inner.get_property(name)
    }

    pub fn set(&self, name: &str, value: ScriptValue) -> AccessResult<()> {
        self.inner.set_property(name, value)
    }

    pub fn get_index(&self, index: u32) -> AccessResult<ScriptValue> {
        self.inner.get_index(index)
    }

    pub fn set_index(&self, index: u32, value: ScriptValue) -> AccessResult<()> {
        self.inner.set_index(index, value)
    }

    pub fn invoke(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        self.inner.invoke(args)
    }

    pub fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        self.inner.invoke_method(name, args)
    }

    pub fn property_names(&self) -> Vec<String> {
        self.inner.property_names()
    }

    pub fn property_indices(&self) -> Vec<u32> {
        self.inner.property_indices()
    }

    /// Downcast the wrapped host target, if any.
    pub fn host_target_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.host_target().and_then(|t| t.downcast_ref())
    }

    pub fn is_host_object(&self) -> bool {
        self.inner.host_target().is_some()
    }
}

/// Identity equality: same engine, same underlying object.
impl PartialEq for ScriptObject {
    fn eq(&self, other: &Self) -> bool {
        self.engine_id() == other.engine_id() && self.object_id() == other.object_id()
    }
}

impl Eq for ScriptObject {}

impl std::fmt::Debug for ScriptObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptObject")
            .field("engine_id", &self.engine_id())
            .field("object_id", &self.object_id())
            .finish()
    }
}

/// A callable boundary-crossing object.
#[derive(Clone, PartialEq, Eq)]
pub struct ScriptFunction {
    object: ScriptObject,
}

impl ScriptFunction {
    pub fn new(contract: Arc<dyn ScriptObjectContract>) -> Self {
        Self {
            object: ScriptObject::new(contract),
        }
    }

    pub fn from_object(object: ScriptObject) -> Self {
        Self { object }
    }

    pub fn as_object(&self) -> &ScriptObject {
        &self.object
    }

    pub fn call(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        self.object.invoke(args)
    }
}

impl std::fmt::Debug for ScriptFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptFunction")
            .field("engine_id", &self.object.engine_id())
            .field("object_id", &self.object.object_id())
            .finish()
    }
}

/// Engine id used for host-owned objects that belong to no script engine.
pub const HOST_ENGINE_ID: u64 = 0;

static NEXT_HOST_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique id for a host-owned boundary object.
pub fn next_host_object_id() -> u64 {
    NEXT_HOST_OBJECT_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A memberless wrapper carrying a host value across the boundary.
///
/// This is the minimal "wrapped comparable" form: the value exposes no
/// members of its own, only identity and a downcastable host target. Full
/// member exposure is the host proxy's job, one layer up.
pub struct HostBox<T: Any + Send + Sync> {
    id: u64,
    value: T,
}

impl<T: Any + Send + Sync> HostBox<T> {
    pub fn new(value: T) -> Self {
        Self {
            id: next_host_object_id(),
            value,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Any + Send + Sync> ScriptObjectContract for HostBox<T> {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn engine_id(&self) -> u64 {
        HOST_ENGINE_ID
    }

    fn get_property(&self, _name: &str) -> AccessResult<ScriptValue> {
        Err(AccessError::NotSupported("host value exposes no members"))
    }

    fn set_property(&self, _name: &str, _value: ScriptValue) -> AccessResult<()> {
        Err(AccessError::NotSupported("host value exposes no members"))
    }

    fn get_index(&self, _index: u32) -> AccessResult<ScriptValue> {
        Err(AccessError::NotSupported("host value exposes no members"))
    }

    fn set_index(&self, _index: u32, _value: ScriptValue) -> AccessResult<()> {
        Err(AccessError::NotSupported("host value exposes no members"))
    }

    fn invoke(&self, _args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        Err(AccessError::NotSupported("host value is not callable"))
    }

    fn invoke_method(&self, _name: &str, _args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        Err(AccessError::NotSupported("host value exposes no members"))
    }

    fn property_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn property_indices(&self) -> Vec<u32> {
        Vec::new()
    }

    fn host_target(&self) -> Option<&(dyn Any + Send + Sync)> {
        Some(&self.value)
    }
}

/// Wrap a host value in a memberless boundary object.
pub fn host_box<T: Any + Send + Sync>(value: T) -> ScriptObject {
    ScriptObject::new(Arc::new(HostBox::new(value)))
}
