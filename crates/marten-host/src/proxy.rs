//! Host object and host type proxies.
//!
//! A [`HostObjectProxy`] exposes one host instance (or, for type proxies,
//! a type's statics and constructor) to script code through the
//! [`ScriptObjectContract`]: property get/set, overloaded method invocation,
//! multi-argument indexers, default-member tunneling and access control.
//! Dispatch order is always static binding first, then the dynamic bridge,
//! then an authoritative not-found.

use std::any::Any;
use std::sync::Arc;

use marten_value::{
    AccessError, AccessResult, ScriptFunction, ScriptObject, ScriptObjectContract, ScriptValue,
    ValueTag, next_host_object_id,
};

use crate::bind::{BindingCache, resolve_indexer, resolve_overload};
use crate::dynamic::{DispatchMode, DynamicHost};
use crate::member::{HostTarget, TypeDescriptor, Visibility};

/// Exposure options for one host object or type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExposureFlags {
    /// Flatten the target's members into the engine's root namespace.
    pub global_members: bool,
    /// Make private members script-visible.
    pub private_access: bool,
}

impl ExposureFlags {
    pub const DEFAULT: Self = Self {
        global_members: false,
        private_access: false,
    };

    pub fn global_members() -> Self {
        Self {
            global_members: true,
            ..Self::DEFAULT
        }
    }

    pub fn private_access() -> Self {
        Self {
            private_access: true,
            ..Self::DEFAULT
        }
    }
}

/// Gates visibility of internal (anonymous-type analogue) descriptors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AccessContext {
    #[default]
    Default,
    FullAccess,
}

/// Proxy binding a host target to the script-side object contract.
pub struct HostObjectProxy {
    id: u64,
    engine_id: u64,
    target: HostTarget,
    descriptor: Arc<TypeDescriptor>,
    flags: ExposureFlags,
    access: AccessContext,
    dynamic: Option<Arc<dyn DynamicHost>>,
    mode: DispatchMode,
    cache: BindingCache,
    is_type: bool,
}

impl HostObjectProxy {
    pub fn new(target: HostTarget, descriptor: Arc<TypeDescriptor>) -> Self {
        Self {
            id: next_host_object_id(),
            engine_id: marten_value::HOST_ENGINE_ID,
            target,
            descriptor,
            flags: ExposureFlags::DEFAULT,
            access: AccessContext::Default,
            dynamic: None,
            mode: DispatchMode::Full,
            cache: BindingCache::new(),
            is_type: false,
        }
    }

    /// A type proxy: no instance target, statics and constructor only.
    pub fn new_type(descriptor: Arc<TypeDescriptor>) -> Self {
        let mut proxy = Self::new(Arc::new(()), descriptor);
        proxy.is_type = true;
        proxy
    }

    /// Restricted exposure: the interface descriptor stands in for the
    /// target's own type, hiding everything it does not declare.
    pub fn restricted(target: HostTarget, interface: Arc<TypeDescriptor>) -> Self {
        Self::new(target, interface)
    }

    pub fn with_flags(mut self, flags: ExposureFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }

    pub fn with_engine_id(mut self, engine_id: u64) -> Self {
        self.engine_id = engine_id;
        self
    }

    /// Attach the dynamic bridge for targets opting into late binding.
    pub fn with_dynamic(mut self, dynamic: Arc<dyn DynamicHost>) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    /// Static-typing escape hatch: bypass the dynamic bridge entirely.
    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn into_object(self) -> ScriptObject {
        ScriptObject::new(Arc::new(self))
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    pub fn flags(&self) -> ExposureFlags {
        self.flags
    }

    /// Member names eligible for global-namespace flattening.
    pub fn global_member_names(&self) -> Vec<String> {
        self.descriptor.member_names(self.flags.private_access)
    }

    /// Conversion hint through the dynamic bridge. The boundary contract
    /// carries no conversion trap, so hosts consult this on the proxy
    /// directly; `StaticOnly` dispatch answers `None`.
    pub fn convert_hint(&self, target: ValueTag) -> Option<ScriptValue> {
        self.dynamic_bridge().and_then(|d| d.try_convert(target))
    }

    /// Deletes an indexed entry through the dynamic bridge, reporting
    /// whether the entry existed. Targets without deletion support fail;
    /// a miss on a supporting target is `Ok(false)`.
    pub fn delete_index(&self, key: &ScriptValue) -> AccessResult<bool> {
        if let Some(dynamic) = self.dynamic_bridge()
            && let Some(deleted) = dynamic.try_delete_index(key)
        {
            return Ok(deleted);
        }
        Err(AccessError::NotSupported("index deletion"))
    }

    fn dynamic_bridge(&self) -> Option<&Arc<dyn DynamicHost>> {
        if self.mode == DispatchMode::StaticOnly {
            return None;
        }
        self.dynamic.as_ref()
    }

    fn member_visible(&self, visibility: Visibility) -> bool {
        match visibility {
            Visibility::Public => true,
            Visibility::Private => self.flags.private_access,
            Visibility::Internal => {
                self.flags.private_access && self.access == AccessContext::FullAccess
            }
        }
    }

    /// Internal descriptors are invisible outside a full-access context.
    fn type_visible(&self) -> bool {
        !self.descriptor.is_internal() || self.access == AccessContext::FullAccess
    }

    fn bound_method(&self, name: &str) -> ScriptValue {
        ScriptValue::Function(ScriptFunction::new(Arc::new(BoundMethod {
            id: next_host_object_id(),
            engine_id: self.engine_id,
            target: self.target.clone(),
            descriptor: self.descriptor.clone(),
            name: name.to_string(),
            cache: BindingCache::new(),
        })))
    }

    fn bound_indexer(&self) -> ScriptValue {
        ScriptValue::Object(ScriptObject::new(Arc::new(BoundIndexer {
            id: next_host_object_id(),
            engine_id: self.engine_id,
            target: self.target.clone(),
            descriptor: self.descriptor.clone(),
        })))
    }

    fn indexer_get(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        let slot = resolve_indexer(self.descriptor.indexers(), args)?;
        (slot.getter)(&self.target, args)
    }
}

impl ScriptObjectContract for HostObjectProxy {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn engine_id(&self) -> u64 {
        self.engine_id
    }

    fn get_property(&self, name: &str) -> AccessResult<ScriptValue> {
        if !self.type_visible() {
            return Err(AccessError::not_found(name));
        }
        if let Some(slot) = self.descriptor.property(name)
            && self.member_visible(slot.visibility)
        {
            return match &slot.getter {
                Some(get) => get(&self.target),
                None => Err(AccessError::NotSupported("property has no getter")),
            };
        }
        if let Some(slot) = self.descriptor.method(name)
            && self.member_visible(slot.visibility)
        {
            return Ok(self.bound_method(name));
        }
        if self.descriptor.default_member() == Some(name) && !self.descriptor.indexers().is_empty()
        {
            return Ok(self.bound_indexer());
        }
        if let Some(dynamic) = self.dynamic_bridge()
            && let Some(value) = dynamic.try_get_member(name)
        {
            return Ok(value);
        }
        Err(AccessError::not_found(name))
    }

    fn set_property(&self, name: &str, value: ScriptValue) -> AccessResult<()> {
        if !self.type_visible() {
            return Err(AccessError::not_found(name));
        }
        if let Some(slot) = self.descriptor.property(name)
            && self.member_visible(slot.visibility)
        {
            return match &slot.setter {
                Some(set) => set(&self.target, value),
                None => Err(AccessError::NotSupported("property has no setter")),
            };
        }
        if let Some(dynamic) = self.dynamic_bridge()
            && dynamic.try_set_member(name, &value)
        {
            return Ok(());
        }
        Err(AccessError::not_found(name))
    }

    fn get_index(&self, index: u32) -> AccessResult<ScriptValue> {
        let args = [ScriptValue::Int64(index as i64)];
        match self.indexer_get(&args) {
            Err(AccessError::NotFound(_)) => {
                if let Some(dynamic) = self.dynamic_bridge()
                    && let Some(value) = dynamic.try_get_index(&args[0])
                {
                    return Ok(value);
                }
                Err(AccessError::not_found(format!("[{index}]")))
            }
            other => other,
        }
    }

    fn set_index(&self, index: u32, value: ScriptValue) -> AccessResult<()> {
        let key = ScriptValue::Int64(index as i64);
        let lookup = [key.clone()];
        if let Ok(slot) = resolve_indexer(self.descriptor.indexers(), &lookup) {
            if let Some(set) = &slot.setter {
                let args = [key, value];
                return set(&self.target, &args).map(|_| ());
            }
            return Err(AccessError::NotSupported("indexer has no setter"));
        }
        if let Some(dynamic) = self.dynamic_bridge()
            && dynamic.try_set_index(&key, &value)
        {
            return Ok(());
        }
        Err(AccessError::not_found(format!("[{index}]")))
    }

    fn invoke(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        if self.is_type {
            if let Some(make) = self.descriptor.constructor() {
                return make(args);
            }
            if let Some(dynamic) = self.dynamic_bridge()
                && let Some(result) = dynamic.try_create_instance(args)
            {
                return result;
            }
            return Err(AccessError::NotSupported("type has no constructor"));
        }
        // Calling an object without a member name tunnels through its
        // default indexed property.
        if !self.descriptor.indexers().is_empty() {
            match self.indexer_get(args) {
                Err(AccessError::NotFound(_)) => {}
                other => return other,
            }
        }
        if let Some(dynamic) = self.dynamic_bridge()
            && let Some(result) = dynamic.try_invoke(args)
        {
            return result;
        }
        Err(AccessError::NotSupported("host object is not callable"))
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        if !self.type_visible() {
            return Err(AccessError::not_found(name));
        }
        if let Some(slot) = self.descriptor.method(name)
            && self.member_visible(slot.visibility)
        {
            let overload = resolve_overload(name, &slot.overloads, args, &self.cache)?;
            return (overload.invoke)(&self.target, args);
        }
        if self.descriptor.default_member() == Some(name) && !self.descriptor.indexers().is_empty()
        {
            return self.indexer_get(args);
        }
        if let Some(slot) = self.descriptor.property(name)
            && self.member_visible(slot.visibility)
        {
            // Default-property tunneling: `obj.field(key)` resolves through
            // the default member of whatever `field` returns.
            if let Some(get) = &slot.getter {
                let value = get(&self.target)?;
                return tunnel_invoke(&value, args);
            }
        }
        if let Some(dynamic) = self.dynamic_bridge()
            && let Some(result) = dynamic.try_invoke_member(name, args)
        {
            return result;
        }
        Err(AccessError::not_found(name))
    }

    fn property_names(&self) -> Vec<String> {
        if !self.type_visible() {
            return Vec::new();
        }
        self.descriptor.member_names(self.flags.private_access)
    }

    fn property_indices(&self) -> Vec<u32> {
        Vec::new()
    }

    fn host_target(&self) -> Option<&(dyn Any + Send + Sync)> {
        if self.is_type { None } else { Some(&*self.target) }
    }
}

/// Invoke `value` with `args`, tunneling host-object default members and
/// calling script functions/objects directly.
pub fn tunnel_invoke(value: &ScriptValue, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
    match value {
        ScriptValue::Function(f) => f.call(args),
        ScriptValue::Object(o) => o.invoke(args),
        _ => Err(AccessError::NotSupported("value is not callable")),
    }
}

/// Extract a plain-callable form from a boundary value.
///
/// Works for bound methods, script functions and callable host objects;
/// deliberately independent of whether the source is constructor-invocable.
pub fn to_callable(value: &ScriptValue) -> Option<ScriptFunction> {
    match value {
        ScriptValue::Function(f) => Some(f.clone()),
        ScriptValue::Object(o) => Some(ScriptFunction::from_object(o.clone())),
        _ => None,
    }
}

/// A method bound to its target, exposed as a callable.
struct BoundMethod {
    id: u64,
    engine_id: u64,
    target: HostTarget,
    descriptor: Arc<TypeDescriptor>,
    name: String,
    cache: BindingCache,
}

impl ScriptObjectContract for BoundMethod {
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
        let slot = self
            .descriptor
            .method(&self.name)
            .ok_or_else(|| AccessError::not_found(self.name.clone()))?;
        let overload = resolve_overload(&self.name, &slot.overloads, args, &self.cache)?;
        (overload.invoke)(&self.target, args)
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        // `method.call(...)` convention for engines without call syntax.
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

/// The default indexed property, reified so engines without indexer syntax
/// can use explicit `get`/`set` calls.
struct BoundIndexer {
    id: u64,
    engine_id: u64,
    target: HostTarget,
    descriptor: Arc<TypeDescriptor>,
}

impl BoundIndexer {
    fn get(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        let slot = resolve_indexer(self.descriptor.indexers(), args)?;
        (slot.getter)(&self.target, args)
    }

    fn set(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        if args.is_empty() {
            return Err(AccessError::NotSupported("indexer set needs a value"));
        }
        let keys = &args[..args.len() - 1];
        let slot = resolve_indexer(self.descriptor.indexers(), keys)?;
        match &slot.setter {
            Some(set) => set(&self.target, args),
            None => Err(AccessError::NotSupported("indexer has no setter")),
        }
    }
}

impl ScriptObjectContract for BoundIndexer {
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
        self.get(&[ScriptValue::Int64(index as i64)])
    }

    fn set_index(&self, index: u32, value: ScriptValue) -> AccessResult<()> {
        self.set(&[ScriptValue::Int64(index as i64), value]).map(|_| ())
    }

    fn invoke(&self, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        self.get(args)
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        match name {
            "get" => self.get(args),
            "set" => self.set(args),
            _ => Err(AccessError::not_found(name)),
        }
    }

    fn property_names(&self) -> Vec<String> {
        vec!["get".to_string(), "set".to_string()]
    }

    fn property_indices(&self) -> Vec<u32> {
        Vec::new()
    }
}
