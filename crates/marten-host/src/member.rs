//! Host member tables.
//!
//! Rust has no runtime reflection, so hosts describe their types up front:
//! a [`TypeDescriptor`] is the registration-built analogue of a reflection
//! table — properties, method overload sets, indexers, a default member and
//! per-member visibility. Descriptors are immutable once built and shared
//! behind `Arc`.

use std::any::Any;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use marten_value::{AccessResult, ScriptValue, ValueTag};

/// A type-erased host instance shared across the boundary.
pub type HostTarget = Arc<dyn Any + Send + Sync>;

/// Instance method body: receives the (type-erased) target and arguments.
pub type MethodFn = Arc<dyn Fn(&HostTarget, &[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync>;

/// Property getter body.
pub type GetterFn = Arc<dyn Fn(&HostTarget) -> AccessResult<ScriptValue> + Send + Sync>;

/// Property setter body.
pub type SetterFn = Arc<dyn Fn(&HostTarget, ScriptValue) -> AccessResult<()> + Send + Sync>;

/// Free-standing callable (constructors, static methods).
pub type StaticFn = Arc<dyn Fn(&[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync>;

/// Member visibility. Only `Public` members are script-visible by default;
/// `Private` requires the private-access exposure flag, `Internal`
/// additionally requires a full-access context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Internal,
}

/// Declared parameter type, used for overload scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Any,
    Bool,
    Int32,
    Int64,
    Float64,
    BigInt,
    Decimal,
    String,
    Date,
    Object,
    Function,
}

impl ParamType {
    /// Compatibility score of an argument against this parameter.
    ///
    /// `Some(0)` exact tag match, `Some(1)` lossless widening, `Some(2)`
    /// convertible with a range check, `Some(3)` catch-all. `None` means
    /// incompatible. Lower totals win overload resolution.
    pub fn score(&self, arg: &ScriptValue) -> Option<u8> {
        use marten_value::{Decimal128, FromScript};
        let tag = arg.tag();
        match self {
            ParamType::Any => Some(3),
            ParamType::Bool => (tag == ValueTag::Boolean).then_some(0),
            ParamType::Int32 => match tag {
                ValueTag::Int32 => Some(0),
                _ => arg.try_to::<i32>().map(|_| 2),
            },
            ParamType::Int64 => match tag {
                ValueTag::Int64 => Some(0),
                ValueTag::Int32 => Some(1),
                _ => arg.try_to::<i64>().map(|_| 2),
            },
            ParamType::Float64 => match tag {
                ValueTag::Float64 => Some(0),
                ValueTag::Float32 | ValueTag::Int32 => Some(1),
                _ => arg.try_to::<f64>().map(|_| 2),
            },
            ParamType::BigInt => match tag {
                ValueTag::BigInt => Some(0),
                ValueTag::Int32 | ValueTag::Int64 => Some(1),
                _ => arg.try_to::<marten_value::num_bigint::BigInt>().map(|_| 2),
            },
            ParamType::Decimal => arg
                .try_to::<Decimal128>()
                .map(|_| if tag == ValueTag::Object { 0 } else { 2 }),
            ParamType::String => {
                (String::from_script(arg).is_ok()).then(|| if tag == ValueTag::String { 0 } else { 2 })
            }
            ParamType::Date => (tag == ValueTag::Date).then_some(0),
            ParamType::Object => matches!(tag, ValueTag::Object | ValueTag::Function).then_some(0),
            ParamType::Function => (tag == ValueTag::Function).then_some(0),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Any => "any",
            ParamType::Bool => "bool",
            ParamType::Int32 => "i32",
            ParamType::Int64 => "i64",
            ParamType::Float64 => "f64",
            ParamType::BigInt => "bigint",
            ParamType::Decimal => "decimal",
            ParamType::String => "string",
            ParamType::Date => "date",
            ParamType::Object => "object",
            ParamType::Function => "function",
        }
    }
}

/// One concrete overload of a method.
pub struct MethodOverload {
    pub params: SmallVec<[ParamType; 4]>,
    pub invoke: MethodFn,
}

/// A named method with its overload set.
pub struct MethodSlot {
    pub overloads: Vec<MethodOverload>,
    pub visibility: Visibility,
}

/// A named property.
pub struct PropertySlot {
    pub getter: Option<GetterFn>,
    pub setter: Option<SetterFn>,
    pub visibility: Visibility,
}

/// An indexed property. `params` is the key signature; multi-argument
/// indexers carry more than one entry. Setters receive the keys followed by
/// the value as the final argument.
pub struct IndexerSlot {
    pub params: SmallVec<[ParamType; 4]>,
    pub getter: MethodFn,
    pub setter: Option<MethodFn>,
}

/// The registered member table for a host type.
pub struct TypeDescriptor {
    name: String,
    internal: bool,
    properties: FxHashMap<String, PropertySlot>,
    methods: FxHashMap<String, MethodSlot>,
    indexers: Vec<IndexerSlot>,
    default_member: Option<String>,
    constructor: Option<StaticFn>,
}

impl TypeDescriptor {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Anonymous/internal types are visible only to a full-access context.
    pub fn is_internal(&self) -> bool {
        self.internal
    }

    pub fn property(&self, name: &str) -> Option<&PropertySlot> {
        self.properties.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodSlot> {
        self.methods.get(name)
    }

    pub fn indexers(&self) -> &[IndexerSlot] {
        &self.indexers
    }

    /// The default indexed member's script name, when one exists.
    pub fn default_member(&self) -> Option<&str> {
        self.default_member.as_deref()
    }

    pub fn constructor(&self) -> Option<&StaticFn> {
        self.constructor.as_ref()
    }

    /// All member names at or below the given visibility bar.
    pub fn member_names(&self, include_private: bool) -> Vec<String> {
        let visible = |v: Visibility| v == Visibility::Public || include_private;
        let mut names: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, p)| visible(p.visibility))
            .map(|(n, _)| n.clone())
            .chain(
                self.methods
                    .iter()
                    .filter(|(_, m)| visible(m.visibility))
                    .map(|(n, _)| n.clone()),
            )
            .collect();
        if let Some(d) = &self.default_member {
            if !names.iter().any(|n| n == d) {
                names.push(d.clone());
            }
        }
        names.sort();
        names
    }
}

impl std::fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .field("indexers", &self.indexers.len())
            .field("default_member", &self.default_member)
            .finish()
    }
}

/// Fluent builder over a concrete host type `T`. Closures receive `&T`;
/// the builder wraps them with the downcast from the type-erased target.
pub struct TypeDescriptorBuilder<T> {
    descriptor: TypeDescriptor,
    _marker: std::marker::PhantomData<fn(&T)>,
}

fn downcast<T: Any + Send + Sync>(target: &HostTarget) -> &T {
    // The proxy layer guarantees target/descriptor pairing; a mismatch is a
    // registration bug, reported loudly.
    target
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("host target is not a {}", std::any::type_name::<T>()))
}

impl<T: Any + Send + Sync> TypeDescriptorBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: TypeDescriptor {
                name: name.into(),
                internal: false,
                properties: FxHashMap::default(),
                methods: FxHashMap::default(),
                indexers: Vec::new(),
                default_member: None,
                constructor: None,
            },
            _marker: std::marker::PhantomData,
        }
    }

    /// Mark the whole type internal (anonymous-type analogue).
    pub fn internal(mut self) -> Self {
        self.descriptor.internal = true;
        self
    }

    pub fn getter(
        self,
        name: impl Into<String>,
        get: impl Fn(&T) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        self.getter_with(name, Visibility::Public, get)
    }

    pub fn getter_with(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        get: impl Fn(&T) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let slot = self
            .descriptor
            .properties
            .entry(name)
            .or_insert(PropertySlot {
                getter: None,
                setter: None,
                visibility,
            });
        slot.getter = Some(Arc::new(move |t| get(downcast::<T>(t))));
        slot.visibility = visibility;
        self
    }

    pub fn setter(
        self,
        name: impl Into<String>,
        set: impl Fn(&T, ScriptValue) -> AccessResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.setter_with(name, Visibility::Public, set)
    }

    pub fn setter_with(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        set: impl Fn(&T, ScriptValue) -> AccessResult<()> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let slot = self
            .descriptor
            .properties
            .entry(name)
            .or_insert(PropertySlot {
                getter: None,
                setter: None,
                visibility,
            });
        slot.setter = Some(Arc::new(move |t, v| set(downcast::<T>(t), v)));
        slot.visibility = visibility;
        self
    }

    pub fn method(
        self,
        name: impl Into<String>,
        params: &[ParamType],
        body: impl Fn(&T, &[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        self.method_with(name, Visibility::Public, params, body)
    }

    /// Add one overload. Calling again with the same name extends the
    /// overload set.
    pub fn method_with(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        params: &[ParamType],
        body: impl Fn(&T, &[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        let slot = self
            .descriptor
            .methods
            .entry(name.into())
            .or_insert(MethodSlot {
                overloads: Vec::new(),
                visibility,
            });
        slot.overloads.push(MethodOverload {
            params: SmallVec::from_slice(params),
            invoke: Arc::new(move |t, args| body(downcast::<T>(t), args)),
        });
        self
    }

    pub fn indexer(
        mut self,
        params: &[ParamType],
        get: impl Fn(&T, &[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        self.descriptor.indexers.push(IndexerSlot {
            params: SmallVec::from_slice(params),
            getter: Arc::new(move |t, args| get(downcast::<T>(t), args)),
            setter: None,
        });
        self
    }

    pub fn indexer_with_setter(
        mut self,
        params: &[ParamType],
        get: impl Fn(&T, &[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync + 'static,
        set: impl Fn(&T, &[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        self.descriptor.indexers.push(IndexerSlot {
            params: SmallVec::from_slice(params),
            getter: Arc::new(move |t, args| get(downcast::<T>(t), args)),
            setter: Some(Arc::new(move |t, args| set(downcast::<T>(t), args))),
        });
        self
    }

    /// Name the default indexed member (e.g. `Item`). Chained calls without
    /// an explicit member name tunnel through it.
    pub fn default_member(mut self, name: impl Into<String>) -> Self {
        self.descriptor.default_member = Some(name.into());
        self
    }

    pub fn constructor(
        mut self,
        make: impl Fn(&[ScriptValue]) -> AccessResult<ScriptValue> + Send + Sync + 'static,
    ) -> Self {
        self.descriptor.constructor = Some(Arc::new(make));
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(self.descriptor)
    }
}
