//! The fast native object protocol.
//!
//! A performance-sensitive host object can implement [`FastHostObject`]
//! directly, bypassing member-table binding: named and indexed get/set,
//! property queries, deletion, enumeration and method dispatch, plus
//! synchronous and asynchronous enumerators. Every operation defaults to an
//! explicit "not supported" failure — an unimplemented operation never
//! silently succeeds with a wrong default.
//!
//! Argument and result marshaling reuse the same exactness rules as the
//! conversion engine: [`FastArg`] wraps each positional argument with typed
//! try-get accessors, and [`FastResult`] accepts exactly one value per
//! property-get invocation.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use marten_value::{
    AccessError, AccessResult, Decimal128, FromScript, IntoScript, ScriptObject,
    ScriptObjectContract, ScriptValue, chrono::{DateTime, Utc}, next_host_object_id,
    num_bigint::BigInt,
};

/// Flags reported by a property query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyFlags {
    pub writable: bool,
    pub enumerable: bool,
    pub deletable: bool,
}

impl PropertyFlags {
    pub const READ_ONLY: Self = Self {
        writable: false,
        enumerable: true,
        deletable: false,
    };

    pub const READ_WRITE: Self = Self {
        writable: true,
        enumerable: true,
        deletable: true,
    };
}

/// One positional argument, with typed try-get accessors for every
/// primitive target plus object/host-object/script-object forms.
#[derive(Clone, Copy)]
pub struct FastArg<'a> {
    value: &'a ScriptValue,
}

impl<'a> FastArg<'a> {
    pub fn new(value: &'a ScriptValue) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &'a ScriptValue {
        self.value
    }

    pub fn is_truthy(&self) -> bool {
        self.value.to_boolean()
    }

    pub fn is_falsy(&self) -> bool {
        !self.value.to_boolean()
    }

    pub fn is_undefined(&self) -> bool {
        self.value.is_undefined()
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Typed try-get, sharing the conversion engine's exactness rules.
    pub fn try_get<T: FromScript>(&self) -> Option<T> {
        self.value.try_to::<T>()
    }

    /// Nullable form: `None` when incompatible, `Some(None)` for nullish.
    pub fn try_nullable<T: FromScript>(&self) -> Option<Option<T>> {
        self.value.try_to::<Option<T>>()
    }

    pub fn try_bool(&self) -> Option<bool> {
        self.try_get()
    }

    pub fn try_i8(&self) -> Option<i8> {
        self.try_get()
    }

    pub fn try_i16(&self) -> Option<i16> {
        self.try_get()
    }

    pub fn try_i32(&self) -> Option<i32> {
        self.try_get()
    }

    pub fn try_i64(&self) -> Option<i64> {
        self.try_get()
    }

    pub fn try_u8(&self) -> Option<u8> {
        self.try_get()
    }

    pub fn try_u16(&self) -> Option<u16> {
        self.try_get()
    }

    pub fn try_u32(&self) -> Option<u32> {
        self.try_get()
    }

    pub fn try_u64(&self) -> Option<u64> {
        self.try_get()
    }

    pub fn try_char(&self) -> Option<char> {
        self.try_get()
    }

    pub fn try_f32(&self) -> Option<f32> {
        self.try_get()
    }

    pub fn try_f64(&self) -> Option<f64> {
        self.try_get()
    }

    pub fn try_bigint(&self) -> Option<BigInt> {
        self.try_get()
    }

    pub fn try_decimal(&self) -> Option<Decimal128> {
        self.try_get()
    }

    pub fn try_string(&self) -> Option<String> {
        self.try_get()
    }

    pub fn try_date(&self) -> Option<DateTime<Utc>> {
        self.try_get()
    }

    /// Any object or function reference.
    pub fn try_object(&self) -> Option<ScriptObject> {
        self.value.as_object().cloned()
    }

    /// Only objects proxying a host target.
    pub fn try_host_object(&self) -> Option<ScriptObject> {
        self.value
            .as_object()
            .filter(|o| o.is_host_object())
            .cloned()
    }

    /// Only genuine script-side objects.
    pub fn try_script_object(&self) -> Option<ScriptObject> {
        self.value
            .as_object()
            .filter(|o| !o.is_host_object())
            .cloned()
    }
}

/// Positional argument pack for one fast-path invocation.
pub struct FastArgs<'a> {
    values: &'a [ScriptValue],
}

impl<'a> FastArgs<'a> {
    pub fn new(values: &'a [ScriptValue]) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<FastArg<'a>> {
        self.values.get(index).map(FastArg::new)
    }

    /// Argument at `index`, treating absence as undefined.
    pub fn arg(&self, index: usize) -> FastArg<'a> {
        static UNDEFINED: ScriptValue = ScriptValue::Undefined;
        self.get(index)
            .unwrap_or(FastArg { value: &UNDEFINED })
    }

    pub fn values(&self) -> &'a [ScriptValue] {
        self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = FastArg<'a>> + '_ {
        self.values.iter().map(FastArg::new)
    }
}

/// One-shot result slot for a fast-path property get.
///
/// Exactly one `set` call is permitted per invocation. A second call is a
/// programming error and fails fast by panicking — results are never
/// silently overwritten.
#[derive(Default)]
pub struct FastResult {
    value: Option<ScriptValue>,
}

impl FastResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, value: impl IntoScript) {
        if self.value.is_some() {
            panic!("FastResult::set called twice for one invocation");
        }
        self.value = Some(value.into_script());
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    pub fn take(&mut self) -> Option<ScriptValue> {
        self.value.take()
    }
}

/// A synchronous enumerator over a fast object's values.
pub type FastEnumerator = Box<dyn Iterator<Item = ScriptValue> + Send>;

/// An asynchronous enumerator: `next` resolves to `None` at the end.
pub trait FastAsyncEnumerator: Send {
    fn next(&mut self) -> Pin<Box<dyn Future<Output = Option<ScriptValue>> + Send + '_>>;
}

/// Direct-dispatch protocol for performance-sensitive host objects.
///
/// Default implementations fail with [`AccessError::NotSupported`]; a fast
/// object overrides the operations it actually supports. Where deletion is
/// supported, deleting an absent key is a successful no-op returning
/// `Ok(false)`.
#[allow(unused_variables)]
pub trait FastHostObject: Send + Sync {
    fn get_named(&self, name: &str, result: &mut FastResult) -> AccessResult<()> {
        Err(AccessError::NotSupported("fast get_named"))
    }

    fn set_named(&self, name: &str, value: FastArg<'_>) -> AccessResult<()> {
        Err(AccessError::NotSupported("fast set_named"))
    }

    fn query_named(&self, name: &str) -> AccessResult<PropertyFlags> {
        Err(AccessError::NotSupported("fast query_named"))
    }

    fn delete_named(&self, name: &str) -> AccessResult<bool> {
        Err(AccessError::NotSupported("fast delete_named"))
    }

    fn enumerate_names(&self) -> AccessResult<Vec<String>> {
        Err(AccessError::NotSupported("fast enumerate_names"))
    }

    fn get_indexed(&self, index: u32, result: &mut FastResult) -> AccessResult<()> {
        Err(AccessError::NotSupported("fast get_indexed"))
    }

    fn set_indexed(&self, index: u32, value: FastArg<'_>) -> AccessResult<()> {
        Err(AccessError::NotSupported("fast set_indexed"))
    }

    fn query_indexed(&self, index: u32) -> AccessResult<PropertyFlags> {
        Err(AccessError::NotSupported("fast query_indexed"))
    }

    fn delete_indexed(&self, index: u32) -> AccessResult<bool> {
        Err(AccessError::NotSupported("fast delete_indexed"))
    }

    fn enumerate_indices(&self) -> AccessResult<Vec<u32>> {
        Err(AccessError::NotSupported("fast enumerate_indices"))
    }

    /// Method dispatch without member-table binding.
    fn invoke_named(
        &self,
        name: &str,
        args: FastArgs<'_>,
        result: &mut FastResult,
    ) -> AccessResult<()> {
        Err(AccessError::NotSupported("fast invoke_named"))
    }

    fn enumerator(&self) -> AccessResult<FastEnumerator> {
        Err(AccessError::NotSupported("fast enumerator"))
    }

    fn async_enumerator(&self) -> AccessResult<Box<dyn FastAsyncEnumerator>> {
        Err(AccessError::NotSupported("fast async_enumerator"))
    }
}

/// Adapter exposing a fast object through the common object contract, so
/// engines host fast and member-table objects uniformly.
pub struct FastObjectAdapter {
    id: u64,
    engine_id: u64,
    inner: Arc<dyn FastHostObject>,
}

impl FastObjectAdapter {
    pub fn new(inner: Arc<dyn FastHostObject>) -> Self {
        Self {
            id: next_host_object_id(),
            engine_id: marten_value::HOST_ENGINE_ID,
            inner,
        }
    }

    pub fn with_engine_id(mut self, engine_id: u64) -> Self {
        self.engine_id = engine_id;
        self
    }

    pub fn into_object(self) -> ScriptObject {
        ScriptObject::new(Arc::new(self))
    }

    pub fn fast(&self) -> &Arc<dyn FastHostObject> {
        &self.inner
    }
}

impl ScriptObjectContract for FastObjectAdapter {
    fn object_id(&self) -> u64 {
        self.id
    }

    fn engine_id(&self) -> u64 {
        self.engine_id
    }

    fn get_property(&self, name: &str) -> AccessResult<ScriptValue> {
        let mut result = FastResult::new();
        self.inner.get_named(name, &mut result)?;
        Ok(result.take().unwrap_or(ScriptValue::Undefined))
    }

    fn set_property(&self, name: &str, value: ScriptValue) -> AccessResult<()> {
        self.inner.set_named(name, FastArg::new(&value))
    }

    fn get_index(&self, index: u32) -> AccessResult<ScriptValue> {
        let mut result = FastResult::new();
        self.inner.get_indexed(index, &mut result)?;
        Ok(result.take().unwrap_or(ScriptValue::Undefined))
    }

    fn set_index(&self, index: u32, value: ScriptValue) -> AccessResult<()> {
        self.inner.set_indexed(index, FastArg::new(&value))
    }

    fn invoke(&self, _args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        Err(AccessError::NotSupported("fast object is not callable"))
    }

    fn invoke_method(&self, name: &str, args: &[ScriptValue]) -> AccessResult<ScriptValue> {
        let mut result = FastResult::new();
        self.inner.invoke_named(name, FastArgs::new(args), &mut result)?;
        Ok(result.take().unwrap_or(ScriptValue::Undefined))
    }

    fn property_names(&self) -> Vec<String> {
        self.inner.enumerate_names().unwrap_or_default()
    }

    fn property_indices(&self) -> Vec<u32> {
        self.inner.enumerate_indices().unwrap_or_default()
    }

    fn host_target(&self) -> Option<&(dyn Any + Send + Sync)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_arg_accessors() {
        let v = ScriptValue::Int32(7);
        let arg = FastArg::new(&v);
        assert!(arg.is_truthy());
        assert!(!arg.is_falsy());
        assert_eq!(arg.try_i32(), Some(7));
        assert_eq!(arg.try_i64(), Some(7));
        assert_eq!(arg.try_string(), None);
        assert_eq!(arg.try_nullable::<i32>(), Some(Some(7)));

        let n = ScriptValue::Null;
        let arg = FastArg::new(&n);
        assert!(arg.is_null());
        assert!(!arg.is_undefined());
        assert_eq!(arg.try_nullable::<i32>(), Some(None));
        assert_eq!(arg.try_i32(), None);
    }

    #[test]
    fn test_fast_result_single_set() {
        let mut result = FastResult::new();
        assert!(!result.is_set());
        result.set(41i32);
        assert!(result.is_set());
        assert_eq!(result.take(), Some(ScriptValue::Int32(41)));
    }

    #[test]
    #[should_panic(expected = "FastResult::set called twice")]
    fn test_fast_result_double_set_fails_fast() {
        let mut result = FastResult::new();
        result.set(1i32);
        result.set(2i32);
    }

    #[test]
    fn test_missing_operation_is_not_supported() {
        struct Bare;
        impl FastHostObject for Bare {}
        let bare = Bare;
        assert!(matches!(
            bare.delete_named("x"),
            Err(AccessError::NotSupported(_))
        ));
        assert!(matches!(
            bare.enumerate_names(),
            Err(AccessError::NotSupported(_))
        ));
        let mut result = FastResult::new();
        assert!(matches!(
            bare.get_named("x", &mut result),
            Err(AccessError::NotSupported(_))
        ));
    }

    #[test]
    fn test_args_out_of_bounds_is_undefined() {
        let values = [ScriptValue::Int32(1)];
        let args = FastArgs::new(&values);
        assert_eq!(args.len(), 1);
        assert!(args.arg(5).is_undefined());
    }
}
