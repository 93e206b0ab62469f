//! The boundary value model.
//!
//! `ScriptValue` is the tagged union every value takes while crossing the
//! host/script boundary. Each value carries exactly one tag; numeric tags
//! carry their exact width. Heap-backed tags (`BigInt`, `String`, object and
//! function references) are `Arc`-backed so values stay cheap to clone and
//! `Send + Sync`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_traits::Zero;

use crate::object::{ScriptFunction, ScriptObject};

/// Tag identifying the dynamic type of a [`ScriptValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueTag {
    Undefined,
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    BigInt,
    String,
    Date,
    Object,
    Function,
}

impl std::fmt::Display for ValueTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueTag::Undefined => "undefined",
            ValueTag::Null => "null",
            ValueTag::Boolean => "boolean",
            ValueTag::Int32 => "int32",
            ValueTag::Int64 => "int64",
            ValueTag::Float32 => "float32",
            ValueTag::Float64 => "float64",
            ValueTag::BigInt => "bigint",
            ValueTag::String => "string",
            ValueTag::Date => "date",
            ValueTag::Object => "object",
            ValueTag::Function => "function",
        };
        f.write_str(name)
    }
}

/// A value as seen by script-side code, tagged by its dynamic type.
#[derive(Debug, Clone)]
pub enum ScriptValue {
    Undefined,
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    BigInt(Arc<BigInt>),
    String(Arc<str>),
    Date(DateTime<Utc>),
    Object(ScriptObject),
    Function(ScriptFunction),
}

impl ScriptValue {
    /// Build a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Self::String(Arc::from(s.as_ref()))
    }

    /// Build a BigInt value.
    pub fn bigint(b: impl Into<BigInt>) -> Self {
        Self::BigInt(Arc::new(b.into()))
    }

    pub fn tag(&self) -> ValueTag {
        match self {
            Self::Undefined => ValueTag::Undefined,
            Self::Null => ValueTag::Null,
            Self::Boolean(_) => ValueTag::Boolean,
            Self::Int32(_) => ValueTag::Int32,
            Self::Int64(_) => ValueTag::Int64,
            Self::Float32(_) => ValueTag::Float32,
            Self::Float64(_) => ValueTag::Float64,
            Self::BigInt(_) => ValueTag::BigInt,
            Self::String(_) => ValueTag::String,
            Self::Date(_) => ValueTag::Date,
            Self::Object(_) => ValueTag::Object,
            Self::Function(_) => ValueTag::Function,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null or undefined: both mean "no value" for nullable targets.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Null | Self::Undefined)
    }

    pub fn as_object(&self) -> Option<&ScriptObject> {
        match self {
            Self::Object(o) => Some(o),
            Self::Function(f) => Some(f.as_object()),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&ScriptFunction> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Script-native truthiness, derived from the value's original tag.
    ///
    /// Zero (including negative zero), NaN, the empty string, null and
    /// undefined are falsy; objects, functions and dates are always truthy.
    /// This is independent of, but consistent with, conversion outcomes.
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Boolean(b) => *b,
            Self::Int32(n) => *n != 0,
            Self::Int64(n) => *n != 0,
            Self::Float32(n) => *n != 0.0 && !n.is_nan(),
            Self::Float64(n) => *n != 0.0 && !n.is_nan(),
            Self::BigInt(b) => !b.is_zero(),
            Self::String(s) => !s.is_empty(),
            Self::Date(_) | Self::Object(_) | Self::Function(_) => true,
        }
    }
}

impl Default for ScriptValue {
    fn default() -> Self {
        Self::Undefined
    }
}

/// Equality is per-tag; numeric tags compare within their own width only.
/// Object and function references compare by identity.
impl PartialEq for ScriptValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Int32(a), Self::Int32(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float32(a), Self::Float32(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Function(a), Self::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for ScriptValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i32> for ScriptValue {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for ScriptValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for ScriptValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<&str> for ScriptValue {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<String> for ScriptValue {
    fn from(v: String) -> Self {
        Self::string(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness_by_tag() {
        assert!(!ScriptValue::Undefined.to_boolean());
        assert!(!ScriptValue::Null.to_boolean());
        assert!(!ScriptValue::Boolean(false).to_boolean());
        assert!(ScriptValue::Boolean(true).to_boolean());
        assert!(!ScriptValue::Int32(0).to_boolean());
        assert!(ScriptValue::Int32(-1).to_boolean());
        assert!(!ScriptValue::Float64(0.0).to_boolean());
        assert!(!ScriptValue::Float64(-0.0).to_boolean());
        assert!(!ScriptValue::Float64(f64::NAN).to_boolean());
        assert!(ScriptValue::Float64(0.5).to_boolean());
        assert!(!ScriptValue::bigint(0).to_boolean());
        assert!(ScriptValue::bigint(-7).to_boolean());
        assert!(!ScriptValue::string("").to_boolean());
        assert!(ScriptValue::string("x").to_boolean());
        assert!(ScriptValue::Date(Utc::now()).to_boolean());
    }

    #[test]
    fn test_equality_is_per_tag() {
        assert_ne!(ScriptValue::Int32(1), ScriptValue::Int64(1));
        assert_ne!(ScriptValue::Float64(1.0), ScriptValue::Int32(1));
        assert_eq!(ScriptValue::string("a"), ScriptValue::string("a"));
        assert_eq!(ScriptValue::bigint(42), ScriptValue::bigint(42));
    }

    #[test]
    fn test_nullish() {
        assert!(ScriptValue::Null.is_nullish());
        assert!(ScriptValue::Undefined.is_nullish());
        assert!(!ScriptValue::Int32(0).is_nullish());
    }
}
