//! The primitive conversion engine.
//!
//! `FromScript` converts a boundary [`ScriptValue`] into a host type;
//! `IntoScript` converts a host value back. Conversions are exact: a value
//! either converts losslessly or the attempt fails — out-of-range inputs
//! are never saturated, wrapped or truncated. Conversions are pure (no
//! shared state) and may be attempted repeatedly.
//!
//! Safe-integer thresholds are explicit constants rather than assumed IEEE
//! defaults: a double round-trips integers only up to 2^53 − 1, a 32-bit
//! float only up to 2^24.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive};

use crate::decimal::Decimal128;
use crate::error::{ConvertError, ConvertResult};
use crate::object::{ScriptFunction, ScriptObject};
use crate::value::ScriptValue;

/// Largest integer magnitude a 64-bit float represents exactly: 2^53 − 1.
pub const MAX_SAFE_INTEGER_F64: i64 = (1i64 << 53) - 1;

/// Largest integer magnitude a 32-bit float represents exactly: 2^24.
pub const MAX_SAFE_INTEGER_F32: i64 = 1i64 << 24;

/// Convert a boundary value into a host type.
///
/// Mirrors the host side of the marshaling matrix: each implementation
/// accepts exactly the source tags that can represent the target without
/// loss, and fails cleanly otherwise.
pub trait FromScript: Sized {
    /// Target name used in error messages.
    const TARGET: &'static str;

    fn from_script(value: &ScriptValue) -> ConvertResult<Self>;
}

/// Convert a host value into a boundary value.
pub trait IntoScript {
    fn into_script(self) -> ScriptValue;
}

impl ScriptValue {
    /// Attempt a conversion, discarding the failure reason.
    pub fn try_to<T: FromScript>(&self) -> Option<T> {
        T::from_script(self).ok()
    }

    /// Attempt a conversion, keeping the failure reason.
    pub fn convert<T: FromScript>(&self) -> ConvertResult<T> {
        T::from_script(self)
    }
}

// ---------------------------------------------------------------------------
// Wrapped host values
// ---------------------------------------------------------------------------

/// Unwrap a host-wrapped comparable primitive back into its tag form.
///
/// A host object carrying e.g. an `i64` or a `String` converts wherever the
/// bare value would.
fn unwrap_host(value: &ScriptValue) -> Option<ScriptValue> {
    let obj = value.as_object()?;
    macro_rules! try_unwrap {
        ($ty:ty, $make:expr) => {
            if let Some(v) = obj.host_target_as::<$ty>() {
                #[allow(clippy::redundant_closure_call)]
                return Some(($make)(v));
            }
        };
    }
    try_unwrap!(i8, |v: &i8| ScriptValue::Int32(*v as i32));
    try_unwrap!(i16, |v: &i16| ScriptValue::Int32(*v as i32));
    try_unwrap!(i32, |v: &i32| ScriptValue::Int32(*v));
    try_unwrap!(i64, |v: &i64| ScriptValue::Int64(*v));
    try_unwrap!(u8, |v: &u8| ScriptValue::Int32(*v as i32));
    try_unwrap!(u16, |v: &u16| ScriptValue::Int32(*v as i32));
    try_unwrap!(u32, |v: &u32| ScriptValue::Int64(*v as i64));
    try_unwrap!(u64, |v: &u64| match i64::try_from(*v) {
        Ok(n) => ScriptValue::Int64(n),
        Err(_) => ScriptValue::bigint(*v),
    });
    try_unwrap!(f32, |v: &f32| ScriptValue::Float32(*v));
    try_unwrap!(f64, |v: &f64| ScriptValue::Float64(*v));
    try_unwrap!(bool, |v: &bool| ScriptValue::Boolean(*v));
    try_unwrap!(String, |v: &String| ScriptValue::string(v));
    try_unwrap!(BigInt, |v: &BigInt| ScriptValue::BigInt(Arc::new(v.clone())));
    try_unwrap!(DateTime<Utc>, |v: &DateTime<Utc>| ScriptValue::Date(*v));
    None
}

/// Extract a host decimal from a wrapped boundary object.
fn decimal_of(value: &ScriptValue) -> Option<Decimal128> {
    value
        .as_object()
        .and_then(|o| o.host_target_as::<Decimal128>().copied())
}

// ---------------------------------------------------------------------------
// Integer targets
// ---------------------------------------------------------------------------

/// Exact integral extraction from a float source.
///
/// Fractional or non-finite inputs fail. Integral values beyond the double
/// safe-integer threshold fail too: a double cannot prove exactness there,
/// so 64-bit targets must receive a BigInt instead.
fn integer_from_f64(v: f64, target: &'static str, min: i128, max: i128) -> ConvertResult<i128> {
    if !v.is_finite() {
        return Err(ConvertError::out_of_range(target));
    }
    if v.fract() != 0.0 {
        return Err(ConvertError::not_integral(target));
    }
    if v.abs() > MAX_SAFE_INTEGER_F64 as f64 {
        return Err(if v >= min as f64 && v <= max as f64 {
            ConvertError::inexact(target)
        } else {
            ConvertError::out_of_range(target)
        });
    }
    let n = v as i128;
    if n < min || n > max {
        return Err(ConvertError::out_of_range(target));
    }
    Ok(n)
}

fn integer_from_script(
    value: &ScriptValue,
    target: &'static str,
    min: i128,
    max: i128,
) -> ConvertResult<i128> {
    let check = |n: i128| {
        if n >= min && n <= max {
            Ok(n)
        } else {
            Err(ConvertError::out_of_range(target))
        }
    };
    match value {
        ScriptValue::Int32(n) => check(*n as i128),
        ScriptValue::Int64(n) => check(*n as i128),
        ScriptValue::Float32(n) => integer_from_f64(*n as f64, target, min, max),
        ScriptValue::Float64(n) => integer_from_f64(*n, target, min, max),
        ScriptValue::BigInt(b) => b
            .to_i128()
            .ok_or(ConvertError::out_of_range(target))
            .and_then(check),
        ScriptValue::Object(_) | ScriptValue::Function(_) => {
            if let Some(d) = decimal_of(value) {
                let n = d.to_integral().ok_or(ConvertError::not_integral(target))?;
                check(n)
            } else if let Some(inner) = unwrap_host(value) {
                integer_from_script(&inner, target, min, max)
            } else {
                Err(ConvertError::mismatch(target, value.tag()))
            }
        }
        _ => Err(ConvertError::mismatch(target, value.tag())),
    }
}

macro_rules! impl_integer_from_script {
    ($($ty:ty => $name:literal),+ $(,)?) => {
        $(
            impl FromScript for $ty {
                const TARGET: &'static str = $name;

                fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
                    integer_from_script(value, $name, <$ty>::MIN as i128, <$ty>::MAX as i128)
                        .map(|n| n as $ty)
                }
            }
        )+
    };
}

impl_integer_from_script! {
    i8 => "i8",
    i16 => "i16",
    i32 => "i32",
    i64 => "i64",
    u8 => "u8",
    u16 => "u16",
    u32 => "u32",
    u64 => "u64",
}

/// Characters marshal as 16-bit unsigned code units.
impl FromScript for char {
    const TARGET: &'static str = "char";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        let unit = integer_from_script(value, "char", 0, u16::MAX as i128)? as u32;
        char::from_u32(unit).ok_or(ConvertError::out_of_range("char"))
    }
}

// ---------------------------------------------------------------------------
// Floating-point targets
// ---------------------------------------------------------------------------

impl FromScript for f64 {
    const TARGET: &'static str = "f64";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        match value {
            ScriptValue::Int32(n) => Ok(*n as f64),
            ScriptValue::Int64(n) => {
                if n.abs() <= MAX_SAFE_INTEGER_F64 {
                    Ok(*n as f64)
                } else {
                    Err(ConvertError::inexact("f64"))
                }
            }
            ScriptValue::Float32(n) => Ok(*n as f64),
            ScriptValue::Float64(n) => Ok(*n),
            ScriptValue::BigInt(b) => {
                if b.abs() <= BigInt::from(MAX_SAFE_INTEGER_F64) {
                    b.to_f64().ok_or(ConvertError::out_of_range("f64"))
                } else {
                    Err(ConvertError::inexact("f64"))
                }
            }
            ScriptValue::Object(_) | ScriptValue::Function(_) => {
                if let Some(d) = decimal_of(value) {
                    Ok(d.to_f64())
                } else if let Some(inner) = unwrap_host(value) {
                    f64::from_script(&inner)
                } else {
                    Err(ConvertError::mismatch("f64", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("f64", value.tag())),
        }
    }
}

impl FromScript for f32 {
    const TARGET: &'static str = "f32";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        let integral = |n: i64| {
            if n.abs() <= MAX_SAFE_INTEGER_F32 {
                Ok(n as f32)
            } else {
                Err(ConvertError::inexact("f32"))
            }
        };
        match value {
            ScriptValue::Int32(n) => integral(*n as i64),
            ScriptValue::Int64(n) => integral(*n),
            ScriptValue::Float32(n) => Ok(*n),
            ScriptValue::Float64(n) => {
                if n.is_nan() {
                    Ok(f32::NAN)
                } else if n.abs() <= f32::MAX as f64 {
                    Ok(*n as f32)
                } else {
                    Err(ConvertError::out_of_range("f32"))
                }
            }
            ScriptValue::BigInt(b) => b
                .to_i64()
                .ok_or(ConvertError::inexact("f32"))
                .and_then(integral),
            ScriptValue::Object(_) | ScriptValue::Function(_) => {
                if let Some(d) = decimal_of(value) {
                    let n = d.to_f64();
                    if n.abs() <= f32::MAX as f64 {
                        Ok(n as f32)
                    } else {
                        Err(ConvertError::out_of_range("f32"))
                    }
                } else if let Some(inner) = unwrap_host(value) {
                    f32::from_script(&inner)
                } else {
                    Err(ConvertError::mismatch("f32", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("f32", value.tag())),
        }
    }
}

// ---------------------------------------------------------------------------
// Decimal, BigInt, string, bool, date
// ---------------------------------------------------------------------------

impl FromScript for Decimal128 {
    const TARGET: &'static str = "decimal";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        match value {
            ScriptValue::Int32(n) => Ok(Decimal128::from_i64(*n as i64)),
            ScriptValue::Int64(n) => Ok(Decimal128::from_i64(*n)),
            ScriptValue::Float32(n) => Decimal128::try_from_f32(*n),
            ScriptValue::Float64(n) => Decimal128::try_from_f64(*n),
            ScriptValue::BigInt(b) => Decimal128::try_from_bigint(b),
            ScriptValue::Object(_) | ScriptValue::Function(_) => {
                if let Some(d) = decimal_of(value) {
                    Ok(d)
                } else if let Some(inner) = unwrap_host(value) {
                    Decimal128::from_script(&inner)
                } else {
                    Err(ConvertError::mismatch("decimal", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("decimal", value.tag())),
        }
    }
}

impl FromScript for BigInt {
    const TARGET: &'static str = "bigint";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        match value {
            ScriptValue::Int32(n) => Ok(BigInt::from(*n)),
            ScriptValue::Int64(n) => Ok(BigInt::from(*n)),
            ScriptValue::Float32(n) => bigint_from_f64(*n as f64),
            ScriptValue::Float64(n) => bigint_from_f64(*n),
            ScriptValue::BigInt(b) => Ok((**b).clone()),
            ScriptValue::Object(_) | ScriptValue::Function(_) => {
                if let Some(d) = decimal_of(value) {
                    d.to_bigint().ok_or(ConvertError::not_integral("bigint"))
                } else if let Some(inner) = unwrap_host(value) {
                    BigInt::from_script(&inner)
                } else {
                    Err(ConvertError::mismatch("bigint", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("bigint", value.tag())),
        }
    }
}

fn bigint_from_f64(v: f64) -> ConvertResult<BigInt> {
    if !v.is_finite() {
        return Err(ConvertError::out_of_range("bigint"));
    }
    if v.fract() != 0.0 {
        return Err(ConvertError::not_integral("bigint"));
    }
    BigInt::from_f64(v).ok_or(ConvertError::out_of_range("bigint"))
}

/// String targets never stringify numbers: only string-tagged values and
/// host-wrapped strings convert.
impl FromScript for String {
    const TARGET: &'static str = "string";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        match value {
            ScriptValue::String(s) => Ok(s.to_string()),
            ScriptValue::Object(_) | ScriptValue::Function(_) => {
                if let Some(o) = value.as_object()
                    && let Some(s) = o.host_target_as::<String>()
                {
                    Ok(s.clone())
                } else {
                    Err(ConvertError::mismatch("string", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("string", value.tag())),
        }
    }
}

/// Boolean conversion is strict; truthiness is a separate derivation
/// ([`ScriptValue::to_boolean`]), not a conversion.
impl FromScript for bool {
    const TARGET: &'static str = "bool";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        match value {
            ScriptValue::Boolean(b) => Ok(*b),
            ScriptValue::Object(_) => {
                if let Some(o) = value.as_object()
                    && let Some(b) = o.host_target_as::<bool>()
                {
                    Ok(*b)
                } else {
                    Err(ConvertError::mismatch("bool", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("bool", value.tag())),
        }
    }
}

impl FromScript for DateTime<Utc> {
    const TARGET: &'static str = "date";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        match value {
            ScriptValue::Date(d) => Ok(*d),
            ScriptValue::Object(_) => {
                if let Some(o) = value.as_object()
                    && let Some(d) = o.host_target_as::<DateTime<Utc>>()
                {
                    Ok(*d)
                } else {
                    Err(ConvertError::mismatch("date", value.tag()))
                }
            }
            _ => Err(ConvertError::mismatch("date", value.tag())),
        }
    }
}

// ---------------------------------------------------------------------------
// Structural targets
// ---------------------------------------------------------------------------

impl FromScript for ScriptValue {
    const TARGET: &'static str = "value";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        Ok(value.clone())
    }
}

impl FromScript for ScriptObject {
    const TARGET: &'static str = "object";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        value
            .as_object()
            .cloned()
            .ok_or(ConvertError::mismatch("object", value.tag()))
    }
}

impl FromScript for ScriptFunction {
    const TARGET: &'static str = "function";

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        value
            .as_function()
            .cloned()
            .ok_or(ConvertError::mismatch("function", value.tag()))
    }
}

/// Nullable targets: null and undefined both mean "no value"; anything else
/// must pass the underlying type's own rule.
impl<T: FromScript> FromScript for Option<T> {
    const TARGET: &'static str = T::TARGET;

    fn from_script(value: &ScriptValue) -> ConvertResult<Self> {
        if value.is_nullish() {
            Ok(None)
        } else {
            T::from_script(value).map(Some)
        }
    }
}

// ---------------------------------------------------------------------------
// IntoScript implementations
// ---------------------------------------------------------------------------

impl IntoScript for ScriptValue {
    fn into_script(self) -> ScriptValue {
        self
    }
}

impl IntoScript for () {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Undefined
    }
}

impl IntoScript for bool {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Boolean(self)
    }
}

macro_rules! impl_into_script_int32 {
    ($($ty:ty),+) => {
        $(
            impl IntoScript for $ty {
                fn into_script(self) -> ScriptValue {
                    ScriptValue::Int32(self as i32)
                }
            }
        )+
    };
}

impl_into_script_int32!(i8, i16, i32, u8, u16);

impl IntoScript for u32 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Int64(self as i64)
    }
}

impl IntoScript for i64 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Int64(self)
    }
}

impl IntoScript for u64 {
    fn into_script(self) -> ScriptValue {
        match i64::try_from(self) {
            Ok(n) => ScriptValue::Int64(n),
            Err(_) => ScriptValue::bigint(self),
        }
    }
}

impl IntoScript for f32 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Float32(self)
    }
}

impl IntoScript for f64 {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Float64(self)
    }
}

impl IntoScript for char {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Int32(self as i32)
    }
}

impl IntoScript for BigInt {
    fn into_script(self) -> ScriptValue {
        ScriptValue::BigInt(Arc::new(self))
    }
}

impl IntoScript for Decimal128 {
    fn into_script(self) -> ScriptValue {
        // Decimals have no boundary tag; they cross as wrapped host values.
        ScriptValue::Object(crate::object::host_box(self))
    }
}

impl IntoScript for String {
    fn into_script(self) -> ScriptValue {
        ScriptValue::string(self)
    }
}

impl IntoScript for &str {
    fn into_script(self) -> ScriptValue {
        ScriptValue::string(self)
    }
}

impl IntoScript for DateTime<Utc> {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Date(self)
    }
}

impl IntoScript for ScriptObject {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Object(self)
    }
}

impl IntoScript for ScriptFunction {
    fn into_script(self) -> ScriptValue {
        ScriptValue::Function(self)
    }
}

impl<T: IntoScript> IntoScript for Option<T> {
    fn into_script(self) -> ScriptValue {
        match self {
            Some(v) => v.into_script(),
            None => ScriptValue::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::host_box;

    #[test]
    fn test_integer_exact_only() {
        assert_eq!(i32::from_script(&ScriptValue::Float64(42.0)), Ok(42));
        assert_eq!(
            i32::from_script(&ScriptValue::Float64(42.5)),
            Err(ConvertError::not_integral("i32"))
        );
        assert_eq!(
            i8::from_script(&ScriptValue::Int32(128)),
            Err(ConvertError::out_of_range("i8"))
        );
        assert_eq!(i8::from_script(&ScriptValue::Int32(-128)), Ok(-128));
        assert_eq!(
            u8::from_script(&ScriptValue::Int32(-1)),
            Err(ConvertError::out_of_range("u8"))
        );
    }

    #[test]
    fn test_i64_safe_integer_boundary() {
        let safe = MAX_SAFE_INTEGER_F64;
        assert_eq!(
            i64::from_script(&ScriptValue::Float64(safe as f64)),
            Ok(safe)
        );
        // One past the safe threshold: a double cannot prove exactness.
        assert!(i64::from_script(&ScriptValue::Float64((safe as f64) * 2.0)).is_err());
        // The same magnitude as a BigInt round-trips fine.
        let big = ScriptValue::bigint(safe as i128 * 2);
        assert_eq!(i64::from_script(&big), Ok(safe * 2));
    }

    #[test]
    fn test_bigint_sources() {
        assert_eq!(i32::from_script(&ScriptValue::bigint(7)), Ok(7));
        assert!(i32::from_script(&ScriptValue::bigint(i64::MAX)).is_err());
        assert_eq!(
            u64::from_script(&ScriptValue::bigint(u64::MAX)),
            Ok(u64::MAX)
        );
        let over = BigInt::from(u64::MAX) + 1;
        assert!(u64::from_script(&ScriptValue::BigInt(Arc::new(over))).is_err());
    }

    #[test]
    fn test_f64_target() {
        assert_eq!(f64::from_script(&ScriptValue::Int32(5)), Ok(5.0));
        assert_eq!(
            f64::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F64)),
            Ok(MAX_SAFE_INTEGER_F64 as f64)
        );
        assert!(f64::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F64 + 1)).is_err());
        assert!(f64::from_script(&ScriptValue::bigint(MAX_SAFE_INTEGER_F64)).is_ok());
        assert!(f64::from_script(&ScriptValue::bigint(MAX_SAFE_INTEGER_F64 as i128 + 1)).is_err());
    }

    #[test]
    fn test_f32_target_tighter() {
        assert_eq!(
            f32::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F32)),
            Ok(MAX_SAFE_INTEGER_F32 as f32)
        );
        assert!(f32::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F32 + 1)).is_err());
        assert!(f32::from_script(&ScriptValue::Float64(1e300)).is_err());
        assert!(f32::from_script(&ScriptValue::Float64(1.5)).is_ok());
    }

    #[test]
    fn test_no_implicit_stringify() {
        assert!(String::from_script(&ScriptValue::Int32(42)).is_err());
        assert!(String::from_script(&ScriptValue::Float64(1.5)).is_err());
        assert_eq!(
            String::from_script(&ScriptValue::string("hi")),
            Ok("hi".to_string())
        );
    }

    #[test]
    fn test_wrapped_comparable_sources() {
        let wrapped = ScriptValue::Object(host_box(9_007_199_254_740_993_i64));
        assert_eq!(i64::from_script(&wrapped), Ok(9_007_199_254_740_993));
        let wrapped_str = ScriptValue::Object(host_box("abc".to_string()));
        assert_eq!(String::from_script(&wrapped_str), Ok("abc".to_string()));
    }

    #[test]
    fn test_decimal_target() {
        let d = Decimal128::from_script(&ScriptValue::Float64(2.5)).unwrap();
        assert_eq!(d.to_string(), "2.5");
        assert!(Decimal128::from_script(&ScriptValue::Float64(1e30)).is_err());
        assert!(Decimal128::from_script(&ScriptValue::string("1")).is_err());
    }

    #[test]
    fn test_decimal_source_for_integers() {
        let d = ScriptValue::Object(host_box(Decimal128::from_i64(12)));
        assert_eq!(i32::from_script(&d), Ok(12));
        let frac = ScriptValue::Object(host_box(Decimal128::try_from_f64(1.5).unwrap()));
        assert_eq!(
            i32::from_script(&frac),
            Err(ConvertError::not_integral("i32"))
        );
    }

    #[test]
    fn test_nullable() {
        assert_eq!(Option::<i32>::from_script(&ScriptValue::Null), Ok(None));
        assert_eq!(
            Option::<i32>::from_script(&ScriptValue::Undefined),
            Ok(None)
        );
        assert_eq!(
            Option::<i32>::from_script(&ScriptValue::Int32(3)),
            Ok(Some(3))
        );
        assert!(Option::<i32>::from_script(&ScriptValue::string("x")).is_err());
    }

    #[test]
    fn test_char_as_u16() {
        assert_eq!(char::from_script(&ScriptValue::Int32(65)), Ok('A'));
        assert!(char::from_script(&ScriptValue::Int32(-1)).is_err());
        assert!(char::from_script(&ScriptValue::Int32(0x1_0000)).is_err());
    }

    #[test]
    fn test_repeatable_and_pure() {
        let v = ScriptValue::Float64(3.25);
        for _ in 0..3 {
            assert!(i32::from_script(&v).is_err());
            assert_eq!(f64::from_script(&v), Ok(3.25));
        }
    }
}
