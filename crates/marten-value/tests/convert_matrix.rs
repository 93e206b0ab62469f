//! Boundary matrix for the primitive conversion engine.
//!
//! For every numeric target with bounds `[min, max]`: `min − 1` fails,
//! `min` and `max` succeed and round-trip exactly, `max + 1` fails —
//! checked across float, decimal and BigInt source representations.

use marten_value::num_bigint::BigInt;
use marten_value::{Decimal128, FromScript, ScriptValue, host_box};
use marten_value::{MAX_SAFE_INTEGER_F32, MAX_SAFE_INTEGER_F64};

fn sources(v: i128) -> Vec<ScriptValue> {
    let mut out = vec![ScriptValue::bigint(v)];
    // Floats can only assert exactness within the double safe range.
    if v.unsigned_abs() <= MAX_SAFE_INTEGER_F64 as u128 {
        out.push(ScriptValue::Float64(v as f64));
    }
    if let Ok(n) = i64::try_from(v) {
        out.push(ScriptValue::Object(host_box(Decimal128::from_i64(n))));
    }
    out
}

fn assert_bounds<T>(min: i128, max: i128)
where
    T: FromScript + PartialEq + std::fmt::Debug + Copy + Into<i128>,
{
    for src in sources(min) {
        let got = T::from_script(&src).unwrap_or_else(|e| panic!("min {min}: {e}"));
        assert_eq!(got.into(), min);
    }
    for src in sources(max) {
        let got = T::from_script(&src).unwrap_or_else(|e| panic!("max {max}: {e}"));
        assert_eq!(got.into(), max);
    }
    for src in sources(min - 1) {
        assert!(T::from_script(&src).is_err(), "min-1 must fail for {src:?}");
    }
    for src in sources(max + 1) {
        assert!(T::from_script(&src).is_err(), "max+1 must fail for {src:?}");
    }
}

#[test]
fn test_i8_bounds() {
    assert_bounds::<i8>(i8::MIN as i128, i8::MAX as i128);
}

#[test]
fn test_i16_bounds() {
    assert_bounds::<i16>(i16::MIN as i128, i16::MAX as i128);
}

#[test]
fn test_i32_bounds() {
    assert_bounds::<i32>(i32::MIN as i128, i32::MAX as i128);
}

#[test]
fn test_i64_bounds() {
    assert_bounds::<i64>(i64::MIN as i128, i64::MAX as i128);
}

#[test]
fn test_u8_bounds() {
    assert_bounds::<u8>(0, u8::MAX as i128);
}

#[test]
fn test_u16_bounds() {
    assert_bounds::<u16>(0, u16::MAX as i128);
}

#[test]
fn test_u32_bounds() {
    assert_bounds::<u32>(0, u32::MAX as i128);
}

#[test]
fn test_u64_bounds() {
    assert_bounds::<u64>(0, u64::MAX as i128);
}

#[test]
fn test_safe_integer_roundtrip_through_double() {
    // Every i64 within the double safe range survives an exact round-trip.
    for v in [
        0i64,
        1,
        -1,
        1 << 30,
        -(1 << 40),
        MAX_SAFE_INTEGER_F64,
        -MAX_SAFE_INTEGER_F64,
    ] {
        let through = ScriptValue::Float64(v as f64);
        assert_eq!(i64::from_script(&through).unwrap(), v);
    }
    // Outside the safe range a double source is rejected, BigInt is not.
    let beyond = MAX_SAFE_INTEGER_F64 + 1;
    assert!(i64::from_script(&ScriptValue::Float64(beyond as f64)).is_err());
    assert_eq!(
        i64::from_script(&ScriptValue::bigint(beyond)).unwrap(),
        beyond
    );
}

#[test]
fn test_f32_safe_threshold_is_own_constant() {
    // The f32 threshold is 2^24, not the double's 2^53.
    assert_eq!(MAX_SAFE_INTEGER_F32, 1 << 24);
    assert!(f32::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F32)).is_ok());
    assert!(f32::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F32 + 1)).is_err());
    assert!(f64::from_script(&ScriptValue::Int64(MAX_SAFE_INTEGER_F32 + 1)).is_ok());
}

#[test]
fn test_decimal_bounds_against_bigint() {
    let max = BigInt::from(marten_value::decimal::MAX_MANTISSA);
    assert!(Decimal128::try_from_bigint(&max).is_ok());
    assert!(Decimal128::try_from_bigint(&(max.clone() + 1)).is_err());
    assert!(Decimal128::try_from_bigint(&(-max.clone() - 1)).is_err());
}
