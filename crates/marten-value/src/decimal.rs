//! Fixed-point decimal host type.
//!
//! `Decimal128` models the classic 128-bit decimal: a signed 96-bit integer
//! mantissa scaled by a power of ten between 0 and 28. No decimal crate in
//! our stack has this shape, so the type is modeled here; conversions lean
//! on `num-bigint` for overflow-free comparison.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::error::{ConvertError, ConvertResult};

/// Largest mantissa magnitude: 2^96 − 1.
pub const MAX_MANTISSA: i128 = (1i128 << 96) - 1;

/// Largest power-of-ten scale.
pub const MAX_SCALE: u8 = 28;

/// A 128-bit fixed-point decimal: `mantissa × 10^(−scale)`.
///
/// Invariants: `|mantissa| <= MAX_MANTISSA`, `scale <= MAX_SCALE`. Values
/// are kept normalized (no trailing zero digits in the mantissa unless the
/// scale is already zero) so equality is structural.
#[derive(Debug, Clone, Copy)]
pub struct Decimal128 {
    mantissa: i128,
    scale: u8,
}

impl Decimal128 {
    pub const ZERO: Self = Self {
        mantissa: 0,
        scale: 0,
    };

    pub const MAX: Self = Self {
        mantissa: MAX_MANTISSA,
        scale: 0,
    };

    pub const MIN: Self = Self {
        mantissa: -MAX_MANTISSA,
        scale: 0,
    };

    /// Build from raw parts, rejecting out-of-range mantissa or scale.
    pub fn from_parts(mantissa: i128, scale: u8) -> ConvertResult<Self> {
        if scale > MAX_SCALE {
            return Err(ConvertError::out_of_range("decimal"));
        }
        if mantissa.unsigned_abs() > MAX_MANTISSA as u128 {
            return Err(ConvertError::out_of_range("decimal"));
        }
        Ok(Self { mantissa, scale }.normalized())
    }

    pub fn from_i64(v: i64) -> Self {
        Self {
            mantissa: v as i128,
            scale: 0,
        }
    }

    pub fn from_u64(v: u64) -> Self {
        Self {
            mantissa: v as i128,
            scale: 0,
        }
    }

    /// Exact conversion from a finite double.
    ///
    /// Finite floats beyond the decimal range are rejected (never clamped),
    /// as are values whose shortest round-trip representation needs more
    /// than `MAX_SCALE` fractional digits.
    pub fn try_from_f64(v: f64) -> ConvertResult<Self> {
        if !v.is_finite() {
            return Err(ConvertError::out_of_range("decimal"));
        }
        // Rust's Display prints the shortest decimal string that round-trips,
        // always in plain (non-exponent) notation for f64.
        let text = format!("{v}");
        Self::parse_plain(&text)
    }

    pub fn try_from_f32(v: f32) -> ConvertResult<Self> {
        if !v.is_finite() {
            return Err(ConvertError::out_of_range("decimal"));
        }
        let text = format!("{v}");
        Self::parse_plain(&text)
    }

    /// BigInt sources are accepted only within the decimal's min/max.
    pub fn try_from_bigint(v: &BigInt) -> ConvertResult<Self> {
        if v.abs() > BigInt::from(MAX_MANTISSA) {
            return Err(ConvertError::out_of_range("decimal"));
        }
        let mantissa = v.to_i128().ok_or(ConvertError::out_of_range("decimal"))?;
        Ok(Self { mantissa, scale: 0 })
    }

    fn parse_plain(text: &str) -> ConvertResult<Self> {
        let (sign, digits) = match text.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, text),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if frac_part.len() > MAX_SCALE as usize {
            return Err(ConvertError::inexact("decimal"));
        }
        let mut mantissa: i128 = 0;
        for ch in int_part.chars().chain(frac_part.chars()) {
            let digit = ch.to_digit(10).ok_or(ConvertError::inexact("decimal"))? as i128;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(digit))
                .ok_or(ConvertError::out_of_range("decimal"))?;
        }
        if mantissa.unsigned_abs() > MAX_MANTISSA as u128 {
            return Err(ConvertError::out_of_range("decimal"));
        }
        Ok(Self {
            mantissa: sign * mantissa,
            scale: frac_part.len() as u8,
        }
        .normalized())
    }

    /// Strip trailing zero digits so equality is structural.
    fn normalized(mut self) -> Self {
        while self.scale > 0 && self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale -= 1;
        }
        self
    }

    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// True when the value has no fractional part.
    pub fn is_integral(&self) -> bool {
        self.scale == 0
    }

    /// The exact integer value, when there is no fractional part.
    pub fn to_integral(&self) -> Option<i128> {
        if self.scale == 0 {
            Some(self.mantissa)
        } else {
            None
        }
    }

    /// Nearest double. May lose precision; range always fits f64.
    pub fn to_f64(&self) -> f64 {
        self.mantissa as f64 / 10f64.powi(self.scale as i32)
    }

    pub fn to_bigint(&self) -> Option<BigInt> {
        self.to_integral().map(BigInt::from)
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// Compare by widening both mantissas to a common scale in `BigInt`
    /// space, so scale differences never overflow.
    fn cmp_big(&self, other: &Self) -> std::cmp::Ordering {
        let a = BigInt::from(self.mantissa) * num_traits::pow(BigInt::from(10), other.scale as usize);
        let b = BigInt::from(other.mantissa) * num_traits::pow(BigInt::from(10), self.scale as usize);
        a.cmp(&b)
    }
}

impl PartialEq for Decimal128 {
    fn eq(&self, other: &Self) -> bool {
        // Normalized representation makes structural equality exact.
        self.mantissa == other.mantissa && self.scale == other.scale
    }
}

impl Eq for Decimal128 {}

impl PartialOrd for Decimal128 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal128 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.cmp_big(other)
    }
}

impl std::fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            write!(f, "{sign}0.{digits:0>width$}", width = scale)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_range() {
        assert!(Decimal128::from_parts(MAX_MANTISSA, 0).is_ok());
        assert!(Decimal128::from_parts(MAX_MANTISSA + 1, 0).is_err());
        assert!(Decimal128::from_parts(-(MAX_MANTISSA + 1), 0).is_err());
        assert!(Decimal128::from_parts(1, MAX_SCALE + 1).is_err());
    }

    #[test]
    fn test_from_f64_exact() {
        let d = Decimal128::try_from_f64(1.5).unwrap();
        assert_eq!(d.mantissa(), 15);
        assert_eq!(d.scale(), 1);
        assert_eq!(d.to_string(), "1.5");

        let d = Decimal128::try_from_f64(-0.25).unwrap();
        assert_eq!(d.to_string(), "-0.25");
    }

    #[test]
    fn test_from_f64_rejects_non_finite_and_huge() {
        assert!(Decimal128::try_from_f64(f64::NAN).is_err());
        assert!(Decimal128::try_from_f64(f64::INFINITY).is_err());
        // Finite but outside the decimal's representable range.
        assert!(Decimal128::try_from_f64(1e30).is_err());
    }

    #[test]
    fn test_from_bigint_range() {
        assert!(Decimal128::try_from_bigint(&BigInt::from(MAX_MANTISSA)).is_ok());
        let over = BigInt::from(MAX_MANTISSA) + 1;
        assert!(Decimal128::try_from_bigint(&over).is_err());
    }

    #[test]
    fn test_normalization_and_eq() {
        let a = Decimal128::from_parts(1500, 3).unwrap(); // 1.500
        let b = Decimal128::from_parts(15, 1).unwrap(); // 1.5
        assert_eq!(a, b);
        assert_eq!(a.scale(), 1);
    }

    #[test]
    fn test_ordering_across_scales() {
        let a = Decimal128::from_parts(15, 1).unwrap(); // 1.5
        let b = Decimal128::from_parts(2, 0).unwrap(); // 2
        assert!(a < b);
        assert!(b > a);
    }

    #[test]
    fn test_integral() {
        let d = Decimal128::from_i64(42);
        assert!(d.is_integral());
        assert_eq!(d.to_integral(), Some(42));
        let d = Decimal128::try_from_f64(4.5).unwrap();
        assert!(!d.is_integral());
        assert_eq!(d.to_integral(), None);
    }

    #[test]
    fn test_display_small_fraction() {
        let d = Decimal128::from_parts(5, 3).unwrap();
        assert_eq!(d.to_string(), "0.005");
    }
}
