//! Boundary error types shared by every marshaling layer.

use crate::value::ValueTag;
use thiserror::Error;

/// A failed conversion attempt.
///
/// Conversion failures are local and recoverable: callers receive the error
/// and choose to fall back or report. A failure never yields a partial value,
/// and out-of-range numeric conversions fail rather than saturate or wrap.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The source tag cannot target this host type at all
    /// (e.g., requesting a string from a numeric value).
    #[error("cannot convert {found} to {target}")]
    TypeMismatch {
        target: &'static str,
        found: ValueTag,
    },

    /// The value is outside the target type's `[min, max]` range.
    #[error("value out of range for {target}")]
    OutOfRange { target: &'static str },

    /// The value carries a fractional part and the target is integral.
    #[error("fractional value cannot convert to {target}")]
    NotIntegral { target: &'static str },

    /// The value is in range but would not round-trip exactly
    /// (e.g., an i64 beyond the double safe-integer threshold).
    #[error("value does not round-trip exactly through {target}")]
    Inexact { target: &'static str },
}

impl ConvertError {
    pub fn mismatch(target: &'static str, found: ValueTag) -> Self {
        Self::TypeMismatch { target, found }
    }

    pub fn out_of_range(target: &'static str) -> Self {
        Self::OutOfRange { target }
    }

    pub fn not_integral(target: &'static str) -> Self {
        Self::NotIntegral { target }
    }

    pub fn inexact(target: &'static str) -> Self {
        Self::Inexact { target }
    }
}

/// Result type for conversion attempts.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// A failed cross-boundary member access.
///
/// Member-lookup failures (`NotFound`, `Ambiguous`) are deliberately distinct
/// from conversion failures so callers can tell "no such member" apart from
/// "member exists but the arguments don't fit".
#[derive(Debug, Error)]
pub enum AccessError {
    /// Argument or result conversion failed.
    #[error(transparent)]
    Conversion(#[from] ConvertError),

    /// No member with this name (or no indexer entry for this key).
    #[error("member not found: {0}")]
    NotFound(String),

    /// More than one overload matched with equal score.
    #[error("ambiguous match for {0}")]
    Ambiguous(String),

    /// The target does not implement this operation.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    /// The underlying engine (or host callback) failed. The boxed error is
    /// inspectable by the engine layer's exception bridge.
    #[error("engine error: {0}")]
    Engine(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AccessError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    pub fn ambiguous(name: impl Into<String>) -> Self {
        Self::Ambiguous(name.into())
    }

    pub fn engine(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Engine(Box::new(err))
    }

    /// True when this failure means "no such member" rather than a
    /// conversion or engine problem.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for member-access operations.
pub type AccessResult<T> = Result<T, AccessError>;
