//! Boundary value model and primitive conversion engine.
//!
//! Everything that crosses the host/script boundary passes through this
//! crate: the [`ScriptValue`] tagged union, the range-exact
//! [`FromScript`]/[`IntoScript`] conversion traits, the [`Decimal128`]
//! fixed-point host type, and the object/function handle contracts shared
//! by engines and host proxies.

pub mod convert;
pub mod decimal;
pub mod error;
pub mod object;
pub mod value;

pub use convert::{FromScript, IntoScript, MAX_SAFE_INTEGER_F32, MAX_SAFE_INTEGER_F64};
pub use decimal::Decimal128;
pub use error::{AccessError, AccessResult, ConvertError, ConvertResult};
pub use object::{
    HOST_ENGINE_ID, HostBox, ScriptFunction, ScriptObject, ScriptObjectContract, host_box,
    next_host_object_id,
};
pub use value::{ScriptValue, ValueTag};

// Re-exported so downstream crates share one BigInt/Date representation.
pub use chrono;
pub use num_bigint;
