//! Host-side projection layer.
//!
//! Exposes host objects and types to script code: registration-built member
//! tables with cached overload resolution, proxies implementing the common
//! object contract, a dynamic-dispatch bridge for late-bound targets, and
//! the fast native object protocol for reflection-free dispatch.

pub mod bind;
pub mod dynamic;
pub mod fast;
pub mod member;
pub mod proxy;

pub use bind::{BindingCache, resolve_indexer, resolve_overload};
pub use dynamic::{DispatchMode, DynamicHost};
pub use fast::{
    FastArg, FastArgs, FastAsyncEnumerator, FastEnumerator, FastHostObject, FastObjectAdapter,
    FastResult, PropertyFlags,
};
pub use member::{
    HostTarget, ParamType, TypeDescriptor, TypeDescriptorBuilder, Visibility,
};
pub use proxy::{
    AccessContext, ExposureFlags, HostObjectProxy, to_callable, tunnel_invoke,
};
