//! Exception marshaling across the host/script boundary.
//!
//! Script errors reaching the host are wrapped exactly once per boundary
//! crossing in a [`ScriptEngineException`]. Host errors thrown while a
//! script invocation is on the stack travel the other way as script error
//! objects that keep a back-reference to the original host error, so a
//! host-side catch handler can recover the very instance it threw.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use marten_value::{ScriptObject, ScriptValue, host_box};

/// Shared handle to a host-side error instance. Reference equality
/// (`Arc::ptr_eq`) identifies the original throw site.
pub type HostExceptionRef = Arc<dyn Error + Send + Sync>;

/// The script-side payload of a non-fatal script error: the error
/// constructor's name and its message. Fatal errors and cancellations
/// carry no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptErrorPayload {
    pub constructor_name: String,
    pub message: String,
}

impl ScriptErrorPayload {
    pub fn new(constructor_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            constructor_name: constructor_name.into(),
            message: message.into(),
        }
    }
}

/// A script error wrapped for host consumption. Immutable once built.
///
/// `error_details` concatenates this layer's position-annotated text with
/// the details of every nested layer, so a cross-engine chain reads
/// top-down in a single string.
pub struct ScriptEngineException {
    engine_name: String,
    message: String,
    error_details: String,
    script_exception: Option<ScriptErrorPayload>,
    host_exception: Option<HostExceptionRef>,
    inner: Option<Box<dyn Error + Send + Sync + 'static>>,
    fatal: bool,
}

impl ScriptEngineException {
    pub fn new(
        engine_name: impl Into<String>,
        message: impl Into<String>,
        detail: impl Into<String>,
        script_exception: Option<ScriptErrorPayload>,
        host_exception: Option<HostExceptionRef>,
        inner: Option<Box<dyn Error + Send + Sync + 'static>>,
        fatal: bool,
    ) -> Self {
        let message = message.into();
        let mut error_details = detail.into();
        if let Some(inner) = &inner {
            let nested = nested_details(inner.as_ref());
            if !nested.is_empty() {
                if !error_details.is_empty() {
                    error_details.push('\n');
                }
                error_details.push_str(&nested);
            }
        }
        Self {
            engine_name: engine_name.into(),
            message,
            error_details,
            script_exception,
            host_exception,
            inner,
            fatal,
        }
    }

    /// Name of the engine this error crossed out of.
    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Position-annotated text for this layer plus all nested layers.
    pub fn error_details(&self) -> &str {
        &self.error_details
    }

    /// The script payload, absent for fatal errors and cancellations.
    pub fn script_exception(&self) -> Option<&ScriptErrorPayload> {
        self.script_exception.as_ref()
    }

    /// Back-reference to the host error that started this chain, if the
    /// script error originated from a host throw at this layer.
    pub fn host_exception(&self) -> Option<&HostExceptionRef> {
        self.host_exception.as_ref()
    }

    /// The next layer inward, when this wrapper crossed more than one
    /// boundary (for example through a host function running a second
    /// engine).
    pub fn inner(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.inner.as_deref()
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Walks the nested chain to the original host error, if any layer
    /// carries one. Identity is preserved end to end.
    pub fn base_exception(&self) -> Option<HostExceptionRef> {
        if let Some(host) = &self.host_exception {
            return Some(host.clone());
        }
        let mut cursor: Option<&(dyn Error + 'static)> =
            self.inner.as_deref().map(|e| e as &(dyn Error + 'static));
        while let Some(err) = cursor {
            if let Some(wrapper) = err.downcast_ref::<ScriptEngineException>() {
                return wrapper.base_exception();
            }
            if let Some(invocation) = err.downcast_ref::<HostInvocationError>() {
                if let Some(host) = &invocation.host_exception {
                    return Some(host.clone());
                }
            }
            cursor = err.source();
        }
        None
    }

    /// Number of wrapper layers in the chain, this one included.
    pub fn chain_depth(&self) -> usize {
        let mut depth = 1;
        let mut cursor: Option<&(dyn Error + 'static)> =
            self.inner.as_deref().map(|e| e as &(dyn Error + 'static));
        while let Some(err) = cursor {
            if err.downcast_ref::<ScriptEngineException>().is_some() {
                depth += 1;
            }
            cursor = err.source();
        }
        depth
    }
}

impl fmt::Display for ScriptEngineException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.engine_name, self.message)
    }
}

impl fmt::Debug for ScriptEngineException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptEngineException")
            .field("engine_name", &self.engine_name)
            .field("message", &self.message)
            .field("script_exception", &self.script_exception)
            .field("fatal", &self.fatal)
            .field("has_host_exception", &self.host_exception.is_some())
            .field("has_inner", &self.inner.is_some())
            .finish()
    }
}

impl Error for ScriptEngineException {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// Host-side wrapper recording that a host function invocation failed
/// while a script was on the stack. Sits between two engine wrappers in a
/// cross-engine chain.
#[derive(Debug)]
pub struct HostInvocationError {
    message: String,
    host_exception: Option<HostExceptionRef>,
    cause: Option<Box<dyn Error + Send + Sync + 'static>>,
}

impl HostInvocationError {
    pub fn new(
        message: impl Into<String>,
        host_exception: Option<HostExceptionRef>,
        cause: Option<Box<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            host_exception,
            cause,
        }
    }

    pub fn host_exception(&self) -> Option<&HostExceptionRef> {
        self.host_exception.as_ref()
    }
}

impl fmt::Display for HostInvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for HostInvocationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

/// A host error thrown while script is on the stack, carried with shared
/// ownership so its identity survives the round trip through script code.
///
/// Host callbacks that want a catching host frame to recover the original
/// instance throw `AccessError::engine(HostThrown::new(arc))`.
#[derive(Debug, Clone)]
pub struct HostThrown(HostExceptionRef);

impl HostThrown {
    pub fn new(origin: HostExceptionRef) -> Self {
        Self(origin)
    }

    /// The original host error instance.
    pub fn origin(&self) -> HostExceptionRef {
        self.0.clone()
    }
}

impl fmt::Display for HostThrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error for HostThrown {}

/// Unwraps an engine-level cause down to its exception wrapper, so nested
/// chains link wrapper to wrapper without an intermediate enum layer.
pub(crate) fn flatten_engine_cause(
    cause: Box<dyn Error + Send + Sync>,
) -> Box<dyn Error + Send + Sync> {
    match cause.downcast::<crate::error::EngineError>() {
        Ok(engine_err) => match *engine_err {
            crate::error::EngineError::Script(wrapper) => wrapper,
            other => Box::new(other),
        },
        Err(original) => original,
    }
}

/// Property name under which a script error object carries the host
/// back-reference.
pub const HOST_EXCEPTION_PROPERTY: &str = "hostException";

/// Wraps a host error as a script-visible value that preserves the
/// original instance for round-tripping.
pub fn host_exception_value(err: HostExceptionRef) -> ScriptValue {
    ScriptValue::Object(host_box(err))
}

/// Recovers the original host error from a value produced by
/// [`host_exception_value`], preserving identity.
pub fn host_exception_from_value(value: &ScriptValue) -> Option<HostExceptionRef> {
    let obj = value.as_object()?;
    obj.host_target_as::<HostExceptionRef>().cloned()
}

/// Recovers the host back-reference carried by a script error object.
pub fn host_exception_of(error_object: &ScriptObject) -> Option<HostExceptionRef> {
    let carried = error_object.get(HOST_EXCEPTION_PROPERTY).ok()?;
    host_exception_from_value(&carried)
}

fn nested_details(err: &(dyn Error + Send + Sync + 'static)) -> String {
    let any: &(dyn Error + 'static) = err;
    if let Some(wrapper) = any.downcast_ref::<ScriptEngineException>() {
        return wrapper.error_details.clone();
    }
    let mut text = err.to_string();
    if let Some(source) = any.source() {
        let mut cursor = Some(source);
        while let Some(next) = cursor {
            if let Some(wrapper) = next.downcast_ref::<ScriptEngineException>() {
                text.push('\n');
                text.push_str(&wrapper.error_details);
                break;
            }
            text.push('\n');
            text.push_str(&next.to_string());
            cursor = next.source();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    #[test]
    fn test_base_exception_identity_preserved() {
        let host: HostExceptionRef = Arc::new(DiskFull);
        let wrapper = ScriptEngineException::new(
            "main",
            "Error: disk full",
            "Error: disk full\n    at main:1",
            Some(ScriptErrorPayload::new("Error", "disk full")),
            Some(host.clone()),
            None,
            false,
        );
        let base = wrapper.base_exception().unwrap();
        assert!(Arc::ptr_eq(&base, &host));
    }

    #[test]
    fn test_details_concatenate_across_layers() {
        let inner = ScriptEngineException::new(
            "inner",
            "TypeError: bad",
            "TypeError: bad\n    at inner:1",
            Some(ScriptErrorPayload::new("TypeError", "bad")),
            None,
            None,
            false,
        );
        let invocation = HostInvocationError::new(
            "host function 'cross' failed",
            None,
            Some(Box::new(inner)),
        );
        let outer = ScriptEngineException::new(
            "outer",
            "Error: host function 'cross' failed",
            "Error: host function 'cross' failed\n    at outer:1",
            Some(ScriptErrorPayload::new("Error", "host function 'cross' failed")),
            None,
            Some(Box::new(invocation)),
            false,
        );
        let details = outer.error_details();
        assert!(details.contains("at outer:1"));
        assert!(details.contains("host function 'cross' failed"));
        assert!(details.contains("at inner:1"));
        assert_eq!(outer.chain_depth(), 2);
    }

    #[test]
    fn test_host_exception_value_roundtrip() {
        let host: HostExceptionRef = Arc::new(DiskFull);
        let value = host_exception_value(host.clone());
        let back = host_exception_from_value(&value).unwrap();
        assert!(Arc::ptr_eq(&back, &host));
    }
}
