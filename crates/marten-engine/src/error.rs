//! Engine-level error taxonomy.
//!
//! The full failure space at an engine boundary:
//! conversion and member-lookup failures (local, recoverable, carried as
//! [`AccessError`]), script runtime errors (non-fatal, carry a script
//! payload), host exceptions surfaced to script (non-fatal, carry a host
//! back-reference), fatal engine failures (no script payload) and
//! cancellation (no script payload).

use thiserror::Error;

use marten_value::AccessError;

use crate::exception::ScriptEngineException;

/// An unrecoverable engine-level failure. Fatal errors terminate the
/// current execution and poison the engine until explicit recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FatalKind {
    #[error("heap limit exceeded")]
    HeapLimitExceeded,
    #[error("stack limit exceeded")]
    StackLimitExceeded,
}

/// Errors produced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Conversion or member-lookup failure at the boundary.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// A script error (or wrapped host exception) crossing the boundary.
    #[error("{0}")]
    Script(Box<ScriptEngineException>),

    /// Heap or stack limit exceeded. Carries no script payload.
    #[error("fatal engine error: {0}")]
    Fatal(FatalKind),

    /// Interrupt or continuation-callback cancellation. Distinguishable
    /// from script-thrown errors: no script payload.
    #[error("script execution interrupted")]
    Cancelled,

    /// The engine has been disposed.
    #[error("engine is disposed")]
    Disposed,

    /// Script source failed to parse.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Embedding API misuse (unknown compiled script, bad cache blob, ...).
    #[error("{0}")]
    Usage(String),
}

impl EngineError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// The exception wrapper, when this is a script-boundary error.
    pub fn exception(&self) -> Option<&ScriptEngineException> {
        match self {
            Self::Script(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Fatal(_) => true,
            Self::Script(e) => e.is_fatal(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
