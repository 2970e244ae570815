//! Error types for the Pyrite front-end.
//!
//! Two classes of failure exist (and only two): input errors, which are
//! reported to the user as syntax errors attached to a source location,
//! and internal invariant violations, which indicate a bug in the
//! front-end itself and abort the compilation. There is no recovery or
//! partial-failure state; errors propagate to the driver.

use crate::span::Span;
use thiserror::Error;

/// The unified result type for front-end phases.
pub type PyriteResult<T> = Result<T, PyriteError>;

/// Front-end error.
#[derive(Error, Debug, Clone)]
pub enum PyriteError {
    /// The input program is ill-formed (e.g. `break` outside a loop).
    #[error("SyntaxError: {message}")]
    Syntax {
        /// Error description.
        message: String,
        /// Location of the offending construct.
        span: Span,
    },

    /// A compilation phase rejected otherwise well-formed input.
    #[error("CompileError: {message}")]
    Compile {
        /// Error description.
        message: String,
        /// Location, when one is attributable.
        span: Option<Span>,
    },

    /// A front-end invariant was violated; this is a bug, not user error.
    #[error("InternalError: {message}")]
    Internal {
        /// Error description.
        message: String,
    },
}

impl PyriteError {
    /// Create a syntax error with location.
    #[must_use]
    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::Syntax {
            message: message.into(),
            span,
        }
    }

    /// Create a compile error.
    #[must_use]
    pub fn compile(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::Compile {
            message: message.into(),
            span,
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The Python exception type this error surfaces as.
    #[must_use]
    pub fn exception_type(&self) -> &'static str {
        match self {
            Self::Syntax { .. } | Self::Compile { .. } => "SyntaxError",
            Self::Internal { .. } => "SystemError",
        }
    }

    /// The source location attached to this error, if any.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::Syntax { span, .. } => Some(*span),
            Self::Compile { span, .. } => *span,
            Self::Internal { .. } => None,
        }
    }
}
