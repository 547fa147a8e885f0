//! Structured errors shared by the IR, the estimators and the passes.
//!
//! Every failure carries the offending entity (a pass, a mode, a variable or a token) so the
//! driver can tell "bad input" from "the pass produced a broken model" and decide whether to
//! abort the whole run or skip to the next step. See [`ErrorKind`].

use thiserror::Error;

use crate::expr::EvalError;
use crate::parser::ParseError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A pass parameter string could not be parsed or names something undeclared.
    #[error("invalid parameters for pass '{pass}': {message}")]
    Params { pass: String, message: String },

    /// The requested pass identifier is not registered.
    #[error("unknown pass '{0}'")]
    UnknownPass(String),

    /// A configuration invariant does not hold.
    #[error("validation failed for {entity}: {message}")]
    Validation { entity: String, message: String },

    /// The numeric backend is disabled or missing.
    #[error("numeric backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The numeric backend ran but could not produce an estimate.
    #[error("numeric backend failed: {0}")]
    BackendFailed(String),

    /// The model does not satisfy a structural precondition of the operation.
    #[error("unsupported model structure in {entity}: {message}")]
    Unsupported { entity: String, message: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Params,
    Validation,
    Backend,
    Unsupported,
    Parse,
    Eval,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Params { .. } | Error::UnknownPass(_) => ErrorKind::Params,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::BackendUnavailable(_) | Error::BackendFailed(_) => ErrorKind::Backend,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Parse(_) => ErrorKind::Parse,
            Error::Eval(_) => ErrorKind::Eval,
        }
    }

    pub fn params(pass: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Params {
            pass: pass.into(),
            message: message.into(),
        }
    }

    pub fn validation(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            entity: entity.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Unsupported {
            entity: entity.into(),
            message: message.into(),
        }
    }
}
