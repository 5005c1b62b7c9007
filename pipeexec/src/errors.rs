//! Error types for pipeline execution.
//!
//! Failures reaching the engine fall into three groups:
//! - [`DoFnError`]: a DoFn invocation failed at a known node and processor.
//! - [`ExecError::Panic`]: a panic contained by the fault boundary.
//! - Everything else, returned normally by a collaborator and passed through unchanged.

use crate::core::UnitId;
use std::fmt;
use thiserror::Error;

/// Result alias used across the crate.
pub type ExecResult<T> = Result<T, ExecError>;

/// The main error type for execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A DoFn invocation failed. Attribution is final once created.
    #[error(transparent)]
    DoFn(#[from] DoFnError),

    /// A panic was converted into an error by the fault boundary.
    #[error(transparent)]
    Panic(TopLevelError),

    /// Execution was cancelled through the context.
    #[error("Execution cancelled: {0}")]
    Cancelled(String),

    /// A node failed one of its lifecycle calls.
    #[error("Node {uid} failed: {message}")]
    Node {
        /// The failing node.
        uid: UnitId,
        /// What went wrong.
        message: String,
    },

    /// Any other error raised by a collaborator.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExecError {
    /// Creates a node failure.
    #[must_use]
    pub fn node(uid: UnitId, message: impl Into<String>) -> Self {
        Self::Node {
            uid,
            message: message.into(),
        }
    }

    /// Returns the attributed DoFn failure, if this is one.
    #[must_use]
    pub const fn as_do_fn(&self) -> Option<&DoFnError> {
        match self {
            Self::DoFn(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this error was converted from a panic.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }

    /// Returns true if this error reports cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// A failure attributed to a DoFn running at a specific node.
///
/// Rendered as `DoFn[UID:<uid>, PID:<pid>, Name: <name>] failed:` followed by
/// the underlying error on the next line.
#[derive(Debug, Error)]
#[error("DoFn[UID:{uid}, PID:{pid}, Name: {do_fn}] failed:\n{err:#}")]
pub struct DoFnError {
    do_fn: String,
    #[source]
    err: anyhow::Error,
    uid: UnitId,
    pid: String,
}

impl DoFnError {
    /// Creates a new attributed failure.
    pub fn new(
        do_fn: impl Into<String>,
        err: impl Into<anyhow::Error>,
        uid: UnitId,
        pid: impl Into<String>,
    ) -> Self {
        Self {
            do_fn: do_fn.into(),
            err: err.into(),
            uid,
            pid: pid.into(),
        }
    }

    /// Name of the failing DoFn.
    #[must_use]
    pub fn do_fn(&self) -> &str {
        &self.do_fn
    }

    /// The underlying error.
    #[must_use]
    pub const fn err(&self) -> &anyhow::Error {
        &self.err
    }

    /// The node the DoFn runs in.
    #[must_use]
    pub const fn uid(&self) -> UnitId {
        self.uid
    }

    /// The processor (pipeline stage) the failure is attributed to.
    #[must_use]
    pub fn pid(&self) -> &str {
        &self.pid
    }

    /// Raises this error as a panic payload.
    ///
    /// The fault boundary recognizes the payload and returns it as
    /// [`ExecError::DoFn`] without wrapping it or capturing a backtrace.
    pub fn into_panic(self) -> ! {
        std::panic::panic_any(self)
    }
}

/// An error with a short top-level message and a separate full diagnostic.
///
/// `Display` writes the top-level message; the alternate form (`{:#}`) writes
/// the full diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopLevelError {
    top_level: String,
    detail: String,
}

impl TopLevelError {
    /// Creates an error whose top-level message equals its diagnostic.
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            top_level: detail.clone(),
            detail,
        }
    }

    /// Replaces the top-level message, keeping the diagnostic.
    #[must_use]
    pub fn with_top_level_msg(mut self, msg: impl Into<String>) -> Self {
        self.top_level = msg.into();
        self
    }

    /// The concise message for logs and UIs.
    #[must_use]
    pub fn top_level_msg(&self) -> &str {
        &self.top_level
    }

    /// The full diagnostic text.
    #[must_use]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl fmt::Display for TopLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            f.write_str(&self.detail)
        } else {
            f.write_str(&self.top_level)
        }
    }
}

impl std::error::Error for TopLevelError {}

/// Returns the concise top-level message of an error.
///
/// Converted panics yield their short `panic: ...` message; every other
/// error yields its regular `Display` text.
#[must_use]
pub fn top_level_msg(err: &ExecError) -> String {
    match err {
        ExecError::Panic(inner) => inner.top_level_msg().to_string(),
        ExecError::Other(inner) => match inner.downcast_ref::<ExecError>() {
            Some(nested) => top_level_msg(nested),
            None => inner.to_string(),
        },
        other => other.to_string(),
    }
}
