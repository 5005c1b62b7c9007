//! Execution context threaded through node and DoFn calls.

use crate::cancellation::CancellationToken;
use crate::errors::ExecError;
use std::sync::Arc;

/// Context passed to every lifecycle call and every unit of work run
/// inside the fault boundary.
///
/// Cloning is cheap; clones share the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    token: Arc<CancellationToken>,
    label: Option<String>,
}

impl ExecContext {
    /// Creates a context with a fresh cancellation token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses an existing cancellation token.
    #[must_use]
    pub fn with_token(mut self, token: Arc<CancellationToken>) -> Self {
        self.token = token;
        self
    }

    /// Sets a label used when logging, e.g. the instruction being processed.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the label, if set.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns the shared cancellation token.
    #[must_use]
    pub fn token(&self) -> &Arc<CancellationToken> {
        &self.token
    }

    /// Requests cancellation of everything sharing this context's token.
    pub fn cancel(&self, reason: impl Into<String>) {
        self.token.cancel(reason);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns [`ExecError::Cancelled`] once cancellation was requested.
    #[must_use]
    pub fn err(&self) -> Option<ExecError> {
        if self.is_cancelled() {
            Some(ExecError::Cancelled(self.token.reason().unwrap_or_default()))
        } else {
            None
        }
    }
}
