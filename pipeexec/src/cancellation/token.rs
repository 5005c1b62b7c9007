//! Cancellation token for cooperative cancellation.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// A callback invoked once with the cancellation reason.
pub type CancelCallback = Box<dyn FnOnce(&str) + Send>;

/// A token for cooperative cancellation.
///
/// Nothing in this crate checks the token; nodes and DoFns poll it.
/// Only the first cancellation reason is kept.
#[derive(Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
    callbacks: Mutex<Vec<CancelCallback>>,
}

impl CancellationToken {
    /// Creates a new, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    ///
    /// Registered callbacks run once, on the first call. A panicking
    /// callback is logged and does not stop the others.
    pub fn cancel(&self, reason: impl Into<String>) {
        let callbacks = {
            let mut callbacks = self.callbacks.lock();
            if self.cancelled.swap(true, Ordering::SeqCst) {
                return;
            }
            *self.reason.write() = Some(reason.into());
            std::mem::take(&mut *callbacks)
        };

        let reason = self.reason().unwrap_or_default();
        for callback in callbacks {
            run_callback(callback, &reason);
        }
    }

    /// Registers a callback to run on cancellation.
    ///
    /// If the token is already cancelled the callback runs immediately.
    pub fn on_cancel<F>(&self, callback: F)
    where
        F: FnOnce(&str) + Send + 'static,
    {
        {
            let mut callbacks = self.callbacks.lock();
            if !self.is_cancelled() {
                callbacks.push(Box::new(callback));
                return;
            }
        }
        run_callback(Box::new(callback), &self.reason().unwrap_or_default());
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the cancellation reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }
}

fn run_callback(callback: CancelCallback, reason: &str) {
    if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(reason))) {
        warn!("Cancellation callback panicked: {:?}", e);
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .field("reason", &self.reason())
            .finish_non_exhaustive()
    }
}
