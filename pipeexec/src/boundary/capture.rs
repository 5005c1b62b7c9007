//! Panic-site capture for the fault boundary.
//!
//! `catch_unwind` only sees the payload after the stack has unwound, so the
//! location and backtrace are recorded from a panic hook while the panicking
//! frames are still live. The hook is installed once per process and only
//! records on threads that are currently inside a boundary; everywhere else
//! it defers to the hook that was installed before it.

use crate::errors::{DoFnError, ExecError};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::panic::{self, PanicHookInfo};
use std::sync::Once;

/// How the hook behaves for the innermost active boundary on a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HookMode {
    pub capture_backtrace: bool,
    pub forward_to_previous_hook: bool,
}

/// What the hook recorded about the last panic on this thread.
#[derive(Debug)]
pub(crate) struct PanicCapture {
    pub location: Option<String>,
    pub backtrace: Option<Backtrace>,
}

thread_local! {
    static ACTIVE: Cell<Option<HookMode>> = const { Cell::new(None) };
    static LAST: RefCell<Option<PanicCapture>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            match ACTIVE.try_with(Cell::get).ok().flatten() {
                Some(mode) => {
                    record(info, mode);
                    if mode.forward_to_previous_hook {
                        previous(info);
                    }
                }
                None => previous(info),
            }
        }));
    });
}

fn record(info: &PanicHookInfo<'_>, mode: HookMode) {
    let location = info.location().map(ToString::to_string);
    let backtrace = if is_attributed(info.payload()) {
        None
    } else if mode.capture_backtrace {
        Some(Backtrace::force_capture())
    } else {
        Some(Backtrace::capture())
    };

    let _ = LAST.try_with(|last| {
        *last.borrow_mut() = Some(PanicCapture { location, backtrace });
    });
}

/// Returns true for payloads that already carry DoFn attribution.
pub(crate) fn is_attributed(payload: &(dyn Any + Send)) -> bool {
    payload.is::<DoFnError>()
        || payload.is::<Box<DoFnError>>()
        || matches!(payload.downcast_ref::<ExecError>(), Some(ExecError::DoFn(_)))
}

/// Takes the capture recorded for the most recent panic on this thread.
pub(crate) fn take_capture() -> Option<PanicCapture> {
    LAST.try_with(|last| last.borrow_mut().take()).ok().flatten()
}

/// Drops any capture left by a panic that was caught inside the work.
pub(crate) fn discard_capture() {
    let _ = take_capture();
}

/// Renders a backtrace section, noting why frames are missing if they are.
pub(crate) fn render_backtrace(backtrace: &Backtrace) -> String {
    match backtrace.status() {
        BacktraceStatus::Captured => backtrace.to_string(),
        BacktraceStatus::Disabled => "run with RUST_BACKTRACE=1 to display backtraces".to_string(),
        BacktraceStatus::Unsupported => "backtraces are not supported on this platform".to_string(),
        _ => "backtrace status is unknown".to_string(),
    }
}

/// Marks the current thread as inside a boundary until dropped.
///
/// Guards nest: dropping restores the enclosing boundary's mode.
pub(crate) struct HookGuard {
    previous: Option<HookMode>,
}

impl HookGuard {
    pub(crate) fn enter(mode: HookMode) -> Self {
        install_hook();
        discard_capture();
        let previous = ACTIVE.with(|active| active.replace(Some(mode)));
        Self { previous }
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|active| active.set(self.previous));
    }
}
