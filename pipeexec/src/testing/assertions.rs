//! Test assertions for execution errors and lifecycle calls.

use super::mocks::{CallLog, LifecycleCall};
use crate::core::UnitId;
use crate::errors::{top_level_msg, ExecError};

/// Asserts that `err` is a converted panic carrying `payload`.
pub fn assert_panic_error(err: &ExecError, payload: &str) {
    assert!(err.is_panic(), "Expected a converted panic, got: {err:?}");
    assert_eq!(
        top_level_msg(err),
        format!("panic: {payload}"),
        "Unexpected top-level message"
    );
    let detail = format!("{err:#}");
    assert!(
        detail.contains(payload) && detail.contains("\n  at "),
        "Expected diagnostic with payload and panic location, got: {detail}"
    );
    let Some((_, frames)) = detail.split_once("stack backtrace:\n") else {
        panic!("Expected a stack backtrace section, got: {detail}");
    };
    assert!(
        frames.lines().any(|line| line.trim_start().starts_with("0:")),
        "Expected captured stack frames, got: {detail}"
    );
}

/// Asserts that `err` is a DoFn failure with the given attribution.
pub fn assert_do_fn_error(err: &ExecError, do_fn: &str, uid: UnitId, pid: &str) {
    let Some(actual) = err.as_do_fn() else {
        panic!("Expected DoFn error, got: {err:?}");
    };
    assert_eq!(actual.do_fn(), do_fn, "Unexpected DoFn name");
    assert_eq!(actual.uid(), uid, "Unexpected unit id");
    assert_eq!(actual.pid(), pid, "Unexpected processor id");
}

/// Asserts that exactly `expected` was recorded, in order.
pub fn assert_calls(log: &CallLog, expected: &[LifecycleCall]) {
    assert_eq!(log.calls(), expected, "Unexpected lifecycle calls");
}
