//! Testing utilities for code driving nodes through bundles.
//!
//! This module provides:
//! - Test nodes that record, fail or panic on lifecycle calls
//! - Assertions for converted panics and attributed failures

mod assertions;
mod mocks;

pub use assertions::{assert_calls, assert_do_fn_error, assert_panic_error};
pub use mocks::{CallLog, FailOn, FailingNode, LifecycleCall, PanickingNode, RecordingNode};
