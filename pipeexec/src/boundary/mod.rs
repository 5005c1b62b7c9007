//! Fault boundary around user-supplied processing logic.
//!
//! A panic inside a DoFn must never take down the worker thread. Work is run
//! through [`FaultBoundary::invoke`] (or [`call_no_panic`]), which turns any
//! panic into an [`ExecError`]:
//!
//! - a [`DoFnError`] payload is returned as-is, keeping its attribution;
//! - any other payload becomes [`ExecError::Panic`] with the top-level
//!   message `panic: <payload>` and a diagnostic carrying the panic location
//!   and backtrace.
//!
//! Only the dynamic extent of the call is covered. Threads or tasks spawned
//! by the work need their own boundary.

mod capture;
mod config;

pub use config::BoundaryConfig;

use crate::context::ExecContext;
use crate::errors::{DoFnError, ExecError, ExecResult, TopLevelError};
use capture::{HookGuard, HookMode, PanicCapture};
use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt::Write as _;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error};

/// Runs `f` inside a default [`FaultBoundary`].
pub fn call_no_panic<T, F>(ctx: &ExecContext, f: F) -> ExecResult<T>
where
    F: FnOnce(&ExecContext) -> ExecResult<T>,
{
    FaultBoundary::default().invoke(ctx, f)
}

/// Converts panics raised by a unit of work into errors.
#[derive(Debug, Clone, Default)]
pub struct FaultBoundary {
    config: BoundaryConfig,
}

impl FaultBoundary {
    /// Creates a boundary with the given configuration.
    #[must_use]
    pub const fn new(config: BoundaryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &BoundaryConfig {
        &self.config
    }

    /// Calls `f`, returning its result unchanged unless it panics.
    pub fn invoke<T, F>(&self, ctx: &ExecContext, f: F) -> ExecResult<T>
    where
        F: FnOnce(&ExecContext) -> ExecResult<T>,
    {
        let outcome = {
            let _guard = HookGuard::enter(self.config.hook_mode());
            panic::catch_unwind(AssertUnwindSafe(|| f(ctx)))
        };
        match outcome {
            Ok(result) => {
                capture::discard_capture();
                result
            }
            Err(payload) => Err(self.convert_panic(payload)),
        }
    }

    /// Async counterpart of [`invoke`](Self::invoke).
    ///
    /// Building the future and every poll of it run inside the boundary.
    pub async fn invoke_async<T, F, Fut>(&self, ctx: &ExecContext, f: F) -> ExecResult<T>
    where
        F: FnOnce(ExecContext) -> Fut,
        Fut: Future<Output = ExecResult<T>>,
    {
        let fut = self.invoke(ctx, |ctx| Ok(f(ctx.clone())))?;
        let caught = CatchPanic {
            inner: Box::pin(fut),
            mode: self.config.hook_mode(),
        }
        .await;
        caught.unwrap_or_else(|payload| Err(self.convert_panic(payload)))
    }

    /// Turns a panic payload into the error reported upward.
    fn convert_panic(&self, payload: Box<dyn Any + Send>) -> ExecError {
        let capture = capture::take_capture();
        match classify(payload) {
            Payload::Attributed(err) => {
                debug!(
                    uid = %err.uid(),
                    pid = err.pid(),
                    do_fn = err.do_fn(),
                    "attributed DoFn failure passed through fault boundary"
                );
                ExecError::DoFn(err)
            }
            Payload::Raw(message) => self.panic_error(&message, capture),
        }
    }

    fn panic_error(&self, message: &str, capture: Option<PanicCapture>) -> ExecError {
        let (location, backtrace) = match capture {
            Some(PanicCapture { location, backtrace }) => (location, backtrace),
            None => (None, None),
        };
        // The hook may have been replaced by someone else; fall back to the
        // boundary's own stack.
        let backtrace =
            backtrace.or_else(|| self.config.capture_backtrace.then(Backtrace::force_capture));

        let top_level = format!("panic: {message}");
        let mut detail = top_level.clone();
        if let Some(location) = &location {
            let _ = write!(detail, "\n  at {location}");
        }
        let _ = write!(detail, "\n\nstack backtrace:\n");
        match &backtrace {
            Some(backtrace) => detail.push_str(&capture::render_backtrace(backtrace)),
            None => detail.push_str("backtrace capture disabled"),
        }

        if self.config.log_panics {
            error!(
                panic.payload = message,
                panic.location = location.as_deref(),
                "panic contained by fault boundary"
            );
        }

        ExecError::Panic(TopLevelError::new(detail).with_top_level_msg(top_level))
    }
}

/// A panic payload, discriminated by whether it already carries attribution.
enum Payload {
    Attributed(DoFnError),
    Raw(String),
}

fn classify(payload: Box<dyn Any + Send>) -> Payload {
    let payload = match payload.downcast::<DoFnError>() {
        Ok(err) => return Payload::Attributed(*err),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<Box<DoFnError>>() {
        Ok(err) => return Payload::Attributed(**err),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<ExecError>() {
        Ok(err) => match *err {
            ExecError::DoFn(err) => return Payload::Attributed(err),
            other => return Payload::Raw(other.to_string()),
        },
        Err(payload) => payload,
    };

    Payload::Raw(render_payload(payload.as_ref()))
}

type Renderer = fn(&(dyn Any + Send)) -> Option<String>;

/// Payload types whose value is kept in the message, tried in order.
const RENDERERS: &[Renderer] = &[
    display::<&'static str>,
    display::<String>,
    render_anyhow,
    display::<Box<dyn std::error::Error + Send + Sync>>,
    display::<Box<dyn std::error::Error + Send>>,
    display::<TopLevelError>,
    display::<i8>,
    display::<i16>,
    display::<i32>,
    display::<i64>,
    display::<i128>,
    display::<isize>,
    display::<u8>,
    display::<u16>,
    display::<u32>,
    display::<u64>,
    display::<u128>,
    display::<usize>,
    display::<f32>,
    display::<f64>,
    display::<bool>,
    display::<char>,
];

fn render_payload(payload: &(dyn Any + Send)) -> String {
    RENDERERS
        .iter()
        .find_map(|render| render(payload))
        .unwrap_or_else(|| "Box<dyn Any>".to_string())
}

fn display<T: std::fmt::Display + 'static>(payload: &(dyn Any + Send)) -> Option<String> {
    payload.downcast_ref::<T>().map(ToString::to_string)
}

fn render_anyhow(payload: &(dyn Any + Send)) -> Option<String> {
    payload
        .downcast_ref::<anyhow::Error>()
        .map(|err| format!("{err:#}"))
}

/// Polls the inner future with panics contained and recorded.
struct CatchPanic<F> {
    inner: Pin<Box<F>>,
    mode: HookMode,
}

impl<F: Future> Future for CatchPanic<F> {
    type Output = std::thread::Result<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _guard = HookGuard::enter(this.mode);
        match panic::catch_unwind(AssertUnwindSafe(|| this.inner.as_mut().poll(cx))) {
            Ok(poll) => {
                capture::discard_capture();
                poll.map(Ok)
            }
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::UnitId;
    use pretty_assertions::assert_eq;

    fn ctx() -> ExecContext {
        ExecContext::new()
    }

    fn explode(msg: &str) -> ExecResult<()> {
        panic!("{msg}")
    }

    fn fail_attributed(uid: u64) -> ExecResult<()> {
        DoFnError::new("Async", anyhow::anyhow!("E"), UnitId::new(uid), "p9").into_panic()
    }

    #[test]
    fn test_success_passes_through() {
        let result = call_no_panic(&ctx(), |_| Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_ordinary_error_passes_through_unwrapped() {
        let result: ExecResult<()> =
            call_no_panic(&ctx(), |_| Err(ExecError::node(UnitId::new(3), "flush failed")));

        match result {
            Err(ExecError::Node { uid, message }) => {
                assert_eq!(uid, UnitId::new(3));
                assert_eq!(message, "flush failed");
            }
            other => panic!("expected node error, got {other:?}"),
        }
    }

    #[test]
    fn test_context_is_handed_to_work() {
        let ctx = ExecContext::new().with_label("inst-1");
        let label = call_no_panic(&ctx, |ctx| Ok(ctx.label().map(str::to_string))).unwrap();
        assert_eq!(label.as_deref(), Some("inst-1"));
    }

    #[test]
    fn test_attributed_panic_returned_verbatim() {
        let result: ExecResult<()> = call_no_panic(&ctx(), |_| {
            DoFnError::new("X", anyhow::anyhow!("E"), UnitId::new(5), "p").into_panic()
        });

        let err = result.unwrap_err();
        let do_fn = err.as_do_fn().expect("attribution should be preserved");
        assert_eq!(do_fn.do_fn(), "X");
        assert_eq!(do_fn.uid(), UnitId::new(5));
        assert_eq!(do_fn.pid(), "p");
        assert_eq!(do_fn.err().to_string(), "E");
        assert_eq!(err.to_string(), "DoFn[UID:5, PID:p, Name: X] failed:\nE");
        assert!(!format!("{err:#}").contains("stack backtrace"));
    }

    #[test]
    fn test_boxed_and_wrapped_attributed_payloads() {
        let boxed: ExecResult<()> = call_no_panic(&ctx(), |_| {
            panic::panic_any(Box::new(DoFnError::new(
                "Boxed",
                anyhow::anyhow!("E"),
                UnitId::new(1),
                "p",
            )))
        });
        assert_eq!(boxed.unwrap_err().as_do_fn().map(DoFnError::do_fn), Some("Boxed"));

        let wrapped: ExecResult<()> = call_no_panic(&ctx(), |_| {
            panic::panic_any(ExecError::DoFn(DoFnError::new(
                "Wrapped",
                anyhow::anyhow!("E"),
                UnitId::new(2),
                "p",
            )))
        });
        assert_eq!(wrapped.unwrap_err().as_do_fn().map(DoFnError::do_fn), Some("Wrapped"));
    }

    #[test]
    fn test_raw_panic_converted_with_top_level_message() {
        let result: ExecResult<()> = call_no_panic(&ctx(), |_| panic!("boom"));

        let err = result.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(crate::errors::top_level_msg(&err), "panic: boom");
        assert_eq!(err.to_string(), "panic: boom");

        let detail = format!("{err:#}");
        assert!(detail.starts_with("panic: boom"));
        assert!(detail.contains("\n  at "), "{detail}");
        assert!(detail.contains("boundary/mod.rs"), "{detail}");
        let frames = detail
            .split_once("stack backtrace:\n")
            .map(|(_, frames)| frames)
            .unwrap_or_default();
        assert!(frames.contains("pipeexec::boundary"), "{detail}");
        assert!(!frames.contains("backtrace capture disabled"));
    }

    #[test]
    fn test_formatted_panic_message() {
        let result: ExecResult<()> = call_no_panic(&ctx(), |_| panic!("record {} invalid", 17));
        assert_eq!(result.unwrap_err().to_string(), "panic: record 17 invalid");
    }

    #[test]
    fn test_non_attributed_exec_error_payload_is_wrapped() {
        let result: ExecResult<()> = call_no_panic(&ctx(), |_| {
            panic::panic_any(ExecError::Cancelled("stop".to_string()))
        });
        assert_eq!(
            result.unwrap_err().to_string(),
            "panic: Execution cancelled: stop"
        );
    }

    fn panic_message(payload: impl Any + Send + 'static) -> String {
        let result: ExecResult<()> = call_no_panic(&ctx(), |_| panic::panic_any(payload));
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_opaque_payload() {
        struct Opaque;
        assert_eq!(panic_message(Opaque), "panic: Box<dyn Any>");
    }

    #[test]
    fn test_anyhow_payload_keeps_its_chain() {
        let err = anyhow::anyhow!("disk full").context("writing shard 3");
        assert_eq!(panic_message(err), "panic: writing shard 3: disk full");
    }

    #[test]
    fn test_boxed_std_error_payload() {
        let err: Box<dyn std::error::Error + Send + Sync> = "connection reset".into();
        assert_eq!(panic_message(err), "panic: connection reset");

        let io = std::io::Error::other("broken pipe");
        let err: Box<dyn std::error::Error + Send> = Box::new(io);
        assert_eq!(panic_message(err), "panic: broken pipe");
    }

    #[test]
    fn test_top_level_error_payload_uses_top_level_message() {
        let err = TopLevelError::new("long detail").with_top_level_msg("short");
        assert_eq!(panic_message(err), "panic: short");
    }

    #[test]
    fn test_primitive_payloads() {
        assert_eq!(panic_message(42_i32), "panic: 42");
        assert_eq!(panic_message(-3_i64), "panic: -3");
        assert_eq!(panic_message(7_u32), "panic: 7");
        assert_eq!(panic_message(9_usize), "panic: 9");
        assert_eq!(panic_message(255_u8), "panic: 255");
        assert_eq!(panic_message(1.5_f64), "panic: 1.5");
        assert_eq!(panic_message(true), "panic: true");
        assert_eq!(panic_message('x'), "panic: x");
    }

    #[test]
    fn test_backtrace_capture_disabled() {
        let boundary = FaultBoundary::new(
            BoundaryConfig::new()
                .with_capture_backtrace(false)
                .with_log_panics(false),
        );
        let result: ExecResult<()> = boundary.invoke(&ctx(), |_| panic!("quiet"));
        let detail = format!("{:#}", result.unwrap_err());
        assert!(detail.starts_with("panic: quiet"));
        assert!(detail.contains("stack backtrace:"));
    }

    #[test]
    fn test_nested_boundaries() {
        let outer: ExecResult<String> = call_no_panic(&ctx(), |ctx| {
            let inner: ExecResult<()> = call_no_panic(ctx, |_| panic!("inner"));
            Ok(inner.unwrap_err().to_string())
        });
        assert_eq!(outer.unwrap(), "panic: inner");
    }

    #[test]
    fn test_panic_caught_inside_work_leaves_no_capture() {
        let result = call_no_panic(&ctx(), |_| {
            let caught: std::thread::Result<()> = panic::catch_unwind(|| panic!("handled by the work"));
            Ok(caught.is_err())
        });
        assert!(result.unwrap());
        assert!(capture::take_capture().is_none());
    }

    #[test]
    fn test_later_panic_reports_its_own_location() {
        let _ = call_no_panic(&ctx(), |_| {
            let _: std::thread::Result<()> = panic::catch_unwind(|| panic!("handled by the work"));
            Ok(())
        });

        let line = line!() + 1;
        let result: ExecResult<()> = call_no_panic(&ctx(), |_| panic!("real"));
        let detail = format!("{:#}", result.unwrap_err());
        assert!(detail.contains(&format!("{}:{line}:", file!())), "{detail}");
    }

    #[tokio::test]
    async fn test_invoke_async_panic_caught_inside_future_leaves_no_capture() {
        let boundary = FaultBoundary::default();
        let result = boundary
            .invoke_async(&ctx(), |_| async {
                let caught: std::thread::Result<()> =
                    panic::catch_unwind(|| panic!("handled by the future"));
                tokio::task::yield_now().await;
                Ok(caught.is_err())
            })
            .await;
        assert!(result.unwrap());
        assert!(capture::take_capture().is_none());
    }

    #[test]
    fn test_thread_survives_repeated_panics() {
        for i in 0..3 {
            let result: ExecResult<()> = call_no_panic(&ctx(), |_| panic!("attempt {i}"));
            assert_eq!(result.unwrap_err().to_string(), format!("panic: attempt {i}"));
        }
    }

    #[tokio::test]
    async fn test_invoke_async_success_and_error() {
        let boundary = FaultBoundary::default();
        let ok = boundary.invoke_async(&ctx(), |_| async { Ok(5) }).await;
        assert_eq!(ok.unwrap(), 5);

        let err: ExecResult<()> = boundary
            .invoke_async(&ctx(), |_| async { Err(ExecError::Cancelled("x".into())) })
            .await;
        assert!(err.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_invoke_async_contains_panic_after_await() {
        let boundary = FaultBoundary::default();
        let result: ExecResult<()> = boundary
            .invoke_async(&ctx(), |_| async {
                tokio::task::yield_now().await;
                explode("late boom")
            })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "panic: late boom");
    }

    #[test]
    fn test_invoke_async_attributed_panic() {
        let boundary = FaultBoundary::default();
        let result = futures::executor::block_on(
            boundary.invoke_async(&ctx(), |_| async { fail_attributed(9) }),
        );
        let err = result.unwrap_err();
        assert_eq!(err.as_do_fn().map(DoFnError::uid), Some(UnitId::new(9)));
    }

    #[test]
    fn test_invoke_async_panic_while_building_future() {
        let boundary = FaultBoundary::default();
        let result: ExecResult<()> = futures::executor::block_on(
            boundary.invoke_async(&ctx(), |_| -> std::future::Ready<ExecResult<()>> {
                panic!("setup")
            }),
        );
        assert_eq!(result.unwrap_err().to_string(), "panic: setup");
    }
}
