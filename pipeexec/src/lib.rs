//! # Pipeexec
//!
//! Execution support shared by pipeline runners.
//!
//! - **Unit ids**: [`GenId`](crate::core::GenId) hands out strictly increasing node ids
//!   while the execution graph is built
//! - **Fault boundary**: [`call_no_panic`](boundary::call_no_panic) runs
//!   user-supplied DoFn logic and turns panics into [`ExecError`](errors::ExecError)s
//! - **Bundle lifecycle**: [`multi_start_bundle`](lifecycle::multi_start_bundle) and
//!   [`multi_finish_bundle`](lifecycle::multi_finish_bundle) drive nodes in order,
//!   stopping at the first failure
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pipeexec::prelude::*;
//!
//! let mut gen = GenId::new();
//! let nodes: Vec<Box<dyn Node>> = build_nodes(&mut gen);
//! let ctx = ExecContext::new();
//!
//! call_no_panic(&ctx, |ctx| {
//!     multi_start_bundle(ctx, "bundle-1", &DataContext::new(), &nodes)?;
//!     process_elements(ctx, &nodes)?;
//!     multi_finish_bundle(ctx, &nodes)
//! })?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod boundary;
pub mod cancellation;
pub mod context;
pub mod core;
pub mod errors;
pub mod lifecycle;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::boundary::{call_no_panic, BoundaryConfig, FaultBoundary};
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::ExecContext;
    pub use crate::core::{AtomicGenId, DataContext, GenId, Node, UnitId};
    pub use crate::errors::{top_level_msg, DoFnError, ExecError, ExecResult, TopLevelError};
    pub use crate::lifecycle::{ids, multi_finish_bundle, multi_start_bundle};
}
