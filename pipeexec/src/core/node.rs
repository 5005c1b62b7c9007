//! The node capability driven by bundle lifecycle calls.

use super::{DataContext, UnitId};
use crate::context::ExecContext;
use crate::errors::ExecResult;
use std::sync::Arc;

/// A unit in the execution graph that takes part in bundle processing.
///
/// Nodes are owned by the surrounding engine; this crate only drives their
/// lifecycle. Implementations use interior mutability for per-bundle state.
pub trait Node: Send + Sync {
    /// Returns the node's unit id.
    fn id(&self) -> UnitId;

    /// Prepares the node for the bundle identified by `bundle_id`.
    fn start_bundle(&self, ctx: &ExecContext, bundle_id: &str, data: &DataContext) -> ExecResult<()>;

    /// Flushes and finishes the current bundle.
    fn finish_bundle(&self, ctx: &ExecContext) -> ExecResult<()>;
}

impl<N: Node + ?Sized> Node for &N {
    fn id(&self) -> UnitId {
        (**self).id()
    }

    fn start_bundle(&self, ctx: &ExecContext, bundle_id: &str, data: &DataContext) -> ExecResult<()> {
        (**self).start_bundle(ctx, bundle_id, data)
    }

    fn finish_bundle(&self, ctx: &ExecContext) -> ExecResult<()> {
        (**self).finish_bundle(ctx)
    }
}

impl<N: Node + ?Sized> Node for Box<N> {
    fn id(&self) -> UnitId {
        (**self).id()
    }

    fn start_bundle(&self, ctx: &ExecContext, bundle_id: &str, data: &DataContext) -> ExecResult<()> {
        (**self).start_bundle(ctx, bundle_id, data)
    }

    fn finish_bundle(&self, ctx: &ExecContext) -> ExecResult<()> {
        (**self).finish_bundle(ctx)
    }
}

impl<N: Node + ?Sized> Node for Arc<N> {
    fn id(&self) -> UnitId {
        (**self).id()
    }

    fn start_bundle(&self, ctx: &ExecContext, bundle_id: &str, data: &DataContext) -> ExecResult<()> {
        (**self).start_bundle(ctx, bundle_id, data)
    }

    fn finish_bundle(&self, ctx: &ExecContext) -> ExecResult<()> {
        (**self).finish_bundle(ctx)
    }
}
