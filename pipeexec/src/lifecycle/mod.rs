//! Bundle lifecycle fan-out across execution nodes.
//!
//! Callers pass nodes in the order the lifecycle calls must happen (for
//! example upstream before downstream). The helpers never reorder, never run
//! nodes concurrently and stop at the first failure. Nodes that already
//! started are not rolled back; that is left to the caller.


use crate::context::ExecContext;
use crate::core::{DataContext, Node, UnitId};
use crate::errors::ExecResult;
use tracing::{debug, warn};

/// Calls `start_bundle` on each node in order.
///
/// Returns the first error; nodes after the failing one are not started.
pub fn multi_start_bundle<'a, I, N>(
    ctx: &ExecContext,
    bundle_id: &str,
    data: &DataContext,
    nodes: I,
) -> ExecResult<()>
where
    I: IntoIterator<Item = &'a N>,
    N: Node + ?Sized + 'a,
{
    for (index, node) in nodes.into_iter().enumerate() {
        debug!(index, uid = %node.id(), bundle_id, "starting bundle on node");
        if let Err(err) = node.start_bundle(ctx, bundle_id, data) {
            warn!(
                index,
                uid = %node.id(),
                bundle_id,
                error = %err,
                "start bundle failed; remaining nodes skipped"
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Calls `finish_bundle` on each node in order.
///
/// Returns the first error; nodes after the failing one are not finished.
pub fn multi_finish_bundle<'a, I, N>(ctx: &ExecContext, nodes: I) -> ExecResult<()>
where
    I: IntoIterator<Item = &'a N>,
    N: Node + ?Sized + 'a,
{
    for (index, node) in nodes.into_iter().enumerate() {
        debug!(index, uid = %node.id(), "finishing bundle on node");
        if let Err(err) = node.finish_bundle(ctx) {
            warn!(
                index,
                uid = %node.id(),
                error = %err,
                "finish bundle failed; remaining nodes skipped"
            );
            return Err(err);
        }
    }
    Ok(())
}

/// Returns the unit ids of the given nodes, in order and with duplicates.
pub fn ids<'a, I, N>(nodes: I) -> Vec<UnitId>
where
    I: IntoIterator<Item = &'a N>,
    N: Node + ?Sized + 'a,
{
    nodes.into_iter().map(|node| node.id()).collect()
}
