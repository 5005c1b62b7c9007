//! Test nodes.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::context::ExecContext;
use crate::core::{DataContext, Node, UnitId};
use crate::errors::{ExecError, ExecResult};

/// A lifecycle call observed by a [`CallLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCall {
    /// `start_bundle` was called.
    StartBundle {
        /// The node called.
        uid: UnitId,
        /// The bundle being started.
        bundle_id: String,
    },
    /// `finish_bundle` was called.
    FinishBundle {
        /// The node called.
        uid: UnitId,
    },
}

/// Shared, ordered journal of lifecycle calls across several nodes.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<LifecycleCall>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a call.
    pub fn record(&self, call: LifecycleCall) {
        self.calls.lock().push(call);
    }

    /// Returns all calls in the order they happened.
    #[must_use]
    pub fn calls(&self) -> Vec<LifecycleCall> {
        self.calls.lock().clone()
    }

    /// Returns the ids of nodes that were started, in order.
    #[must_use]
    pub fn started(&self) -> Vec<UnitId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                LifecycleCall::StartBundle { uid, .. } => Some(*uid),
                LifecycleCall::FinishBundle { .. } => None,
            })
            .collect()
    }

    /// Returns the ids of nodes that were finished, in order.
    #[must_use]
    pub fn finished(&self) -> Vec<UnitId> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                LifecycleCall::FinishBundle { uid } => Some(*uid),
                LifecycleCall::StartBundle { .. } => None,
            })
            .collect()
    }

    /// Forgets all recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

/// A node that records its lifecycle calls and always succeeds.
#[derive(Debug)]
pub struct RecordingNode {
    id: UnitId,
    log: CallLog,
    last_data: Mutex<Option<DataContext>>,
}

impl RecordingNode {
    /// Creates a recording node writing to `log`.
    #[must_use]
    pub fn new(id: UnitId, log: &CallLog) -> Self {
        Self {
            id,
            log: log.clone(),
            last_data: Mutex::new(None),
        }
    }

    /// Returns the data context received by the last `start_bundle`.
    #[must_use]
    pub fn last_data(&self) -> Option<DataContext> {
        self.last_data.lock().clone()
    }
}

impl Node for RecordingNode {
    fn id(&self) -> UnitId {
        self.id
    }

    fn start_bundle(&self, _ctx: &ExecContext, bundle_id: &str, data: &DataContext) -> ExecResult<()> {
        self.log.record(LifecycleCall::StartBundle {
            uid: self.id,
            bundle_id: bundle_id.to_string(),
        });
        *self.last_data.lock() = Some(data.clone());
        Ok(())
    }

    fn finish_bundle(&self, _ctx: &ExecContext) -> ExecResult<()> {
        self.log.record(LifecycleCall::FinishBundle { uid: self.id });
        Ok(())
    }
}

/// Which lifecycle call a [`FailingNode`] fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Fail `start_bundle`.
    Start,
    /// Fail `finish_bundle`.
    Finish,
}

/// A node that records its calls and fails one of them.
#[derive(Debug)]
pub struct FailingNode {
    id: UnitId,
    log: CallLog,
    fail_on: FailOn,
    message: String,
}

impl FailingNode {
    /// Creates a failing node writing to `log`.
    #[must_use]
    pub fn new(id: UnitId, log: &CallLog, fail_on: FailOn, message: impl Into<String>) -> Self {
        Self {
            id,
            log: log.clone(),
            fail_on,
            message: message.into(),
        }
    }

    fn error(&self) -> ExecError {
        ExecError::node(self.id, self.message.clone())
    }
}

impl Node for FailingNode {
    fn id(&self) -> UnitId {
        self.id
    }

    fn start_bundle(&self, _ctx: &ExecContext, bundle_id: &str, _data: &DataContext) -> ExecResult<()> {
        self.log.record(LifecycleCall::StartBundle {
            uid: self.id,
            bundle_id: bundle_id.to_string(),
        });
        match self.fail_on {
            FailOn::Start => Err(self.error()),
            FailOn::Finish => Ok(()),
        }
    }

    fn finish_bundle(&self, _ctx: &ExecContext) -> ExecResult<()> {
        self.log.record(LifecycleCall::FinishBundle { uid: self.id });
        match self.fail_on {
            FailOn::Finish => Err(self.error()),
            FailOn::Start => Ok(()),
        }
    }
}

/// A node whose `start_bundle` panics with a fixed message.
#[derive(Debug)]
pub struct PanickingNode {
    id: UnitId,
    message: String,
}

impl PanickingNode {
    /// Creates a panicking node.
    #[must_use]
    pub fn new(id: UnitId, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

impl Node for PanickingNode {
    fn id(&self) -> UnitId {
        self.id
    }

    fn start_bundle(&self, _ctx: &ExecContext, _bundle_id: &str, _data: &DataContext) -> ExecResult<()> {
        panic!("{}", self.message)
    }

    fn finish_bundle(&self, _ctx: &ExecContext) -> ExecResult<()> {
        Ok(())
    }
}
