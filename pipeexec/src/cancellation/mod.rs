//! Cooperative cancellation shared between the engine and its nodes.

mod token;

pub use token::{CancelCallback, CancellationToken};
