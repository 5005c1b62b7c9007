//! Core execution types: unit ids, the node capability and bundle data.

mod data;
mod node;
mod unit_id;

pub use data::DataContext;
pub use node::Node;
pub use unit_id::{AtomicGenId, GenId, UnitId};
