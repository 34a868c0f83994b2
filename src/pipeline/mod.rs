//! Push-based processing graph used by the capture path.
//!
//! - [`Node`] - A processing unit that transforms input data to output data
//! - [`Pushable`] / [`Pullable`] - Object-safe push and pull endpoints
//! - [`GraphNode`] - Wraps a [`Node`] so it can be wired into a chain
//!
//! Chains are built with the [`push_chain!`](crate::push_chain) macro.

pub mod dyn_traits;
pub mod graph_node;
pub mod traits;

pub use dyn_traits::{Pullable, Pushable};
pub use graph_node::GraphNode;
pub use traits::Node;
