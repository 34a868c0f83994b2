//! Core pipeline traits.
//!
//! This module defines the fundamental abstraction for data processing:
//!
//! - [`Node`] - A processing unit that transforms input data to output data
//!
//! For push/pull operations, see [`Pushable`](super::Pushable) and
//! [`Pullable`](super::Pullable) in the `dyn_traits` module.

/// A processing node that transforms input to output.
///
/// Nodes are the building blocks of the capture chain. They receive input
/// data, process it, and optionally produce output data. Returning `None`
/// stops the data at this node (a muted gate, for instance).
///
/// Use [`GraphNode`](super::GraphNode) to wrap a `Node` and gain
/// [`Pushable`](super::Pushable) capabilities.
pub trait Node: Send + Sync {
    type Input;
    type Output;

    fn process(&self, input: Self::Input) -> Option<Self::Output>;
}
