//! GraphNode wrapper for dynamic graph construction.
//!
//! [`GraphNode`] wraps any [`Node`] to implement [`Pushable`], so nodes can be
//! chained at runtime.
//!
//! # Usage
//!
//! ```ignore
//! let meter = GraphNode::new(LevelMeter::new(volume.clone()));
//! meter.add_output(encoder_chain.clone());
//!
//! meter.push(frame); // -> measure -> encoder_chain.push()
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::dyn_traits::Pushable;
use super::traits::Node;

pub type OutputId = u64;

/// Wraps a [`Node`] to implement dynamic pipeline traits.
///
/// On push the input is processed by the wrapped node and the output, if
/// any, is forwarded to every connected destination. Destinations live in a
/// `DashMap` so outputs can be attached while audio is flowing.
pub struct GraphNode<N: Node> {
    node: N,
    outputs: DashMap<OutputId, Arc<dyn Pushable<N::Output>>>,
    next_output_id: AtomicU64,
}

impl<N: Node> GraphNode<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            outputs: DashMap::new(),
            next_output_id: AtomicU64::new(0),
        }
    }

    pub fn add_output(&self, dest: Arc<dyn Pushable<N::Output>>) -> OutputId {
        let id = self.next_output_id.fetch_add(1, Ordering::Relaxed);
        self.outputs.insert(id, dest);
        id
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }
}

impl<N: Node> Pushable<N::Input> for GraphNode<N>
where
    N::Output: Clone,
{
    fn push(&self, input: N::Input) {
        if let Some(output) = self.node.process(input) {
            for entry in self.outputs.iter() {
                entry.value().push(output.clone());
            }
        }
    }
}
