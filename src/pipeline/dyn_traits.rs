//! Object-safe dynamic pipeline traits.
//!
//! # Traits
//!
//! - [`Pushable<T>`] - Can receive pushed data (capture side: microphone callback
//!   pushes frames towards the call's event queue)
//! - [`Pullable<T>`] - Can return data when pulled (playback side: the speaker
//!   callback pulls rendered audio from the scheduler)
//!
//! # Pipeline Construction
//!
//! Use [`push_chain!`](crate::push_chain) to build a push pipeline:
//!
//! ```ignore
//! let capture: Arc<dyn Pushable<AudioFrame>> = push_chain![
//!     LevelMeter::new(volume.clone()),
//!     MuteGate::new(muted.clone()),
//!     ChunkEncoder::new(16_000),
//!     => outbound.clone()
//! ];
//! ```

use std::sync::Arc;

/// Passive receiver - can receive pushed data.
///
/// When data is pushed, the implementation decides what to do with it:
/// - Process and forward to outputs (default for [`GraphNode`](super::GraphNode))
/// - Accumulate it (e.g. [`FrameBatcher`](crate::audio::FrameBatcher))
/// - Hand it over to another thread (e.g. the call's event queue)
pub trait Pushable<T>: Send + Sync {
    fn push(&self, input: T);
}

/// Passive producer - can return data when pulled.
///
/// `len` is the number of samples the caller wants. Implementations may
/// return fewer, or `None` when they have nothing at all.
pub trait Pullable<T>: Send + Sync {
    fn pull(&self, len: usize) -> Option<T>;
}

impl<T: Send + Sync> Pushable<T> for Arc<dyn Pushable<T>> {
    fn push(&self, input: T) {
        (**self).push(input)
    }
}

impl<T: Send + Sync> Pullable<T> for Arc<dyn Pullable<T>> {
    fn pull(&self, len: usize) -> Option<T> {
        (**self).pull(len)
    }
}

/// Creates a push chain from nodes, connecting them via GraphNode wrappers.
/// Returns an `Arc<dyn Pushable<FirstNode::Input>>` pointing to the first node.
///
/// # Syntax
///
/// ```ignore
/// push_chain![node1, node2, ..., => sink]
/// ```
///
/// - Nodes are automatically wrapped in `GraphNode`
/// - The `=>` marks the final destination (must be an `Arc<dyn Pushable<_>>`)
/// - Data flows: input -> node1 -> node2 -> ... -> sink
#[macro_export]
macro_rules! push_chain {
    (=> $sink:expr) => {{
        let sink: std::sync::Arc<dyn $crate::pipeline::Pushable<_>> = $sink;
        sink
    }};

    ($node:expr, $($rest:tt)+) => {{
        let node = std::sync::Arc::new($crate::pipeline::GraphNode::new($node));
        let rest = $crate::push_chain!($($rest)+);
        node.add_output(rest);
        node as std::sync::Arc<dyn $crate::pipeline::Pushable<_>>
    }};
}
