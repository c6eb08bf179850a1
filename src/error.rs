//! Error types.

use thiserror::Error;

use crate::event::{EventKey, Tick};

/// Caller misuse reported by scheduling operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// The event would be due before the key currently being dispatched.
    #[error("event at {requested} scheduled behind the current dispatch position {current}")]
    OrderViolation {
        /// Key the caller asked for.
        requested: EventKey,
        /// Key of the node being dispatched, or the start of the current tick.
        current: EventKey,
    },
    /// The handle is still bound to a pending event.
    #[error("handle {handle} is already bound to a pending event")]
    AlreadyBound {
        /// Identifier of the handle.
        handle: u64,
    },
    /// `current tick + delay` does not fit into a tick.
    #[error("tick overflow: {current} + {delay}")]
    TickOverflow {
        /// Current tick.
        current: Tick,
        /// Requested delay.
        delay: Tick,
    },
}

/// Broken internal invariant of the scheduler. Any of these indicates a defect.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// The root node is red.
    #[error("root node is red")]
    RedRoot,
    /// A red node has a red child.
    #[error("red node {key} has a red child")]
    RedRed {
        /// Key of the parent node.
        key: EventKey,
    },
    /// The subtrees of a node have different black heights.
    #[error("black height mismatch below {key}: {left} vs {right}")]
    BlackHeight {
        /// Key of the node.
        key: EventKey,
        /// Black height of the left subtree.
        left: usize,
        /// Black height of the right subtree.
        right: usize,
    },
    /// A node is out of search order.
    #[error("node {key} violates search order")]
    KeyOrder {
        /// Key of the node.
        key: EventKey,
    },
    /// Parent and child links disagree.
    #[error("parent link of {key} is broken")]
    BrokenParentLink {
        /// Key of the node with the wrong parent.
        key: EventKey,
    },
    /// A released node is still reachable.
    #[error("released node {key} is reachable from the root")]
    UnlinkedNode {
        /// Key of the node.
        key: EventKey,
    },
    /// Tracked node count differs from the number of reachable nodes.
    #[error("index tracks {expected} nodes but {found} are reachable")]
    NodeCount {
        /// Tracked count.
        expected: usize,
        /// Reachable count.
        found: usize,
    },
    /// The cached minimum is not the leftmost node.
    #[error("cached minimum is stale")]
    StaleMinimum,
    /// A node without events is present outside of its dispatch.
    #[error("node {key} has no pending events")]
    EmptyNode {
        /// Key of the node.
        key: EventKey,
    },
    /// An event links to a node other than the one holding it.
    #[error("event in node {key} points to another node")]
    MisplacedEvent {
        /// Key of the node holding the event.
        key: EventKey,
    },
    /// Number of linked events differs from the number of stored events.
    #[error("{found} events are linked but {expected} are stored")]
    EventCount {
        /// Stored events.
        expected: usize,
        /// Linked events.
        found: usize,
    },
    /// Handle table and event back-references disagree.
    #[error("binding of handle {handle} is inconsistent")]
    Binding {
        /// Identifier of the handle.
        handle: u64,
    },
}
