//! Event keys, ordering modes, handles and the internal event record.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arena::ArenaIndex;
use crate::component::Id;
use crate::context::SimulationContext;
use crate::index::NodeId;

/// Simulated time unit, the primary ordering key.
pub type Tick = u64;

/// Secondary ordering key among events sharing a tick. Lower values run first.
pub type Priority = i64;

/// Work executed when an event is dispatched.
///
/// The callback receives the context of the component that scheduled it, so it can schedule follow-up
/// events, cancel others or inspect the clock.
pub type Callback = Box<dyn FnOnce(&SimulationContext)>;

/// Dispatch key of an event: `(tick, priority)`, compared lexicographically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Tick at which the event is due.
    pub tick: Tick,
    /// Priority among events due at the same tick.
    pub priority: Priority,
}

impl EventKey {
    /// Creates a key.
    pub const fn new(tick: Tick, priority: Priority) -> Self {
        Self { tick, priority }
    }

    /// The smallest key at `tick`.
    pub const fn tick_start(tick: Tick) -> Self {
        Self::new(tick, Priority::MIN)
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tick
            .cmp(&other.tick)
            .then_with(|| self.priority.cmp(&other.priority))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tick, self.priority)
    }
}

/// Placement of a new event among already pending events with the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrder {
    /// Queue behind everything already pending at the key.
    Fifo,
    /// Jump ahead of everything already pending at the key, including earlier LIFO inserts.
    Lifo,
}

/// Identifier of a handle, unique within one simulation and never reused.
pub(crate) type HandleId = u64;

/// Caller-held token for canceling or querying one scheduled event.
///
/// A handle is a plain identifier: the binding between handle and event is stored by the scheduler, so
/// copies of a handle all observe the same state. Once the bound event fires or is canceled the handle
/// reports "not scheduled" forever, unless it is explicitly bound again via
/// [`SimulationContext::schedule_bound`](crate::SimulationContext::schedule_bound).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventHandle {
    pub(crate) id: HandleId,
}

impl EventHandle {
    /// Returns the numeric identifier of the handle.
    pub fn id(&self) -> u64 {
        self.id
    }
}

pub(crate) type EventId = ArenaIndex;

/// A pending event, owned by the list of the index node whose key it matches.
pub(crate) struct Event {
    pub callback: Callback,
    pub next: Option<EventId>,
    // Non-owning back-reference to the node holding this event.
    pub node: NodeId,
    pub handle: Option<HandleId>,
    pub owner: Id,
}

impl Event {
    pub fn new(callback: Callback, node: NodeId, owner: Id) -> Self {
        Self {
            callback,
            next: None,
            node,
            handle: None,
            owner,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("next", &self.next)
            .field("node", &self.node)
            .field("handle", &self.handle)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
