use log::{debug, trace};
use rand::distributions::uniform::{SampleRange, SampleUniform};
use rand::prelude::*;
use rand_pcg::Pcg64;
use rustc_hash::FxHashMap;

use crate::arena::Arena;
use crate::component::Id;
use crate::config::SimulationConfig;
use crate::error::{InvariantViolation, ScheduleError};
use crate::event::{Callback, Event, EventHandle, EventId, EventKey, EventOrder, HandleId, Priority, Tick};
use crate::index::{EventIndex, NodeId};
use crate::simulation::{DispatchState, SimulationStats};

/// Event taken off the index by the driver, ready to be invoked.
pub(crate) struct Dispatch {
    pub key: EventKey,
    pub owner: Id,
    pub handle: HandleId,
    pub callback: Callback,
}

pub(crate) struct SimulationState {
    // key of the node being (or last) dispatched; new events may not be placed before it
    floor: EventKey,
    index: EventIndex,
    events: Arena<Event>,
    handles: FxHashMap<HandleId, EventId>,
    next_handle: HandleId,
    running: Option<NodeId>,
    // set while the callback of a taken event is in progress
    dispatching: bool,
    stop_requested: bool,
    rand: Pcg64,
    stats: SimulationStats,
    check_invariants: bool,
}

impl SimulationState {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            floor: EventKey::tick_start(0),
            index: EventIndex::with_capacity(config.initial_capacity),
            events: Arena::with_capacity(config.initial_capacity),
            handles: FxHashMap::default(),
            next_handle: 0,
            running: None,
            dispatching: false,
            stop_requested: false,
            rand: Pcg64::seed_from_u64(config.seed),
            stats: SimulationStats::default(),
            check_invariants: config.check_invariants,
        }
    }

    pub fn time(&self) -> Tick {
        self.floor.tick
    }

    pub fn create_handle(&mut self) -> EventHandle {
        let id = self.next_handle;
        self.next_handle += 1;
        EventHandle { id }
    }

    /// Checks where an event would be placed and picks the handle to bind it to.
    pub fn prepare(
        &mut self,
        delay: Tick,
        priority: Priority,
        handle: Option<EventHandle>,
    ) -> Result<(EventKey, EventHandle), ScheduleError> {
        let tick = self.floor.tick.checked_add(delay).ok_or(ScheduleError::TickOverflow {
            current: self.floor.tick,
            delay,
        })?;
        let key = EventKey::new(tick, priority);
        if key < self.floor {
            return Err(ScheduleError::OrderViolation {
                requested: key,
                current: self.floor,
            });
        }
        let handle = match handle {
            Some(handle) if self.handles.contains_key(&handle.id) => {
                return Err(ScheduleError::AlreadyBound { handle: handle.id });
            }
            Some(handle) => handle,
            None => self.create_handle(),
        };
        Ok((key, handle))
    }

    /// Links a new event at a key and handle returned by [`prepare`](Self::prepare).
    pub fn schedule(
        &mut self,
        owner: Id,
        key: EventKey,
        handle: EventHandle,
        order: EventOrder,
        callback: Callback,
    ) {
        let (node, created) = self.index.entry(key);
        if created {
            self.stats.nodes_created += 1;
            debug!("node {} created, {} nodes pending", key, self.index.len());
        }
        let mut event = Event::new(callback, node, owner);
        event.handle = Some(handle.id);
        let id = self.events.insert(event);
        let list = self.index.list_mut(node);
        match order {
            EventOrder::Fifo => list.append(&mut self.events, id),
            EventOrder::Lifo => list.prepend(&mut self.events, id),
        }
        self.handles.insert(handle.id, id);

        self.stats.scheduled += 1;
        self.stats.max_pending = self.stats.max_pending.max(self.events.len());
        trace!("event {:?} bound to handle {} at {} ({:?})", id, handle.id, key, order);
        if created {
            self.assert_invariants();
        }
    }

    /// Unlinks the event bound to `handle` and returns its callback, which the caller drops once the
    /// state is no longer borrowed.
    pub fn cancel(&mut self, handle: EventHandle) -> Option<(EventKey, Callback)> {
        let id = self.handles.remove(&handle.id)?;
        let node = match self.events.get(id) {
            Some(event) => event.node,
            None => panic!("handle {} bound to missing event {:?}", handle.id, id),
        };
        let key = self.index.key(node);
        let unlinked = self.index.list_mut(node).remove(&mut self.events, id);
        assert!(unlinked, "event {:?} is not linked in node {}", id, key);
        let event = match self.events.remove(id) {
            Some(event) => event,
            None => unreachable!(),
        };
        trace!("event {:?} at {} canceled via handle {}", id, key, handle.id);

        // the running node is removed by the driver once the event in progress returns
        if self.index.list(node).is_empty() && !self.is_dispatching(node) {
            if self.running == Some(node) {
                self.running = None;
            }
            self.remove_node(node);
        }
        self.stats.canceled += 1;
        Some((key, event.callback))
    }

    pub fn is_scheduled(&self, handle: EventHandle) -> bool {
        self.handles.contains_key(&handle.id)
    }

    /// Tick of the next event to be dispatched.
    pub fn next_tick(&self) -> Option<Tick> {
        match self.running {
            Some(node) if !self.index.list(node).is_empty() => Some(self.index.key(node).tick),
            _ => self.index.minimum().map(|node| self.index.key(node).tick),
        }
    }

    /// Unlinks the next event in dispatch order and clears its handle binding.
    pub fn take_next(&mut self) -> Option<Dispatch> {
        let node = match self.running {
            Some(node) => node,
            None => {
                let node = self.index.minimum()?;
                let key = self.index.key(node);
                debug_assert!(key >= self.floor, "node {} due before {}", key, self.floor);
                self.floor = key;
                self.running = Some(node);
                trace!("entering node {} with {} events", key, self.index.list(node).len());
                node
            }
        };
        let key = self.index.key(node);
        let id = match self.index.list_mut(node).pop_front(&mut self.events) {
            Some(id) => id,
            None => panic!("running node {} has no events", key),
        };
        let event = match self.events.remove(id) {
            Some(event) => event,
            None => panic!("node {} links missing event {:?}", key, id),
        };
        let handle = match event.handle {
            Some(handle) => handle,
            None => panic!("event {:?} at {} has no handle", id, key),
        };
        self.handles.remove(&handle);
        self.dispatching = true;
        self.stats.dispatched += 1;
        Some(Dispatch {
            key,
            owner: event.owner,
            handle,
            callback: event.callback,
        })
    }

    /// Called by the driver after the callback of a dispatched event returned.
    pub fn finish_event(&mut self) {
        self.dispatching = false;
        if let Some(node) = self.running {
            if self.index.list(node).is_empty() {
                self.running = None;
                self.remove_node(node);
            }
        }
        self.assert_invariants();
    }

    /// Moves the clock forward to `tick` unless events are pending before it.
    pub fn advance_to(&mut self, tick: Tick) {
        if tick <= self.floor.tick || self.running.is_some() {
            return;
        }
        if self.next_tick().is_some_and(|next| next <= tick) {
            return;
        }
        self.floor = EventKey::tick_start(tick);
    }

    pub fn dispatch_state(&self) -> DispatchState {
        match self.running {
            Some(node) => DispatchState::Running {
                key: self.index.key(node),
            },
            None if self.index.is_empty() => DispatchState::Idle,
            None => DispatchState::Advancing,
        }
    }

    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub fn take_stop(&mut self) -> bool {
        std::mem::take(&mut self.stop_requested)
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn pending_keys(&self) -> Vec<(EventKey, usize)> {
        self.index
            .iter()
            .map(|node| (self.index.key(node), self.index.list(node).len()))
            .filter(|(_, count)| *count > 0)
            .collect()
    }

    pub fn stats(&self) -> SimulationStats {
        self.stats.clone()
    }

    pub fn rand(&mut self) -> f64 {
        self.rand.gen_range(0.0..1.0)
    }

    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rand.gen_range(range)
    }

    /// Cross-checks the tree, the per-node lists and the handle table.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.index.validate()?;
        let mut linked = 0;
        for node in self.index.iter() {
            let key = self.index.key(node);
            let list = self.index.list(node);
            if list.is_empty() && !self.is_dispatching(node) {
                return Err(InvariantViolation::EmptyNode { key });
            }
            for id in list.iter(&self.events) {
                let event = match self.events.get(id) {
                    Some(event) if event.node == node => event,
                    _ => return Err(InvariantViolation::MisplacedEvent { key }),
                };
                if let Some(handle) = event.handle {
                    if self.handles.get(&handle) != Some(&id) {
                        return Err(InvariantViolation::Binding { handle });
                    }
                }
                linked += 1;
            }
        }
        if linked != self.events.len() {
            return Err(InvariantViolation::EventCount {
                expected: self.events.len(),
                found: linked,
            });
        }
        for (&handle, &id) in &self.handles {
            if self.events.get(id).and_then(|event| event.handle) != Some(handle) {
                return Err(InvariantViolation::Binding { handle });
            }
        }
        Ok(())
    }

    fn is_dispatching(&self, node: NodeId) -> bool {
        self.dispatching && self.running == Some(node)
    }

    fn assert_invariants(&self) {
        if !self.check_invariants {
            return;
        }
        if let Err(violation) = self.check_invariants() {
            panic!("scheduler invariant violated: {}", violation);
        }
    }

    fn remove_node(&mut self, node: NodeId) {
        let key = self.index.key(node);
        self.index.remove(node);
        self.stats.nodes_removed += 1;
        debug!("node {} removed, {} nodes pending", key, self.index.len());
        self.assert_invariants();
    }
}
