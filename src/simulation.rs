//! Simulation configuration and execution.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::component::Id;
use crate::config::SimulationConfig;
use crate::context::SimulationContext;
use crate::error::{InvariantViolation, ScheduleError};
use crate::event::{EventHandle, EventKey, EventOrder, Priority, Tick};
use crate::state::SimulationState;
use crate::{log_debug, log_trace};

/// Name of the root context owned by the simulation itself.
pub const ROOT_CONTEXT: &str = "simulation";

/// Phase of the dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DispatchState {
    /// No pending events.
    Idle,
    /// Events are pending, the next one is selected on the next step.
    Advancing,
    /// The events of the node with `key` are being dispatched.
    Running {
        /// Key of the node being dispatched.
        key: EventKey,
    },
}

/// Counters collected over the lifetime of a simulation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SimulationStats {
    /// Events successfully scheduled.
    pub scheduled: u64,
    /// Events whose callbacks were invoked.
    pub dispatched: u64,
    /// Events canceled before they fired.
    pub canceled: u64,
    /// Index nodes created for new keys.
    pub nodes_created: u64,
    /// Index nodes removed after their last event.
    pub nodes_removed: u64,
    /// Largest number of simultaneously pending events.
    pub max_pending: usize,
}

/// Represents a simulation, provides methods for its configuration and execution.
///
/// The simulation owns the event scheduler and drives the dispatch loop: it repeatedly selects the
/// pending event with the smallest `(tick, priority)` key, advances the clock to its tick and invokes its
/// callback. Components interact with the scheduler through [`SimulationContext`] instances created by
/// [`create_context`](Self::create_context).
pub struct Simulation {
    sim_state: Rc<RefCell<SimulationState>>,
    contexts: Vec<SimulationContext>,
    name_to_id: FxHashMap<String, Id>,
}

impl Simulation {
    /// Creates a new simulation with specified random seed.
    pub fn new(seed: u64) -> Self {
        Self::with_config(SimulationConfig::with_seed(seed))
    }

    /// Creates a new simulation with specified configuration.
    pub fn with_config(config: SimulationConfig) -> Self {
        let sim_state = Rc::new(RefCell::new(SimulationState::new(&config)));
        let mut sim = Self {
            sim_state,
            contexts: Vec::new(),
            name_to_id: FxHashMap::default(),
        };
        sim.create_context(ROOT_CONTEXT);
        log_debug!(sim.root(), "created simulation with {:?}", config);
        sim
    }

    /// Creates a new simulation context with specified name.
    ///
    /// # Panics
    ///
    /// Panics if a context with this name already exists.
    pub fn create_context<S>(&mut self, name: S) -> SimulationContext
    where
        S: AsRef<str>,
    {
        let name = name.as_ref();
        assert!(
            !self.name_to_id.contains_key(name),
            "context with name {} already exists",
            name
        );
        let id = Id::try_from(self.contexts.len()).expect("too many contexts");
        let ctx = SimulationContext::new(id, name, self.sim_state.clone());
        self.name_to_id.insert(name.to_owned(), id);
        self.contexts.push(ctx.clone());
        ctx
    }

    /// Returns the identifier of component by its name.
    pub fn lookup_id(&self, name: &str) -> Option<Id> {
        self.name_to_id.get(name).copied()
    }

    /// Returns the name of component by its identifier.
    pub fn lookup_name(&self, id: Id) -> Option<&str> {
        self.contexts.get(id as usize).map(|ctx| ctx.name())
    }

    /// Returns the root context, which is used by the scheduling methods of the simulation itself.
    pub fn root(&self) -> &SimulationContext {
        &self.contexts[0]
    }

    /// Returns the current simulation time.
    pub fn time(&self) -> Tick {
        self.sim_state.borrow().time()
    }

    /// Same as [`time`](Self::time).
    pub fn current_tick(&self) -> Tick {
        self.time()
    }

    /// Returns the state of the dispatch loop.
    pub fn dispatch_state(&self) -> DispatchState {
        self.sim_state.borrow().dispatch_state()
    }

    /// Schedules `callback` via the root context, see [`SimulationContext::schedule`].
    pub fn schedule<F>(
        &self,
        delay: Tick,
        priority: Priority,
        order: EventOrder,
        callback: F,
    ) -> Result<EventHandle, ScheduleError>
    where
        F: FnOnce(&SimulationContext) + 'static,
    {
        self.root().schedule(delay, priority, order, callback)
    }

    /// Schedules `callback` bound to `handle` via the root context, see
    /// [`SimulationContext::schedule_bound`].
    pub fn schedule_bound<F>(
        &self,
        handle: EventHandle,
        delay: Tick,
        priority: Priority,
        order: EventOrder,
        callback: F,
    ) -> Result<(), ScheduleError>
    where
        F: FnOnce(&SimulationContext) + 'static,
    {
        self.root().schedule_bound(handle, delay, priority, order, callback)
    }

    /// Creates a handle that is not bound to any event.
    pub fn create_handle(&self) -> EventHandle {
        self.root().create_handle()
    }

    /// Cancels the event bound to `handle`, see [`SimulationContext::cancel`].
    pub fn cancel(&self, handle: EventHandle) -> bool {
        self.root().cancel(handle)
    }

    /// Returns `true` if `handle` is bound to a pending event.
    pub fn is_scheduled(&self, handle: EventHandle) -> bool {
        self.root().is_scheduled(handle)
    }

    /// Asks a running [`run`](Self::run) or [`run_until`](Self::run_until) to return.
    pub fn request_stop(&self) {
        self.root().request_stop()
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&self) -> f64 {
        self.root().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.root().gen_range(range)
    }

    /// Returns the number of pending events.
    pub fn pending_events(&self) -> usize {
        self.sim_state.borrow().pending_events()
    }

    /// Returns the keys with pending events in dispatch order, together with the number of events at
    /// each key.
    pub fn pending_keys(&self) -> Vec<(EventKey, usize)> {
        self.sim_state.borrow().pending_keys()
    }

    /// Returns the counters collected so far.
    pub fn stats(&self) -> SimulationStats {
        self.sim_state.borrow().stats()
    }

    /// Validates the internal structures of the scheduler.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        self.sim_state.borrow().check_invariants()
    }

    /// Dispatches the next pending event.
    ///
    /// The clock is advanced to the event's tick, the handle bound to the event is cleared and then the
    /// callback is invoked. Returns `false` if there were no pending events.
    pub fn step(&mut self) -> bool {
        let next = self.sim_state.borrow_mut().take_next();
        let Some(dispatch) = next else {
            return false;
        };
        let ctx = match self.contexts.get(dispatch.owner as usize) {
            Some(ctx) => ctx,
            None => panic!("event owned by unknown component {}", dispatch.owner),
        };
        log_trace!(ctx, "dispatching event {} at {}", dispatch.handle, dispatch.key);
        (dispatch.callback)(ctx);
        self.sim_state.borrow_mut().finish_event();
        true
    }

    /// Performs the specified number of steps.
    ///
    /// Returns `true` if there could be more pending events and `false` otherwise.
    pub fn steps(&mut self, step_count: u64) -> bool {
        for _ in 0..step_count {
            if !self.step() {
                return false;
            }
        }
        true
    }

    /// Dispatches events until there are no pending events or a stop is requested.
    pub fn run(&mut self) {
        loop {
            if self.sim_state.borrow_mut().take_stop() {
                log_debug!(self.root(), "stop requested");
                break;
            }
            if !self.step() {
                break;
            }
        }
        self.sim_state.borrow_mut().take_stop();
        self.log_stats();
    }

    /// Same as [`run`](Self::run).
    pub fn step_until_no_events(&mut self) {
        self.run()
    }

    /// Dispatches all events due at or before `tick`, then advances the clock to `tick`.
    ///
    /// If a stop is requested, returns right after the current event without advancing the clock. Returns
    /// `true` if there are pending events left.
    pub fn run_until(&mut self, tick: Tick) -> bool {
        let mut stopped = false;
        loop {
            if self.sim_state.borrow_mut().take_stop() {
                log_debug!(self.root(), "stop requested");
                stopped = true;
                break;
            }
            let next = self.sim_state.borrow().next_tick();
            match next {
                Some(next) if next <= tick => {
                    self.step();
                }
                _ => break,
            }
        }
        if !stopped {
            self.sim_state.borrow_mut().advance_to(tick);
        }
        self.sim_state.borrow_mut().take_stop();
        self.pending_events() > 0
    }

    /// Same as [`run_until`](Self::run_until) with `tick = current tick + duration`.
    pub fn step_for_duration(&mut self, duration: Tick) -> bool {
        let end = self.time().saturating_add(duration);
        self.run_until(end)
    }

    fn log_stats(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        match serde_json::to_string(&self.stats()) {
            Ok(stats) => log_debug!(self.root(), "dispatch finished: {}", stats),
            Err(e) => log_debug!(self.root(), "dispatch finished, stats unavailable: {}", e),
        }
    }
}
