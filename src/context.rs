//! Accessing simulation from components.

use std::cell::RefCell;
use std::rc::Rc;

use rand::distributions::uniform::{SampleRange, SampleUniform};

use crate::component::Id;
use crate::error::ScheduleError;
use crate::event::{Callback, EventHandle, EventOrder, Priority, Tick};
use crate::log_trace;
use crate::simulation::DispatchState;
use crate::state::SimulationState;

/// A facade for accessing the scheduler from simulation components.
///
/// A context is created for a named component via
/// [`Simulation::create_context`](crate::Simulation::create_context) and is usually stored inside the
/// component. Contexts are cheap to clone and all clones share the scheduler of their simulation. Event
/// callbacks receive the context of the component which scheduled them.
///
/// A context must only be used from the thread owning its simulation.
#[derive(Clone)]
pub struct SimulationContext {
    id: Id,
    name: Rc<str>,
    sim_state: Rc<RefCell<SimulationState>>,
}

impl SimulationContext {
    pub(crate) fn new(id: Id, name: &str, sim_state: Rc<RefCell<SimulationState>>) -> Self {
        Self {
            id,
            name: Rc::from(name),
            sim_state,
        }
    }

    /// Returns the identifier of component associated with this context.
    pub fn id(&self) -> Id {
        self.id
    }

    /// Returns the name of component associated with this context.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current simulation time: the tick of the event being dispatched, or of the last
    /// dispatched one when called outside of a callback.
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

    /// Schedules `callback` to run `delay` ticks from now with the given `priority`.
    ///
    /// Among events with the same tick, events with lower priority run first. Among events with the
    /// same tick and priority, `order` selects whether the new event runs after ([`EventOrder::Fifo`])
    /// or before ([`EventOrder::Lifo`]) those already pending.
    ///
    /// A callback may schedule further events at the current tick. Those with a priority at least equal
    /// to the one being dispatched run before the clock advances, while lower priorities are rejected
    /// with [`ScheduleError::OrderViolation`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::cell::RefCell;
    /// use std::rc::Rc;
    /// use tickcore::{EventOrder, Simulation};
    ///
    /// let mut sim = Simulation::new(123);
    /// let ctx = sim.create_context("comp");
    /// let trace = Rc::new(RefCell::new(Vec::new()));
    ///
    /// for (delay, name) in [(5, "A"), (5, "B"), (3, "C")] {
    ///     let trace = trace.clone();
    ///     ctx.schedule(delay, 0, EventOrder::Fifo, move |ctx| {
    ///         trace.borrow_mut().push((ctx.time(), name));
    ///     })
    ///     .unwrap();
    /// }
    ///
    /// sim.run();
    /// assert_eq!(*trace.borrow(), vec![(3, "C"), (5, "A"), (5, "B")]);
    /// ```
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
        self.schedule_inner(delay, priority, order, Box::new(callback), None)
    }

    /// Same as [`schedule`](Self::schedule), but binds the event to a handle obtained from
    /// [`create_handle`](Self::create_handle).
    ///
    /// Returns [`ScheduleError::AlreadyBound`] if `handle` is still bound to a pending event. A handle
    /// becomes free again once its event has fired or was canceled.
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
        self.schedule_inner(delay, priority, order, Box::new(callback), Some(handle))
            .map(|_| ())
    }

    /// Creates a handle that is not bound to any event.
    pub fn create_handle(&self) -> EventHandle {
        self.sim_state.borrow_mut().create_handle()
    }

    /// Cancels the event bound to `handle`.
    ///
    /// Returns `true` if a pending event was canceled. Canceling a handle that was never bound, whose
    /// event already fired or was already canceled does nothing and returns `false`.
    pub fn cancel(&self, handle: EventHandle) -> bool {
        let canceled = self.sim_state.borrow_mut().cancel(handle);
        match canceled {
            Some((key, callback)) => {
                // the callback may own values whose destructors reach back into the scheduler
                drop(callback);
                log_trace!(self, "canceled event {} at {}", handle.id(), key);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if `handle` is bound to a pending event.
    pub fn is_scheduled(&self, handle: EventHandle) -> bool {
        self.sim_state.borrow().is_scheduled(handle)
    }

    /// Asks the dispatch loop to return after the event currently being dispatched.
    ///
    /// Pending events are kept and a later run resumes with them.
    pub fn request_stop(&self) {
        self.sim_state.borrow_mut().request_stop();
    }

    /// Returns a random float in the range _[0, 1)_ using the simulation-wide random number generator.
    pub fn rand(&self) -> f64 {
        self.sim_state.borrow_mut().rand()
    }

    /// Returns a random number in the specified range using the simulation-wide random number generator.
    pub fn gen_range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.sim_state.borrow_mut().gen_range(range)
    }

    fn schedule_inner(
        &self,
        delay: Tick,
        priority: Priority,
        order: EventOrder,
        callback: Callback,
        handle: Option<EventHandle>,
    ) -> Result<EventHandle, ScheduleError> {
        // a rejected callback is dropped only after the state borrow is released
        let mut state = self.sim_state.borrow_mut();
        let (key, handle) = state.prepare(delay, priority, handle)?;
        state.schedule(self.id, key, handle, order, callback);
        drop(state);
        log_trace!(self, "scheduled event {} at {} ({:?})", handle.id(), key, order);
        Ok(handle)
    }
}
