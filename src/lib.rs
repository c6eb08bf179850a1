//! TickCore is the event-ordering core of a discrete event simulation kernel. It holds all pending events keyed
//! by the simulated time (_tick_) and _priority_ at which they must run, and hands them back to the dispatch loop
//! in strict execution order. Domain models built on top of it interact with the core only by scheduling callbacks
//! at future ticks and by canceling or querying previously scheduled callbacks.
//!
//! ## Contents
//!
//! - [Basic Concepts](crate#basic-concepts)
//! - [Example](crate#example)
//! - [Ordering Rules](crate#ordering-rules)
//! - [Handles and Cancellation](crate#handles-and-cancellation)
//! - [Dispatch Loop](crate#dispatch-loop)
//! - [Logging](crate#logging)
//!
//! ## Basic Concepts
//!
//! **Event.** An event is a unit of pending work: a callback which is invoked once the simulation clock reaches
//! the event's tick. Each event is scheduled with a non-negative delay relative to the current tick, an integer
//! priority and an [`EventOrder`] which decides how it is placed among events with the same tick and priority.
//!
//! **Key.** The pair `(tick, priority)` is the [`EventKey`] of an event. Keys are compared lexicographically:
//! events due earlier run first, and among events due at the same tick the one with the lower priority runs
//! first.
//!
//! **Index.** All events sharing a key are chained in one list owned by a node of the [`EventIndex`], a red-black
//! tree with one node per distinct key. Scheduling into an existing key is O(1) after the O(log n) lookup, while
//! the earliest node is cached, so selecting the next event is O(1).
//!
//! **Context.** Components of a simulation model access the scheduler through a [`SimulationContext`] created
//! for them by [`Simulation::create_context`]. Each context has a unique name and [`Id`] used in logs. The
//! callback of an event receives the context of the component which scheduled it.
//!
//! **Simulation.** [`Simulation`] owns the scheduler and drives the dispatch loop. It can dispatch events one by
//! one, until no events remain or until a given tick, and provides a simulation-wide random number generator
//! seeded by the user, so replications with the same seed produce the same results.
//!
//! ## Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use tickcore::{EventOrder, Simulation, SimulationContext};
//!
//! struct Tank {
//!     level: u64,
//!     ctx: SimulationContext,
//! }
//!
//! impl Tank {
//!     fn start_filling(tank: Rc<RefCell<Tank>>, period: u64) {
//!         let ctx = tank.borrow().ctx.clone();
//!         ctx.schedule(period, 0, EventOrder::Fifo, move |_| {
//!             let full = {
//!                 let mut tank = tank.borrow_mut();
//!                 tank.level += 1;
//!                 tank.level == 10
//!             };
//!             if !full {
//!                 Tank::start_filling(tank, period);
//!             }
//!         })
//!         .unwrap();
//!     }
//! }
//!
//! let mut sim = Simulation::new(123);
//! let tank = Rc::new(RefCell::new(Tank {
//!     level: 0,
//!     ctx: sim.create_context("tank"),
//! }));
//! Tank::start_filling(tank.clone(), 3);
//!
//! sim.run();
//! assert_eq!(tank.borrow().level, 10);
//! assert_eq!(sim.time(), 30);
//! ```
//!
//! ## Ordering Rules
//!
//! Events are dispatched in non-decreasing key order. Among events with equal keys:
//!
//! - an event scheduled with [`EventOrder::Fifo`] is queued behind all events pending at that key;
//! - an event scheduled with [`EventOrder::Lifo`] jumps ahead of all of them, including earlier LIFO events.
//!
//! The two modes can be mixed freely at the same key, which allows "interrupt now" and "queue behind" semantics
//! to coexist.
//!
//! Scheduling an event behind the key currently being dispatched is a causality violation and is rejected with
//! [`ScheduleError::OrderViolation`]. Since delays are non-negative, this can only happen when scheduling at the
//! current tick with a priority lower than the one being dispatched.
//!
//! ## Handles and Cancellation
//!
//! Scheduling returns an [`EventHandle`] which can be used to [cancel](SimulationContext::cancel) the event or to
//! check whether it [is still pending](SimulationContext::is_scheduled). Cancellation takes effect immediately and
//! is always safe: canceling an event that already fired or was already canceled does nothing. The binding between
//! handles and events is kept by the scheduler, and a handle is unbound right before its event's callback runs,
//! so a callback inspecting its own handle sees it as not scheduled.
//!
//! A caller-held handle can also be created upfront via [`SimulationContext::create_handle`] and bound with
//! [`SimulationContext::schedule_bound`]. Binding a handle which is still bound to a pending event is rejected
//! with [`ScheduleError::AlreadyBound`].
//!
//! ## Dispatch Loop
//!
//! The loop moves between the [`DispatchState`]s _Idle_, _Advancing_ and _Running_. When advancing, it selects the
//! node with the earliest key and sets the clock to its tick. While running a node, it repeatedly unlinks the head
//! event of the node and invokes its callback. Callbacks may schedule new events at the current key, these are
//! added to the running node and dispatched before it is considered empty. Once the node's list is empty, the node
//! is removed from the index and the loop advances to the next one.
//!
//! Callbacks run to completion one at a time. A simulation instance and its contexts are bound to a single
//! thread; independent instances may run on separate threads.
//!
//! ## Logging
//!
//! The scheduler reports its activity via the [log](https://docs.rs/log) facade. The [`log_trace!`],
//! [`log_debug!`], [`log_info!`], [`log_warn!`] and [`log_error!`] macros can be used by components to emit
//! messages prefixed with the current tick and the component name.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod arena;
pub mod component;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod index;
mod list;
pub mod log;
pub mod simulation;
mod state;

pub use colored;
pub use component::Id;
pub use config::SimulationConfig;
pub use context::SimulationContext;
pub use error::{InvariantViolation, ScheduleError};
pub use event::{Callback, EventHandle, EventKey, EventOrder, Priority, Tick};
pub use index::{EventIndex, NodeId};
pub use simulation::{DispatchState, Simulation, SimulationStats};
