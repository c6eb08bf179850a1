use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tickcore::{
    log_debug, log_info, DispatchState, EventKey, EventOrder, ScheduleError, Simulation, SimulationConfig,
    SimulationContext, Tick,
};

type Trace = Rc<RefCell<Vec<(Tick, &'static str)>>>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(trace: &Trace, name: &'static str) -> impl FnOnce(&SimulationContext) + 'static {
    let trace = trace.clone();
    move |ctx| trace.borrow_mut().push((ctx.time(), name))
}

#[test]
fn zero_delay_chain_runs_before_tick_advances() {
    init_logger();
    let mut sim = Simulation::new(123);
    let trace = Trace::default();
    sim.schedule(5, 0, EventOrder::Fifo, record(&trace, "later")).unwrap();
    {
        let trace = trace.clone();
        sim.schedule(4, 0, EventOrder::Fifo, move |ctx| {
            trace.borrow_mut().push((ctx.time(), "first"));
            ctx.schedule(0, 0, EventOrder::Fifo, record(&trace, "chained")).unwrap();
        })
        .unwrap();
    }
    sim.run();
    assert_eq!(*trace.borrow(), vec![(4, "first"), (4, "chained"), (5, "later")]);
}

#[test]
fn zero_delay_into_running_node_honors_order() {
    init_logger();
    let mut sim = Simulation::new(123);
    let trace = Trace::default();
    {
        let trace = trace.clone();
        sim.schedule(4, 0, EventOrder::Fifo, move |ctx| {
            trace.borrow_mut().push((ctx.time(), "A"));
            ctx.schedule(0, 0, EventOrder::Fifo, record(&trace, "queued")).unwrap();
            ctx.schedule(0, 0, EventOrder::Lifo, record(&trace, "interrupt")).unwrap();
        })
        .unwrap();
    }
    sim.schedule(4, 0, EventOrder::Fifo, record(&trace, "B")).unwrap();
    sim.run();
    assert_eq!(
        *trace.borrow(),
        vec![(4, "A"), (4, "interrupt"), (4, "B"), (4, "queued")]
    );
    // the key was served by a single node
    assert_eq!(sim.stats().nodes_created, 1);
}

#[test]
fn higher_priority_at_same_tick_runs_before_next_tick() {
    init_logger();
    let mut sim = Simulation::new(123);
    let trace = Trace::default();
    sim.schedule(2, 0, EventOrder::Fifo, record(&trace, "next tick")).unwrap();
    {
        let trace = trace.clone();
        sim.schedule(1, 0, EventOrder::Fifo, move |ctx| {
            trace.borrow_mut().push((ctx.time(), "p0"));
            ctx.schedule(0, 7, EventOrder::Fifo, record(&trace, "p7")).unwrap();
            ctx.schedule(0, 3, EventOrder::Fifo, record(&trace, "p3")).unwrap();
        })
        .unwrap();
    }
    sim.run();
    assert_eq!(
        *trace.borrow(),
        vec![(1, "p0"), (1, "p3"), (1, "p7"), (2, "next tick")]
    );
}

#[test]
fn long_zero_delay_chain() {
    init_logger();
    fn chain(ctx: &SimulationContext, left: u32, count: Rc<Cell<u32>>) {
        count.set(count.get() + 1);
        if left > 0 {
            ctx.schedule(0, 1, EventOrder::Fifo, move |ctx| chain(ctx, left - 1, count))
                .unwrap();
        }
    }

    let mut sim = Simulation::new(123);
    let count = Rc::new(Cell::new(0));
    let at_next_tick = Rc::new(Cell::new(0));
    {
        let count = count.clone();
        sim.schedule(3, 1, EventOrder::Fifo, move |ctx| chain(ctx, 999, count))
            .unwrap();
    }
    {
        let count = count.clone();
        let at_next_tick = at_next_tick.clone();
        sim.schedule(4, 0, EventOrder::Fifo, move |_| at_next_tick.set(count.get()))
            .unwrap();
    }
    sim.run();
    assert_eq!(at_next_tick.get(), 1000);
    assert_eq!(sim.stats().nodes_created, 2);
}

#[test]
fn scheduling_behind_current_key_is_rejected() {
    init_logger();
    let mut sim = Simulation::new(123);
    let result = Rc::new(RefCell::new(None));
    {
        let result = result.clone();
        sim.schedule(4, 2, EventOrder::Fifo, move |ctx| {
            let err = ctx
                .schedule(0, 1, EventOrder::Lifo, |_| panic!("must not be scheduled"))
                .unwrap_err();
            *result.borrow_mut() = Some(err);
            // equal key is fine
            ctx.schedule(0, 2, EventOrder::Lifo, |_| {}).unwrap();
        })
        .unwrap();
    }
    sim.run();
    assert_eq!(
        *result.borrow(),
        Some(ScheduleError::OrderViolation {
            requested: EventKey::new(4, 1),
            current: EventKey::new(4, 2),
        })
    );
    assert_eq!(sim.stats().dispatched, 2);
    assert_eq!(sim.stats().scheduled, 2);

    // the floor stays at the last dispatched key once the loop is idle
    assert!(matches!(
        sim.schedule(0, 0, EventOrder::Fifo, |_| {}),
        Err(ScheduleError::OrderViolation { .. })
    ));
    sim.schedule(0, 2, EventOrder::Fifo, |_| {}).unwrap();
    sim.schedule(1, -100, EventOrder::Fifo, |_| {}).unwrap();
}

#[test]
fn tick_overflow_is_rejected() {
    init_logger();
    let mut sim = Simulation::new(123);
    sim.run_until(Tick::MAX - 1);
    assert_eq!(sim.time(), Tick::MAX - 1);
    assert_eq!(
        sim.schedule(2, 0, EventOrder::Fifo, |_| {}).unwrap_err(),
        ScheduleError::TickOverflow {
            current: Tick::MAX - 1,
            delay: 2
        }
    );
    sim.schedule(1, 0, EventOrder::Fifo, |_| {}).unwrap();
    sim.run();
    assert_eq!(sim.time(), Tick::MAX);
}

#[test]
fn dispatch_state_transitions() {
    init_logger();
    let mut sim = Simulation::new(123);
    assert_eq!(sim.dispatch_state(), DispatchState::Idle);
    let seen = Rc::new(RefCell::new(Vec::new()));
    for (delay, priority) in [(2, 1), (2, 1), (5, -3)] {
        let seen = seen.clone();
        sim.schedule(delay, priority, EventOrder::Fifo, move |ctx| {
            seen.borrow_mut().push((ctx.current_tick(), ctx.dispatch_state()));
        })
        .unwrap();
    }
    assert_eq!(sim.dispatch_state(), DispatchState::Advancing);

    assert!(sim.step());
    assert_eq!(
        sim.dispatch_state(),
        DispatchState::Running {
            key: EventKey::new(2, 1)
        }
    );
    assert!(sim.step());
    assert_eq!(sim.dispatch_state(), DispatchState::Advancing);
    assert!(sim.step());
    assert_eq!(sim.dispatch_state(), DispatchState::Idle);
    assert!(!sim.step());

    let running = |tick, priority| {
        (
            tick,
            DispatchState::Running {
                key: EventKey::new(tick, priority),
            },
        )
    };
    assert_eq!(
        *seen.borrow(),
        vec![running(2, 1), running(2, 1), running(5, -3)]
    );
}

#[test]
fn run_until_dispatches_due_events_and_moves_clock() {
    init_logger();
    let mut sim = Simulation::new(123);
    let trace = Trace::default();
    sim.schedule(3, 0, EventOrder::Fifo, record(&trace, "3")).unwrap();
    sim.schedule(5, 9, EventOrder::Fifo, record(&trace, "5")).unwrap();
    sim.schedule(10, 0, EventOrder::Fifo, record(&trace, "10")).unwrap();

    assert!(sim.run_until(5));
    assert_eq!(sim.time(), 5);
    assert_eq!(*trace.borrow(), vec![(3, "3"), (5, "5")]);

    assert!(sim.run_until(7));
    assert_eq!(sim.time(), 7);
    // the whole tick 7 is open again
    sim.schedule(0, -100, EventOrder::Fifo, record(&trace, "7")).unwrap();

    // going back is a no-op
    assert!(sim.run_until(2));
    assert_eq!(sim.time(), 7);

    assert!(!sim.step_for_duration(3));
    assert_eq!(sim.time(), 10);
    assert_eq!(
        *trace.borrow(),
        vec![(3, "3"), (5, "5"), (7, "7"), (10, "10")]
    );
    assert!(!sim.run_until(20));
    assert_eq!(sim.time(), 20);
}

#[test]
fn stop_request_pauses_and_run_resumes() {
    init_logger();
    let mut sim = Simulation::new(123);
    let trace = Trace::default();
    sim.schedule(1, 0, EventOrder::Fifo, record(&trace, "A")).unwrap();
    {
        let trace = trace.clone();
        sim.schedule(1, 0, EventOrder::Fifo, move |ctx| {
            trace.borrow_mut().push((ctx.time(), "B"));
            ctx.request_stop();
        })
        .unwrap();
    }
    sim.schedule(1, 0, EventOrder::Fifo, record(&trace, "C")).unwrap();
    sim.schedule(2, 0, EventOrder::Fifo, record(&trace, "D")).unwrap();

    sim.run();
    assert_eq!(*trace.borrow(), vec![(1, "A"), (1, "B")]);
    assert_eq!(
        sim.dispatch_state(),
        DispatchState::Running {
            key: EventKey::new(1, 0)
        }
    );
    assert_eq!(sim.pending_events(), 2);
    sim.check_invariants().unwrap();

    sim.run();
    assert_eq!(*trace.borrow(), vec![(1, "A"), (1, "B"), (1, "C"), (2, "D")]);
}

#[test]
fn stop_request_interrupts_run_until_without_moving_clock() {
    init_logger();
    let mut sim = Simulation::new(123);
    sim.schedule(1, 0, EventOrder::Fifo, |ctx| ctx.request_stop()).unwrap();
    sim.schedule(2, 0, EventOrder::Fifo, |_| {}).unwrap();
    assert!(sim.run_until(100));
    assert_eq!(sim.time(), 1);
    assert!(!sim.run_until(100));
    assert_eq!(sim.time(), 100);
}

#[test]
fn stop_requested_before_run_returns_immediately() {
    init_logger();
    let mut sim = Simulation::new(123);
    sim.schedule(1, 0, EventOrder::Fifo, |_| {}).unwrap();
    sim.request_stop();
    sim.run();
    assert_eq!(sim.pending_events(), 1);
    // the request was consumed
    sim.run();
    assert_eq!(sim.pending_events(), 0);
}

#[test]
fn steps_reports_remaining_events() {
    init_logger();
    let mut sim = Simulation::new(123);
    for delay in 0..3 {
        sim.schedule(delay, 0, EventOrder::Fifo, |_| {}).unwrap();
    }
    assert!(sim.steps(2));
    assert_eq!(sim.time(), 1);
    assert!(!sim.steps(2));
    assert_eq!(sim.time(), 2);
}

#[test]
fn callbacks_receive_scheduling_context() {
    init_logger();
    let mut sim = Simulation::new(123);
    let pump = sim.create_context("pump");
    let valve = sim.create_context("valve");
    assert_eq!(sim.lookup_id("pump"), Some(pump.id()));
    assert_eq!(sim.lookup_name(valve.id()), Some("valve"));
    assert_eq!(sim.lookup_id("tank"), None);
    assert_eq!(sim.root().name(), "simulation");

    let names = Rc::new(RefCell::new(Vec::new()));
    for ctx in [&pump, &valve] {
        let names = names.clone();
        ctx.schedule(1, 0, EventOrder::Fifo, move |ctx| {
            log_info!(ctx, "dispatched");
            names.borrow_mut().push(ctx.name().to_owned());
            let names = names.clone();
            ctx.schedule(1, 0, EventOrder::Fifo, move |ctx| {
                log_debug!(ctx, "follow-up of {}", ctx.id());
                names.borrow_mut().push(ctx.name().to_owned());
            })
            .unwrap();
        })
        .unwrap();
    }
    sim.run();
    assert_eq!(*names.borrow(), vec!["pump", "valve", "pump", "valve"]);
}

#[test]
#[should_panic(expected = "already exists")]
fn duplicate_context_name_panics() {
    let mut sim = Simulation::new(123);
    sim.create_context("pump");
    sim.create_context("pump");
}

#[test]
fn stats_track_lifecycle() {
    init_logger();
    let mut sim = Simulation::with_config(SimulationConfig::from_json(r#"{"seed": 5}"#).unwrap());
    let a = sim.schedule(1, 0, EventOrder::Fifo, |_| {}).unwrap();
    sim.schedule(1, 0, EventOrder::Fifo, |_| {}).unwrap();
    sim.schedule(2, 0, EventOrder::Fifo, |_| {}).unwrap();
    sim.cancel(a);
    sim.run();

    let stats = sim.stats();
    assert_eq!(stats.scheduled, 3);
    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.canceled, 1);
    assert_eq!(stats.nodes_created, 2);
    assert_eq!(stats.nodes_removed, 2);
    assert_eq!(stats.max_pending, 3);

    let json: serde_json::Value = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["dispatched"], 2);
}

#[test]
fn rng_is_seeded() {
    let a = Simulation::new(9);
    let b = Simulation::new(9);
    let xs: Vec<u32> = (0..8).map(|_| a.gen_range(0..1000)).collect();
    let ys: Vec<u32> = (0..8).map(|_| b.gen_range(0..1000)).collect();
    assert_eq!(xs, ys);
    let x = a.rand();
    assert!((0.0..1.0).contains(&x));
}
