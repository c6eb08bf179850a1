use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use clap::Parser;

use tickcore::{EventHandle, EventOrder, Simulation, SimulationConfig, SimulationContext};

/// Measures the throughput of the event scheduler
#[derive(Parser, Debug)]
#[clap(about, long_about = None)]
struct Args {
    /// Number of components scheduling events
    #[clap(long, default_value_t = 1000)]
    components: u32,

    /// Total number of events to dispatch
    #[clap(long, default_value_t = 1_000_000)]
    events: u64,

    /// Maximum delay of scheduled events
    #[clap(long, default_value_t = 100)]
    max_delay: u64,

    /// Number of distinct priorities
    #[clap(long, default_value_t = 4)]
    priorities: i64,

    /// Percentage of events canceled before firing
    #[clap(long, default_value_t = 10)]
    cancel_percent: u32,

    /// Validate scheduler invariants after every structural change
    #[clap(long)]
    check_invariants: bool,

    /// Random seed
    #[clap(long, default_value_t = 123)]
    seed: u64,
}

struct Workload {
    budget: Cell<u64>,
    max_delay: u64,
    priorities: i64,
    cancel_percent: u32,
}

fn activity(ctx: &SimulationContext, workload: Rc<Workload>) {
    let left = workload.budget.get();
    if left == 0 {
        return;
    }
    workload.budget.set(left - 1);

    let delay = ctx.gen_range(1..=workload.max_delay);
    let priority = ctx.gen_range(0..workload.priorities);
    let order = if ctx.gen_range(0..2) == 0 {
        EventOrder::Fifo
    } else {
        EventOrder::Lifo
    };
    let next = workload.clone();
    ctx.schedule(delay, priority, order, move |ctx| activity(ctx, next))
        .unwrap();

    if ctx.gen_range(0..100) < workload.cancel_percent {
        let victim: EventHandle = ctx
            .schedule(delay, priority, EventOrder::Fifo, |_| panic!("canceled event fired"))
            .unwrap();
        ctx.cancel(victim);
    }
}

fn main() {
    let args = Args::parse();
    env_logger::init();

    let config = SimulationConfig {
        seed: args.seed,
        check_invariants: args.check_invariants,
        initial_capacity: args.components as usize,
    };
    let mut sim = Simulation::with_config(config);
    let workload = Rc::new(Workload {
        budget: Cell::new(args.events),
        max_delay: args.max_delay.max(1),
        priorities: args.priorities.max(1),
        cancel_percent: args.cancel_percent,
    });

    for i in 0..args.components {
        let ctx = sim.create_context(format!("component-{}", i));
        activity(&ctx, workload.clone());
    }

    let t = Instant::now();
    sim.run();
    let elapsed = t.elapsed().as_secs_f64();

    let stats = sim.stats();
    log::info!("{}", serde_json::to_string_pretty(&stats).unwrap());
    println!(
        "Dispatched {} events in {:.2}s ({:.0} events/s), simulation time: {}",
        stats.dispatched,
        elapsed,
        stats.dispatched as f64 / elapsed,
        sim.time()
    );
    println!("Peak pending events: {}", stats.max_pending);
}
