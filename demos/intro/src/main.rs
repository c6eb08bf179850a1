use std::cell::RefCell;
use std::rc::Rc;

use tickcore::{log_debug, log_info, log_warn, EventHandle, EventOrder, Simulation, SimulationContext, Tick};

// Priorities used within a tick: responses are handled before new requests are sent
const RESPONSE: i64 = 0;
const REQUEST: i64 = 1;

struct Server {
    ctx: SimulationContext,
}

impl Server {
    fn new(ctx: SimulationContext) -> Self {
        Self { ctx }
    }

    fn on_request(&self, client: Rc<RefCell<Client>>, seq: u32) {
        // Random processing delay, sometimes longer than the client is willing to wait
        let delay = self.ctx.gen_range(1..8);
        log_debug!(self.ctx, "request {} will take {} ticks", seq, delay);
        self.ctx
            .schedule(delay, RESPONSE, EventOrder::Fifo, move |_| {
                client.borrow_mut().on_response(seq);
            })
            .unwrap();
    }
}

struct Client {
    // Generally components store the context inside to be able to schedule events
    ctx: SimulationContext,
    server: Rc<Server>,
    timeout: Tick,
    // Timer handle is reused for every request
    timer: EventHandle,
    next_seq: u32,
    pending: Option<u32>,
    completed: u32,
    timed_out: u32,
}

impl Client {
    fn new(ctx: SimulationContext, server: Rc<Server>, timeout: Tick) -> Self {
        let timer = ctx.create_handle();
        Self {
            ctx,
            server,
            timeout,
            timer,
            next_seq: 0,
            pending: None,
            completed: 0,
            timed_out: 0,
        }
    }

    fn send_request(this: &Rc<RefCell<Self>>) {
        let mut client = this.borrow_mut();
        let seq = client.next_seq;
        client.next_seq += 1;
        client.pending = Some(seq);
        log_info!(client.ctx, "sending request {}", seq);

        let server = client.server.clone();
        let me = this.clone();
        client
            .ctx
            .schedule(1, REQUEST, EventOrder::Fifo, move |_| server.on_request(me, seq))
            .unwrap();

        let me = this.clone();
        let timeout = client.timeout;
        client
            .ctx
            .schedule_bound(client.timer, timeout, RESPONSE, EventOrder::Lifo, move |_| {
                Client::on_timeout(&me, seq)
            })
            .unwrap();
    }

    fn on_response(&mut self, seq: u32) {
        if self.pending != Some(seq) {
            log_debug!(self.ctx, "late response {} ignored", seq);
            return;
        }
        self.pending = None;
        self.completed += 1;
        // The timer is still bound to this request
        self.ctx.cancel(self.timer);
        log_info!(self.ctx, "response {} received", seq);
    }

    fn on_timeout(this: &Rc<RefCell<Self>>, seq: u32) {
        let mut client = this.borrow_mut();
        if client.pending == Some(seq) {
            client.pending = None;
            client.timed_out += 1;
            log_warn!(client.ctx, "request {} timed out", seq);
        }
    }
}

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "{}", record.args())
        })
        .init();

    // Create simulation with random seed 123
    let mut sim = Simulation::new(123);

    let server = Rc::new(Server::new(sim.create_context("server")));
    let client = Rc::new(RefCell::new(Client::new(sim.create_context("client"), server, 5)));

    // Client sends a new request every 10 ticks
    let ctx = sim.create_context("driver");
    for i in 0..10 {
        let client = client.clone();
        ctx.schedule(i * 10, REQUEST, EventOrder::Fifo, move |_| Client::send_request(&client))
            .unwrap();
    }

    sim.run();

    let client = client.borrow();
    println!(
        "Completed: {}, timed out: {}, simulation time: {}",
        client.completed,
        client.timed_out,
        sim.time()
    );
    println!("Stats: {:?}", sim.stats());
}
