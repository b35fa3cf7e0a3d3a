//! Fan-out across many clients with a parallelism bound.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::*;
use mcs_rpc::{AtMost, Client, Collect, Concurrent, ParallelCallsLimit, RpcError, multi_client};

struct Sums {
    responses: u64,
    errors: u64,
    sum: u64,
}

impl Collect<u64, Sleep> for Sums {
    fn result(&mut self, _: &u64, response: u64) {
        self.responses += 1;
        self.sum += response;
    }

    fn error(&mut self, _: &u64, _: RpcError) {
        self.errors += 1;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn at_most_bounds_the_in_flight_calls() {
    const CALLS: u64 = 1000;
    const LIMIT: u32 = 16;

    let (provider, handler) = start_provider().await;

    // A pool of connections; the bound comes from the fan-out alone.
    let mut pool = Vec::new();
    for _ in 0..LIMIT {
        pool.push(Arc::new(
            Client::connect::<AllCommands>(&provider.connectable(), Concurrent::default())
                .await
                .unwrap(),
        ));
    }

    let mut collect = Sums {
        responses: 0,
        errors: 0,
        sum: 0,
    };
    multi_client::call(
        |mus| Sleep { mus: *mus },
        |mus| Arc::clone(&pool[(*mus % LIMIT as u64) as usize]),
        0..CALLS,
        ParallelCallsLimit::AtMost(AtMost::new(LIMIT).unwrap()),
        &mut collect,
    )
    .await;

    assert_eq!(collect.responses, CALLS);
    assert_eq!(collect.errors, 0);
    assert_eq!(collect.sum, (0..CALLS).sum::<u64>());
    assert!(handler.max_in_flight.load(Ordering::SeqCst) <= LIMIT as usize);
}

struct Throttled {
    collected: u64,
    paused: bool,
}

impl Collect<u64, Echo> for Throttled {
    fn result(&mut self, _: &u64, _: u64) {
        self.collected += 1;
        self.paused = false;
    }

    fn error(&mut self, _: &u64, _: RpcError) {
        unreachable!("echo does not fail");
    }

    fn start_more_calls(&mut self) -> bool {
        // one call at a time, re-enabled by each completion
        !std::mem::replace(&mut self.paused, true)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn the_collector_can_throttle_new_calls() {
    let (provider, _) = start_provider().await;
    let client = Arc::new(
        Client::connect::<AllCommands>(&provider.connectable(), Concurrent::default())
            .await
            .unwrap(),
    );

    let mut collect = Throttled {
        collected: 0,
        paused: false,
    };
    multi_client::call(
        |value| Echo { value: *value },
        |_| Arc::clone(&client),
        0..50u64,
        ParallelCallsLimit::Unlimited,
        &mut collect,
    )
    .await;
    assert_eq!(collect.collected, 50);
}
