//! Access policy behaviour on a live socket.

mod common;

use std::sync::Arc;

use common::*;
use mcs_rpc::{Client, Concurrent, Exclusive, RpcError, Sequential};

#[tokio::test(flavor = "multi_thread")]
async fn exclusive_calls_interleave_strictly() {
    let (provider, _) = start_provider().await;
    let client = Client::connect::<AllCommands>(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();

    for value in 0..100u64 {
        assert_eq!(client.call(Echo { value }).await.unwrap(), value);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn sequential_delivers_many_calls_in_order() {
    let (provider, _) = start_provider().await;
    let client = Arc::new(
        Client::connect::<AllCommands>(&provider.connectable(), Sequential::default())
            .await
            .unwrap(),
    );

    let mut calls = Vec::new();
    for value in 0..1000u64 {
        let client = Arc::clone(&client);
        calls.push(tokio::spawn(
            async move { client.call(Echo { value }).await },
        ));
    }
    for (value, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), value as u64);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_handles_many_in_flight_calls() {
    let (provider, _) = start_provider().await;
    let client = Arc::new(
        Client::connect::<AllCommands>(&provider.connectable(), Concurrent::default())
            .await
            .unwrap(),
    );

    let mut calls = Vec::new();
    for value in 0..1000u64 {
        let client = Arc::clone(&client);
        calls.push(tokio::spawn(
            async move { client.call(Echo { value }).await },
        ));
    }
    for (value, call) in calls.into_iter().enumerate() {
        assert_eq!(call.await.unwrap().unwrap(), value as u64);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_failures_come_back_as_errors() {
    let (provider, _) = start_provider().await;
    let client = Client::connect::<AllCommands>(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();

    match client.call(Fail).await {
        Err(RpcError::Handler { reason }) => assert!(reason.contains("the handler refuses")),
        other => panic!("expected a handler error, got {other:?}"),
    }
    // the policy is not poisoned by a remote handler failure
    assert_eq!(client.call(Echo { value: 9 }).await.unwrap(), 9);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_a_sequential_future_does_not_corrupt_the_stream() {
    let (provider, _) = start_provider().await;
    let client = Arc::new(
        Client::connect::<AllCommands>(&provider.connectable(), Sequential::default())
            .await
            .unwrap(),
    );

    // Dropped after the envelope went out, long before the response.
    let slow = Arc::clone(&client);
    let dropped = tokio::time::timeout(
        std::time::Duration::from_millis(5),
        async move { slow.call(Sleep { mus: 100_000 }).await },
    )
    .await;
    assert!(dropped.is_err());

    // The retired call's response is discarded silently; later calls see
    // their own results.
    for value in 0..10u64 {
        assert_eq!(client.call(Echo { value }).await.unwrap(), value);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_the_client_keeps_in_flight_calls_alive() {
    let (provider, _) = start_provider().await;
    let client = Arc::new(
        Client::connect::<AllCommands>(&provider.connectable(), Concurrent::default())
            .await
            .unwrap(),
    );

    let in_flight = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.call(Sleep { mus: 50_000 }).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    drop(client);

    assert_eq!(in_flight.await.unwrap().unwrap(), 50_000);
}
