//! Payload bytes outside the serialized envelope.

mod common;

use common::*;
use mcs_rpc::{Client, Exclusive};

#[tokio::test(flavor = "multi_thread")]
async fn the_handler_consumes_streamed_bytes_from_the_socket() {
    let (provider, _) = start_provider().await;
    let client = Client::connect::<AllCommands>(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();

    let bytes: Vec<u8> = (0..=255u8).collect();
    let expected: u64 = bytes.iter().map(|b| *b as u64).sum();
    let response = client
        .call_streaming(
            PutBytes {
                size: bytes.len() as u64,
            },
            &mut SendBytes(bytes),
        )
        .await
        .unwrap();
    assert_eq!(response, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn streamed_bytes_land_in_the_callers_buffer() {
    let (provider, _) = start_provider().await;
    let client = Client::connect::<AllCommands>(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();

    let mut buffer = vec![0u8; 300];
    let response = client
        .call_streaming(GetBytes { size: 300 }, &mut ReceiveBytes(&mut buffer))
        .await
        .unwrap();
    assert_eq!(response, 300);
    for (i, byte) in buffer.iter().enumerate() {
        assert_eq!(*byte, i as u8);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn plain_calls_still_work_between_streaming_calls() {
    let (provider, _) = start_provider().await;
    let client = Client::connect::<AllCommands>(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();

    let mut buffer = vec![0u8; 8];
    client
        .call_streaming(GetBytes { size: 8 }, &mut ReceiveBytes(&mut buffer))
        .await
        .unwrap();
    assert_eq!(client.call(Echo { value: 11 }).await.unwrap(), 11);
    client
        .call_streaming(PutBytes { size: 4 }, &mut SendBytes(vec![1, 2, 3, 4]))
        .await
        .unwrap();
    assert_eq!(client.call(Echo { value: 12 }).await.unwrap(), 12);
}
