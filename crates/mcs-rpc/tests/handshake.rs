//! Clients must support a prefix of the provided commands.

mod common;

use common::*;
use mcs_rpc::{Client, Exclusive, RpcError, Stream, command_set};

command_set! {
    struct NoCommands {}
}
command_set! {
    struct EchoOnly { Echo }
}
command_set! {
    struct EchoSleep { Echo, Sleep }
}
command_set! {
    struct SleepEcho { Sleep, Echo }
}
command_set! {
    struct SleepOnly { Sleep }
}

#[tokio::test(flavor = "multi_thread")]
async fn prefixes_handshake_successfully() {
    let (provider, _) = start_provider().await;
    let connectable = provider.connectable();

    Client::connect::<NoCommands>(&connectable, Exclusive::default())
        .await
        .unwrap();
    Client::connect::<EchoOnly>(&connectable, Exclusive::default())
        .await
        .unwrap();
    Client::connect::<EchoSleep>(&connectable, Exclusive::default())
        .await
        .unwrap();
    let client = Client::connect::<AllCommands>(&connectable, Exclusive::default())
        .await
        .unwrap();
    assert_eq!(client.call(Echo { value: 3 }).await.unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn reordered_commands_fail_the_handshake() {
    let (provider, _) = start_provider().await;
    let stream = Stream::connect(&provider.connectable()).await.unwrap();

    match Client::from_stream::<SleepEcho>(stream, Exclusive::default()).await {
        Err(RpcError::HandshakeFailed { client, server }) => {
            assert_eq!(client.len(), 2);
            assert_eq!(server.len(), 5);
            assert_eq!(client[0].tag, "test.sleep");
            assert_eq!(server[0].tag, "test.echo");
        }
        other => panic!("expected HandshakeFailed, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn subsequences_fail_the_handshake() {
    let (provider, _) = start_provider().await;
    let stream = Stream::connect(&provider.connectable()).await.unwrap();

    assert!(matches!(
        Client::from_stream::<SleepOnly>(stream, Exclusive::default()).await,
        Err(RpcError::HandshakeFailed { .. })
    ));
}
