//! Creating, attaching to and removing shared chunks.

use std::sync::Arc;

use mcs_core::storage::shmem;
use mcs_core::storages::Storages;
use mcs_core::{Const, Mutable};
use mcs_dtyp::{Endpoint, MaxSize, Size};
use mcs_rpc::{Exclusive, RpcError};
use mcs_share::{Client, Provider};

async fn start() -> (Provider, Client<Exclusive>) {
    let storages = Arc::new(Storages::new());
    let endpoint = Endpoint::Tcp("127.0.0.1:0".parse().unwrap());
    let provider = Provider::bind(&endpoint, storages).await.unwrap();
    let client = Client::connect(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();
    (provider, client)
}

fn shmem_create(tag: &str) -> shmem::Create {
    shmem::Create {
        prefix: format!("/mcs-share-{tag}-{}", std::process::id()),
        max_size: MaxSize::Limit(Size::new(1 << 16)),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn attached_clients_see_each_others_writes() {
    let (_provider, client) = start().await;

    let chunk = client
        .create::<shmem::Shmem>(
            Size::new(4096),
            shmem_create("rw"),
            shmem::SegmentCreate::default(),
        )
        .await
        .unwrap();

    let mut writer = client
        .attach::<Mutable, shmem::Shmem>(chunk, shmem::ChunkDescription)
        .await
        .unwrap();
    writer.bytes_mut()[..4].copy_from_slice(b"mcs!");

    let reader = client
        .attach::<Const, shmem::Shmem>(chunk, shmem::ChunkDescription)
        .await
        .unwrap();
    assert_eq!(&reader.bytes()[..4], b"mcs!");
    assert_eq!(reader.size(), Size::new(4096));

    client
        .remove::<shmem::Shmem>(chunk, shmem::SegmentRemove::default())
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_chunks_are_rejected() {
    let (_provider, client) = start().await;

    match client
        .create::<shmem::Shmem>(
            Size::new(1 << 20),
            shmem_create("big"),
            shmem::SegmentCreate::default(),
        )
        .await
    {
        Err(mcs_share::client::ShareError::Rpc(RpcError::Handler { reason })) => {
            assert!(reason.contains("bad alloc"));
        }
        other => panic!("expected a handler error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn removed_chunks_cannot_be_attached() {
    let (_provider, client) = start().await;

    let chunk = client
        .create::<shmem::Shmem>(
            Size::new(64),
            shmem_create("gone"),
            shmem::SegmentCreate::default(),
        )
        .await
        .unwrap();
    client
        .remove::<shmem::Shmem>(chunk, shmem::SegmentRemove::default())
        .await
        .unwrap();

    assert!(client
        .attach::<Const, shmem::Shmem>(chunk, shmem::ChunkDescription)
        .await
        .is_err());
}
