//! Managing storages and segments in a remote process.

use std::sync::Arc;

use mcs_core::control;
use mcs_core::storage::heap;
use mcs_core::storages::Storages;
use mcs_dtyp::{Endpoint, MaxSize, Parameter, Size};
use mcs_rpc::{Exclusive, RpcError};

async fn start() -> (control::Provider, control::Client<Exclusive>, Arc<Storages>) {
    let storages = Arc::new(Storages::new());
    let endpoint = Endpoint::Tcp("127.0.0.1:0".parse().unwrap());
    let provider = control::Provider::bind(&endpoint, Arc::clone(&storages))
        .await
        .unwrap();
    let client = control::Client::connect(&provider.connectable(), Exclusive::default())
        .await
        .unwrap();
    (provider, client, storages)
}

#[tokio::test(flavor = "multi_thread")]
async fn storage_create_and_remove() {
    let (_provider, client, storages) = start().await;

    let storage_id = client
        .storage_create::<heap::Heap>(heap::Create {
            max_size: MaxSize::Limit(Size::new(1024)),
        })
        .await
        .unwrap();

    // visible in the provider's registry
    assert_eq!(
        storages
            .size_max::<heap::Heap>(storage_id, &heap::SizeMax)
            .unwrap(),
        MaxSize::Limit(Size::new(1024))
    );

    client.storage_remove(storage_id).await.unwrap();
    match client
        .storage_size(storage_id, Parameter::default(), Parameter::default())
        .await
    {
        Err(RpcError::Handler { reason }) => assert!(reason.contains("unknown storage id")),
        other => panic!("expected a handler error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn segment_lifecycle_in_a_remote_process() {
    let (_provider, client, _storages) = start().await;

    let storage_id = client
        .storage_create::<heap::Heap>(heap::Create {
            max_size: MaxSize::Limit(Size::new(100)),
        })
        .await
        .unwrap();

    let segment_create = Parameter::encode(&heap::SegmentCreate::default()).unwrap();
    let segment_id = client
        .segment_create(storage_id, segment_create.clone(), Size::new(60))
        .await
        .unwrap();

    let (max, used) = client
        .storage_size(
            storage_id,
            Parameter::encode(&heap::SizeMax).unwrap(),
            Parameter::encode(&heap::SizeUsed).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(max, MaxSize::Limit(Size::new(100)));
    assert_eq!(used, Size::new(60));

    // over capacity: the remote BadAlloc arrives stringified, and the
    // provider state is unchanged
    match client
        .segment_create(storage_id, segment_create, Size::new(60))
        .await
    {
        Err(RpcError::Handler { reason }) => assert!(reason.contains("bad alloc")),
        other => panic!("expected a handler error, got {other:?}"),
    }

    let freed = client
        .segment_remove(
            storage_id,
            Parameter::encode(&heap::SegmentRemove).unwrap(),
            segment_id,
        )
        .await
        .unwrap();
    assert_eq!(freed, Size::new(60));
}

#[tokio::test(flavor = "multi_thread")]
async fn a_wrong_parameter_type_is_a_codec_failure_on_the_provider() {
    let (_provider, client, _storages) = start().await;

    let storage_id = client
        .storage_create::<heap::Heap>(heap::Create {
            max_size: MaxSize::Unlimited,
        })
        .await
        .unwrap();

    // a shmem create parameter is not a heap segment-create parameter
    let wrong = Parameter::encode(&mcs_core::storage::shmem::Create {
        prefix: "/mcs".into(),
        max_size: MaxSize::Unlimited,
    })
    .unwrap();
    assert!(matches!(
        client.segment_create(storage_id, wrong, Size::new(1)).await,
        Err(RpcError::Handler { .. })
    ));
}
