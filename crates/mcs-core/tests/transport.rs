//! Streaming Put/Get between a caller and a storage provider.

use std::sync::Arc;

use mcs_core::storage::heap;
use mcs_core::storages::Storages;
use mcs_core::transport::{self, Address};
use mcs_core::{Chunk, Const, chunk};
use mcs_dtyp::{Endpoint, MaxSize, Offset, Parameter, Range, Size};

async fn start() -> (transport::Provider, transport::Client, Arc<Storages>) {
    let storages = Arc::new(Storages::new());
    let endpoint = Endpoint::Tcp("127.0.0.1:0".parse().unwrap());
    let provider = transport::Provider::bind(&endpoint, Arc::clone(&storages))
        .await
        .unwrap();
    let client = transport::Client::connect(&provider.connectable())
        .await
        .unwrap();
    (provider, client, storages)
}

fn address(storage_id: mcs_dtyp::StorageId, segment_id: mcs_dtyp::SegmentId) -> Address {
    Address {
        storage_id,
        chunk_description_parameter: Parameter::encode(&heap::ChunkDescription).unwrap(),
        segment_id,
        offset: Offset::ZERO,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn get_streams_a_segment_of_longs() {
    const N: u64 = 10;
    let (_provider, client, storages) = start().await;

    // provider-side storage holding the longs 0..N
    let storage_id = storages
        .create::<heap::Heap>(heap::Create {
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
    let segment_id = storages
        .segment_create::<heap::Heap>(
            storage_id,
            heap::SegmentCreate::default(),
            Size::of::<i64>(N),
        )
        .unwrap();
    {
        let description = storages
            .chunk_description::<heap::Heap>(
                storage_id,
                heap::ChunkDescription,
                segment_id,
                Range::at(Offset::ZERO, Size::of::<i64>(N)),
                chunk::AccessMode::Mutable,
            )
            .unwrap();
        let mut segment = Chunk::<mcs_core::Mutable>::resolve(description).unwrap();
        let longs = unsafe { chunk::as_slice_mut::<i64>(&mut segment) };
        for (i, value) in longs.iter_mut().enumerate() {
            *value = i as i64;
        }
    }

    let mut destination = vec![0u8; (N * 8) as usize];
    let read = client
        .get(address(storage_id, segment_id), &mut destination)
        .await
        .unwrap();
    assert_eq!(read, Size::of::<i64>(N));

    let longs: Vec<i64> = destination
        .chunks_exact(8)
        .map(|chunk| i64::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    assert_eq!(longs, (0..N as i64).collect::<Vec<i64>>());
}

#[tokio::test(flavor = "multi_thread")]
async fn put_fills_a_remote_segment() {
    let (_provider, client, storages) = start().await;

    let storage_id = storages
        .create::<heap::Heap>(heap::Create {
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
    let segment_id = storages
        .segment_create::<heap::Heap>(storage_id, heap::SegmentCreate::default(), Size::new(64))
        .unwrap();

    let bytes: Vec<u8> = (0..64u8).collect();
    let written = client
        .put(address(storage_id, segment_id), &bytes)
        .await
        .unwrap();
    assert_eq!(written, Size::new(64));

    let description = storages
        .chunk_description::<heap::Heap>(
            storage_id,
            heap::ChunkDescription,
            segment_id,
            Range::at(Offset::ZERO, Size::new(64)),
            chunk::AccessMode::Const,
        )
        .unwrap();
    let segment = Chunk::<Const>::resolve(description).unwrap();
    assert_eq!(segment.bytes(), &bytes[..]);
}

#[tokio::test(flavor = "multi_thread")]
async fn a_bad_source_keeps_the_stream_aligned() {
    let (_provider, client, storages) = start().await;

    let storage_id = storages
        .create::<heap::Heap>(heap::Create {
            max_size: MaxSize::Unlimited,
        })
        .unwrap();
    let segment_id = storages
        .segment_create::<heap::Heap>(storage_id, heap::SegmentCreate::default(), Size::new(16))
        .unwrap();

    // out of range: the provider answers with an error but still streams
    // the announced byte count
    let mut destination = vec![0u8; 32];
    assert!(client
        .get(address(storage_id, segment_id), &mut destination)
        .await
        .is_err());

    // the connection stays usable
    let mut destination = vec![0u8; 16];
    client
        .get(address(storage_id, segment_id), &mut destination)
        .await
        .unwrap();
}
