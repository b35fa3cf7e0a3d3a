//! The IOV backend: stripes per-collection logical byte ranges over a
//! dynamic set of remote storages, filling small storages first and
//! distributing the rest as equal as possible.

pub mod client;
pub mod collection;
pub mod command;
pub mod distribution;
pub mod handler;
pub mod provider;
pub mod state;
pub mod storage;
pub mod storages_clients;

pub use client::Client;
pub use provider::Provider;
pub use state::State;
pub use storage::Storage;
pub use storages_clients::StoragesClients;

use thiserror::Error;

mcs_rpc::command_set! {
    /// The backend command list.
    pub struct Commands {
        command::StateSnapshot,
        command::RangeOf,
        command::LocationsOf,
        command::CollectionCreate,
        command::CollectionAppend,
        command::CollectionDelete,
        command::StorageAdd,
    }
}

#[derive(Debug, Error)]
pub enum IovError {
    #[error("collection '{0}' already exists")]
    DuplicateId(collection::Id),

    #[error("unknown collection '{0}'")]
    UnknownCollection(collection::Id),

    #[error("unknown storage id {0}")]
    UnknownStorageId(storage::Id),

    #[error("not enough capacity: requested {requested}, available {available}")]
    InsufficientCapacity {
        requested: mcs_dtyp::Size,
        available: mcs_dtyp::MaxSize,
    },

    #[error("range {requested} is outside the collection range {collection}")]
    OutOfRange {
        requested: mcs_dtyp::Range,
        collection: mcs_dtyp::Range,
    },

    #[error("removing segments failed on {} storage(s): {failures:?}", failures.len())]
    SegmentRemoval {
        failures: Vec<(storage::Id, mcs_rpc::RpcError)>,
    },

    #[error(transparent)]
    Rpc(#[from] mcs_rpc::RpcError),

    #[error(transparent)]
    Codec(#[from] mcs_dtyp::CodecError),
}
