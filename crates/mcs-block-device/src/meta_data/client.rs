//! The meta-data client.
//!
//! Meta-data traffic is strictly serial: the client is fixed to the
//! exclusive access policy. The block size is immutable on the provider
//! and cached with the first call.

use mcs_dtyp::Connectable;
use mcs_rpc::{Exclusive, RpcError};

use crate::block;
use crate::meta_data::blocks::{AddResult, Location, RemoveResult};
use crate::meta_data::{Commands, command};
use crate::storage::Storage;

pub struct Client {
    inner: mcs_rpc::Client<Exclusive>,
    block_size: block::Size,
}

impl Client {
    pub async fn connect(connectable: &Connectable) -> Result<Client, RpcError> {
        let inner = mcs_rpc::Client::connect::<Commands>(connectable, Exclusive::default()).await?;
        let block_size = inner.call(command::BlockSize).await?;
        Ok(Client { inner, block_size })
    }

    pub fn block_size(&self) -> block::Size {
        self.block_size
    }

    pub async fn number_of_blocks(&self) -> Result<block::Count, RpcError> {
        self.inner.call(command::NumberOfBlocks).await
    }

    pub async fn blocks(&self) -> Result<Vec<block::Range>, RpcError> {
        Ok(self.inner.call(command::BlockRanges).await?.ranges)
    }

    pub async fn add(&self, storage: Storage) -> Result<AddResult, RpcError> {
        self.inner.call(command::Add { storage }).await
    }

    pub async fn remove(&self, range: block::Range) -> Result<RemoveResult, RpcError> {
        self.inner.call(command::Remove { range }).await
    }

    pub async fn location(&self, block_id: block::Id) -> Result<Location, RpcError> {
        self.inner.call(command::LocationOf { block_id }).await
    }
}
