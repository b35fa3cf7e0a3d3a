//! The backend client.

use mcs_dtyp::{Connectable, Range, Size};
use mcs_rpc::{AccessPolicy, RpcError};

use crate::collection::{self, Locations, UsedStorages};
use crate::command;
use crate::state::State;
use crate::storage::{self, Storage};
use crate::Commands;

pub struct Client<AP: AccessPolicy> {
    inner: mcs_rpc::Client<AP>,
}

impl<AP: AccessPolicy> Client<AP> {
    pub async fn connect(connectable: &Connectable, policy: AP) -> Result<Self, RpcError> {
        Ok(Client {
            inner: mcs_rpc::Client::connect::<Commands>(connectable, policy).await?,
        })
    }

    pub async fn provider_state(&self) -> Result<State, RpcError> {
        self.inner.call(command::StateSnapshot).await
    }

    pub async fn range(&self, collection_id: collection::Id) -> Result<Range, RpcError> {
        self.inner.call(command::RangeOf { collection_id }).await
    }

    pub async fn locations(
        &self,
        collection_id: collection::Id,
        range: Range,
    ) -> Result<Locations, RpcError> {
        Ok(self
            .inner
            .call(command::LocationsOf {
                collection_id,
                range,
            })
            .await?
            .locations)
    }

    pub async fn collection_create(
        &self,
        collection_id: collection::Id,
        size: Size,
    ) -> Result<UsedStorages, RpcError> {
        Ok(self
            .inner
            .call(command::CollectionCreate {
                collection_id,
                size,
            })
            .await?
            .used)
    }

    /// Returns the collection's new total size.
    pub async fn collection_append(
        &self,
        collection_id: collection::Id,
        range: Range,
    ) -> Result<Size, RpcError> {
        self.inner
            .call(command::CollectionAppend {
                collection_id,
                range,
            })
            .await
    }

    pub async fn collection_delete(&self, collection_id: collection::Id) -> Result<(), RpcError> {
        self.inner
            .call(command::CollectionDelete { collection_id })
            .await?;
        Ok(())
    }

    pub async fn storage_add(&self, storage: Storage) -> Result<storage::Id, RpcError> {
        Ok(self
            .inner
            .call(command::StorageAdd { storage })
            .await?
            .storage_id)
    }
}
