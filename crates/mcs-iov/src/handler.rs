//! Backend command handlers.
//!
//! Snapshot and lookup commands run under the read lock; everything that
//! changes the state takes the write lock, which is also what queues
//! calls behind a restart.

use std::sync::Arc;

use tokio::sync::RwLock;

use mcs_dtyp::{Range, Size};
use mcs_rpc::{Connection, Done, Handler, HandlerFailure};

use crate::command;
use crate::state::State;
use crate::storages_clients::StoragesClients;

#[derive(Clone)]
pub struct IovHandler {
    state: Arc<RwLock<State>>,
    clients: Arc<StoragesClients>,
}

impl IovHandler {
    pub fn new(state: Arc<RwLock<State>>, clients: Arc<StoragesClients>) -> IovHandler {
        IovHandler { state, clients }
    }
}

impl Handler<command::StateSnapshot> for IovHandler {
    async fn handle(
        &self,
        _: command::StateSnapshot,
        _: &mut Connection<'_>,
    ) -> Result<State, HandlerFailure> {
        Ok(self.state.read().await.clone())
    }
}

impl Handler<command::RangeOf> for IovHandler {
    async fn handle(
        &self,
        command: command::RangeOf,
        _: &mut Connection<'_>,
    ) -> Result<Range, HandlerFailure> {
        Ok(self.state.read().await.range(&command.collection_id)?)
    }
}

impl Handler<command::LocationsOf> for IovHandler {
    async fn handle(
        &self,
        command: command::LocationsOf,
        _: &mut Connection<'_>,
    ) -> Result<command::LocationsResponse, HandlerFailure> {
        Ok(command::LocationsResponse {
            locations: self
                .state
                .read()
                .await
                .locations(&command.collection_id, command.range)?,
        })
    }
}

impl Handler<command::CollectionCreate> for IovHandler {
    async fn handle(
        &self,
        command: command::CollectionCreate,
        _: &mut Connection<'_>,
    ) -> Result<command::UsedStoragesResponse, HandlerFailure> {
        let used = self
            .state
            .write()
            .await
            .collection_create(&self.clients, command.collection_id, command.size)
            .await?;
        Ok(command::UsedStoragesResponse { used })
    }
}

impl Handler<command::CollectionAppend> for IovHandler {
    async fn handle(
        &self,
        command: command::CollectionAppend,
        _: &mut Connection<'_>,
    ) -> Result<Size, HandlerFailure> {
        Ok(self
            .state
            .write()
            .await
            .collection_append(&self.clients, command.collection_id, command.range)
            .await?)
    }
}

impl Handler<command::CollectionDelete> for IovHandler {
    async fn handle(
        &self,
        command: command::CollectionDelete,
        _: &mut Connection<'_>,
    ) -> Result<Done, HandlerFailure> {
        self.state
            .write()
            .await
            .collection_delete(&self.clients, command.collection_id)
            .await?;
        Ok(Done)
    }
}

impl Handler<command::StorageAdd> for IovHandler {
    async fn handle(
        &self,
        command: command::StorageAdd,
        _: &mut Connection<'_>,
    ) -> Result<command::StorageAddResponse, HandlerFailure> {
        let storage_id = self
            .state
            .write()
            .await
            .storage_add(&self.clients, command.storage)
            .await?;
        Ok(command::StorageAddResponse { storage_id })
    }
}
