//! Persistent control-client connections, one per registered storage.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use mcs_core::control;
use mcs_dtyp::Connectable;
use mcs_rpc::{Collect, Exclusive, ParallelCallsLimit, RpcError, multi_client};

use crate::collection::UsedStorage;
use crate::storage::{self, Storage};
use crate::IovError;

/// The connection table. Entries are added with their storage and removed
/// only when the storage goes away.
#[derive(Default)]
pub struct StoragesClients {
    clients: Mutex<BTreeMap<storage::Id, Arc<control::Client<Exclusive>>>>,
}

impl StoragesClients {
    pub fn new() -> StoragesClients {
        StoragesClients::default()
    }

    /// Opens (or replaces) the connection for `storage_id`.
    pub async fn open(
        &self,
        storage_id: storage::Id,
        connectable: &Connectable,
    ) -> Result<(), IovError> {
        let client = control::Client::connect(connectable, Exclusive::default()).await?;
        self.clients
            .lock()
            .unwrap()
            .insert(storage_id, Arc::new(client));
        Ok(())
    }

    pub fn at(&self, storage_id: storage::Id) -> Result<Arc<control::Client<Exclusive>>, IovError> {
        self.clients
            .lock()
            .unwrap()
            .get(&storage_id)
            .cloned()
            .ok_or(IovError::UnknownStorageId(storage_id))
    }

    /// Fans out `segment_remove` for every used storage, collecting the
    /// per-storage failures into one aggregated error.
    pub async fn remove_segments(
        &self,
        storages: &BTreeMap<storage::Id, Storage>,
        used_storages: &[UsedStorage],
    ) -> Result<(), IovError> {
        struct Failures<'a> {
            used: &'a [UsedStorage],
            failures: Vec<(storage::Id, RpcError)>,
        }

        impl Collect<usize, control::command::SegmentRemove> for Failures<'_> {
            fn result(&mut self, _: &usize, _: mcs_dtyp::Size) {}

            fn error(&mut self, index: &usize, error: RpcError) {
                self.failures.push((self.used[*index].storage_id, error));
            }
        }

        // commands and clients are prepared up front so the generators
        // stay infallible; missing entries fail before any call starts
        let mut commands = Vec::new();
        let mut clients = Vec::new();
        for used in used_storages {
            let storage = storages
                .get(&used.storage_id)
                .ok_or(IovError::UnknownStorageId(used.storage_id))?;
            commands.push(control::command::SegmentRemove {
                storage_id: storage.storage_id,
                parameter: storage.parameter_segment_remove.clone(),
                segment_id: used.segment_id,
            });
            clients.push(self.at(used.storage_id)?);
        }

        let mut collect = Failures {
            used: used_storages,
            failures: Vec::new(),
        };
        multi_client::call(
            |index: &usize| commands[*index].clone(),
            |index: &usize| Arc::new(clients[*index].inner().clone()),
            0..used_storages.len(),
            ParallelCallsLimit::Unlimited,
            &mut collect,
        )
        .await;

        if !collect.failures.is_empty() {
            return Err(IovError::SegmentRemoval {
                failures: collect.failures,
            });
        }
        Ok(())
    }
}
