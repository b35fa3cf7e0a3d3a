//! Share command handlers.

use std::sync::Arc;

use mcs_core::storages::Storages;
use mcs_dtyp::{Offset, Range};
use mcs_rpc::{Connection, Done, Handler, HandlerFailure};

use crate::command;
use crate::Chunk;

#[derive(Clone)]
pub struct ShareHandler {
    storages: Arc<Storages>,
}

impl ShareHandler {
    pub fn new(storages: Arc<Storages>) -> ShareHandler {
        ShareHandler { storages }
    }
}

impl Handler<command::Create> for ShareHandler {
    async fn handle(
        &self,
        command: command::Create,
        _: &mut Connection<'_>,
    ) -> Result<Chunk, HandlerFailure> {
        let storage_id = self
            .storages
            .create_erased(command.implementation_id, &command.parameter_create)?;
        let segment_id = match self.storages.segment_create_erased(
            storage_id,
            &command.parameter_segment_create,
            command.size,
        ) {
            Ok(segment_id) => segment_id,
            Err(error) => {
                // no half-created chunks
                if let Err(cleanup) = self.storages.remove(storage_id) {
                    log::warn!("could not remove storage {storage_id}: {cleanup}");
                }
                return Err(error.into());
            }
        };
        Ok(Chunk {
            storage_id,
            implementation_id: command.implementation_id,
            segment_id,
            size: command.size,
        })
    }
}

impl Handler<command::Attach> for ShareHandler {
    async fn handle(
        &self,
        command: command::Attach,
        _: &mut Connection<'_>,
    ) -> Result<mcs_core::chunk::Description, HandlerFailure> {
        Ok(self.storages.chunk_description_erased(
            command.chunk.storage_id,
            &command.parameter_chunk_description,
            command.chunk.segment_id,
            Range::at(Offset::ZERO, command.chunk.size),
            command.access,
        )?)
    }
}

impl Handler<command::Remove> for ShareHandler {
    async fn handle(
        &self,
        command: command::Remove,
        _: &mut Connection<'_>,
    ) -> Result<Done, HandlerFailure> {
        self.storages.segment_remove_erased(
            command.chunk.storage_id,
            &command.parameter_segment_remove,
            command.chunk.segment_id,
        )?;
        self.storages.remove(command.chunk.storage_id)?;
        Ok(Done)
    }
}
