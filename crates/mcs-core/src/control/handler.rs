//! Control command handlers over a shared registry.

use std::sync::Arc;

use mcs_rpc::{Connection, Done, Handler, HandlerFailure};

use crate::control::command;
use crate::storages::Storages;

/// Handles every control command against one registry.
#[derive(Clone)]
pub struct ControlHandler {
    storages: Arc<Storages>,
}

impl ControlHandler {
    pub fn new(storages: Arc<Storages>) -> ControlHandler {
        ControlHandler { storages }
    }

    pub fn storages(&self) -> &Arc<Storages> {
        &self.storages
    }
}

impl Handler<command::StorageCreate> for ControlHandler {
    async fn handle(
        &self,
        command: command::StorageCreate,
        _: &mut Connection<'_>,
    ) -> Result<mcs_dtyp::StorageId, HandlerFailure> {
        Ok(self
            .storages
            .create_erased(command.implementation_id, &command.parameter_create)?)
    }
}

impl Handler<command::StorageRemove> for ControlHandler {
    async fn handle(
        &self,
        command: command::StorageRemove,
        _: &mut Connection<'_>,
    ) -> Result<Done, HandlerFailure> {
        self.storages.remove(command.storage_id)?;
        Ok(Done)
    }
}

impl Handler<command::StorageSize> for ControlHandler {
    async fn handle(
        &self,
        command: command::StorageSize,
        _: &mut Connection<'_>,
    ) -> Result<command::SizeResponse, HandlerFailure> {
        let (max, used) = self.storages.size_erased(
            command.storage_id,
            &command.parameter_size_max,
            &command.parameter_size_used,
        )?;
        Ok(command::SizeResponse { max, used })
    }
}

impl Handler<command::SegmentCreate> for ControlHandler {
    async fn handle(
        &self,
        command: command::SegmentCreate,
        _: &mut Connection<'_>,
    ) -> Result<mcs_dtyp::SegmentId, HandlerFailure> {
        Ok(self.storages.segment_create_erased(
            command.storage_id,
            &command.parameter,
            command.size,
        )?)
    }
}

impl Handler<command::SegmentRemove> for ControlHandler {
    async fn handle(
        &self,
        command: command::SegmentRemove,
        _: &mut Connection<'_>,
    ) -> Result<mcs_dtyp::Size, HandlerFailure> {
        Ok(self.storages.segment_remove_erased(
            command.storage_id,
            &command.parameter,
            command.segment_id,
        )?)
    }
}

impl Handler<command::ChunkDescription> for ControlHandler {
    async fn handle(
        &self,
        command: command::ChunkDescription,
        _: &mut Connection<'_>,
    ) -> Result<crate::chunk::Description, HandlerFailure> {
        Ok(self.storages.chunk_description_erased(
            command.storage_id,
            &command.parameter,
            command.segment_id,
            command.memory_range,
            command.access,
        )?)
    }
}

impl Handler<command::FileRead> for ControlHandler {
    async fn handle(
        &self,
        command: command::FileRead,
        _: &mut Connection<'_>,
    ) -> Result<mcs_dtyp::Size, HandlerFailure> {
        Ok(self.storages.file_read_erased(
            command.storage_id,
            &command.parameter,
            command.segment_id,
            command.offset,
            command.path,
            command.range,
        )?)
    }
}

impl Handler<command::FileWrite> for ControlHandler {
    async fn handle(
        &self,
        command: command::FileWrite,
        _: &mut Connection<'_>,
    ) -> Result<mcs_dtyp::Size, HandlerFailure> {
        Ok(self.storages.file_write_erased(
            command.storage_id,
            &command.parameter,
            command.segment_id,
            command.offset,
            command.path,
            command.range,
        )?)
    }
}
