//! Meta-data command handlers.

use std::sync::{Arc, Mutex};

use mcs_rpc::{Connection, Handler, HandlerFailure};

use crate::block;
use crate::meta_data::blocks::{AddResult, Blocks, Location, RemoveResult};
use crate::meta_data::command;

#[derive(Clone)]
pub struct MetaDataHandler {
    blocks: Arc<Mutex<Blocks>>,
}

impl MetaDataHandler {
    pub fn new(blocks: Arc<Mutex<Blocks>>) -> MetaDataHandler {
        MetaDataHandler { blocks }
    }

    fn blocks(&self) -> std::sync::MutexGuard<'_, Blocks> {
        self.blocks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Handler<command::BlockSize> for MetaDataHandler {
    async fn handle(
        &self,
        _: command::BlockSize,
        _: &mut Connection<'_>,
    ) -> Result<block::Size, HandlerFailure> {
        Ok(self.blocks().block_size())
    }
}

impl Handler<command::NumberOfBlocks> for MetaDataHandler {
    async fn handle(
        &self,
        _: command::NumberOfBlocks,
        _: &mut Connection<'_>,
    ) -> Result<block::Count, HandlerFailure> {
        Ok(self.blocks().number_of_blocks())
    }
}

impl Handler<command::BlockRanges> for MetaDataHandler {
    async fn handle(
        &self,
        _: command::BlockRanges,
        _: &mut Connection<'_>,
    ) -> Result<command::BlockRangesResponse, HandlerFailure> {
        Ok(command::BlockRangesResponse {
            ranges: self.blocks().blocks(),
        })
    }
}

impl Handler<command::Add> for MetaDataHandler {
    async fn handle(
        &self,
        command: command::Add,
        _: &mut Connection<'_>,
    ) -> Result<AddResult, HandlerFailure> {
        Ok(self.blocks().add(command.storage)?)
    }
}

impl Handler<command::Remove> for MetaDataHandler {
    async fn handle(
        &self,
        command: command::Remove,
        _: &mut Connection<'_>,
    ) -> Result<RemoveResult, HandlerFailure> {
        Ok(self.blocks().remove(command.range)?)
    }
}

impl Handler<command::LocationOf> for MetaDataHandler {
    async fn handle(
        &self,
        command: command::LocationOf,
        _: &mut Connection<'_>,
    ) -> Result<Location, HandlerFailure> {
        Ok(self.blocks().location(command.block_id)?)
    }
}
