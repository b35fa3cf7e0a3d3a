//! The share service: a micro-service creating, attaching and removing
//! named chunks of backing memory.
//!
//! Multiple clients may attach to the same chunk; nothing synchronizes
//! their accesses.

pub mod client;
pub mod command;
pub mod handler;
pub mod provider;

pub use client::{Client, ShareError};
pub use provider::Provider;

use binrw::prelude::*;

use mcs_core::storage::ImplementationId;
use mcs_dtyp::read::{Read, ReadError, State};
use mcs_dtyp::{SegmentId, Size, StorageId};

mcs_rpc::command_set! {
    /// The share command list.
    pub struct Commands {
        command::Create,
        command::Attach,
        command::Remove,
    }
}

/// A shareable chunk: the storage and segment holding it, and its size.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Chunk {
    pub storage_id: StorageId,
    pub implementation_id: ImplementationId,
    pub segment_id: SegmentId,
    pub size: Size,
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ {}, {}, {}, {} }}",
            self.storage_id, self.implementation_id, self.segment_id, self.size
        )
    }
}

impl Read for Chunk {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("{ ")?;
        let storage_id = <StorageId as Read>::read(state)?;
        state.prefix(", ")?;
        let implementation_id = <ImplementationId as Read>::read(state)?;
        state.prefix(", ")?;
        let segment_id = <SegmentId as Read>::read(state)?;
        state.prefix(", ")?;
        let size = <Size as Read>::read(state)?;
        state.prefix(" }")?;
        Ok(Chunk {
            storage_id,
            implementation_id,
            segment_id,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::read;

    #[test]
    fn chunk_read_of_fmt_is_identity() {
        let chunk = Chunk {
            storage_id: StorageId::new(4),
            implementation_id: ImplementationId::Shmem,
            segment_id: SegmentId::new(0),
            size: Size::new(4096),
        };
        assert_eq!(chunk.to_string(), "{ bi_4, shmem, sg_0, 4096 }");
        assert_eq!(read::read::<Chunk>(&chunk.to_string()).unwrap(), chunk);
    }
}
