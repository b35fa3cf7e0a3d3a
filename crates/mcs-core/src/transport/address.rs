//! The globally routable pointer to a byte range.

use binrw::prelude::*;

use mcs_dtyp::read::{Read, ReadError, State};
use mcs_dtyp::{Offset, Parameter, SegmentId, StorageId};

/// Routes a byte range: which storage, how to describe chunks of it,
/// which segment, and where in the segment.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Address {
    pub storage_id: StorageId,
    pub chunk_description_parameter: Parameter,
    pub segment_id: SegmentId,
    pub offset: Offset,
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.storage_id, self.chunk_description_parameter, self.segment_id, self.offset
        )
    }
}

impl Read for Address {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("(")?;
        let storage_id = <StorageId as Read>::read(state)?;
        state.prefix(", ")?;
        let chunk_description_parameter = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let segment_id = <SegmentId as Read>::read(state)?;
        state.prefix(", ")?;
        let offset = <Offset as Read>::read(state)?;
        state.prefix(")")?;
        Ok(Address {
            storage_id,
            chunk_description_parameter,
            segment_id,
            offset,
        })
    }
}
