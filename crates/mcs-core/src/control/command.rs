//! Control commands.
//!
//! Parameters travel as erased blobs; the handler recovers the typed
//! values against the storage's implementation.

use binrw::prelude::*;

use mcs_dtyp::{MaxSize, Offset, Parameter, Range, SegmentId, Size, StorageId, binrw_util};
use mcs_rpc::{Command, Done};

use crate::chunk::{self, AccessMode};
use crate::storage::ImplementationId;

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct StorageCreate {
    pub implementation_id: ImplementationId,
    pub parameter_create: Parameter,
}

impl Command for StorageCreate {
    type Response = StorageId;
    const TAG: &'static str = "control.storage.create";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct StorageRemove {
    pub storage_id: StorageId,
}

impl Command for StorageRemove {
    type Response = Done;
    const TAG: &'static str = "control.storage.remove";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct StorageSize {
    pub storage_id: StorageId,
    pub parameter_size_max: Parameter,
    pub parameter_size_used: Parameter,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct SizeResponse {
    pub max: MaxSize,
    pub used: Size,
}

impl Command for StorageSize {
    type Response = SizeResponse;
    const TAG: &'static str = "control.storage.size";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct SegmentCreate {
    pub storage_id: StorageId,
    pub parameter: Parameter,
    pub size: Size,
}

impl Command for SegmentCreate {
    type Response = SegmentId;
    const TAG: &'static str = "control.segment.create";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct SegmentRemove {
    pub storage_id: StorageId,
    pub parameter: Parameter,
    pub segment_id: SegmentId,
}

impl Command for SegmentRemove {
    /// The bytes actually freed.
    type Response = Size;
    const TAG: &'static str = "control.segment.remove";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ChunkDescription {
    pub storage_id: StorageId,
    pub parameter: Parameter,
    pub segment_id: SegmentId,
    pub memory_range: Range,
    pub access: AccessMode,
}

impl Command for ChunkDescription {
    type Response = chunk::Description;
    const TAG: &'static str = "control.chunk.description";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FileRead {
    pub storage_id: StorageId,
    pub parameter: Parameter,
    pub segment_id: SegmentId,
    pub offset: Offset,
    #[bw(write_with = binrw_util::write_path)]
    #[br(parse_with = binrw_util::parse_path)]
    pub path: std::path::PathBuf,
    pub range: Range,
}

impl Command for FileRead {
    type Response = Size;
    const TAG: &'static str = "control.file.read";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct FileWrite {
    pub storage_id: StorageId,
    pub parameter: Parameter,
    pub segment_id: SegmentId,
    pub offset: Offset,
    #[bw(write_with = binrw_util::write_path)]
    #[br(parse_with = binrw_util::parse_path)]
    pub path: std::path::PathBuf,
    pub range: Range,
}

impl Command for FileWrite {
    type Response = Size;
    const TAG: &'static str = "control.file.write";
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::{load, save};

    #[test]
    fn commands_round_trip_through_the_codec() {
        let command = StorageSize {
            storage_id: StorageId::new(3),
            parameter_size_max: Parameter::encode(&7u8).unwrap(),
            parameter_size_used: Parameter::default(),
        };
        assert_eq!(load::<StorageSize>(&save(&command).unwrap()).unwrap(), command);

        let command = ChunkDescription {
            storage_id: StorageId::new(1),
            parameter: Parameter::default(),
            segment_id: SegmentId::new(2),
            memory_range: Range::at(Offset::new(8), Size::new(24)),
            access: AccessMode::Mutable,
        };
        assert_eq!(
            load::<ChunkDescription>(&save(&command).unwrap()).unwrap(),
            command
        );
    }
}
