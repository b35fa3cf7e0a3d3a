//! Meta-data commands.

use binrw::prelude::*;

use mcs_dtyp::binrw_util;
use mcs_rpc::Command;

use crate::block;
use crate::meta_data::blocks::{AddResult, Location, RemoveResult};
use crate::storage::Storage;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSize;

impl Command for BlockSize {
    type Response = block::Size;
    const TAG: &'static str = "block_device.meta_data.block_size";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NumberOfBlocks;

impl Command for NumberOfBlocks {
    type Response = block::Count;
    const TAG: &'static str = "block_device.meta_data.number_of_blocks";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockRanges;

#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq, Eq)]
#[brw(little)]
pub struct BlockRangesResponse {
    #[bw(write_with = binrw_util::write_vec)]
    #[br(parse_with = binrw_util::parse_vec)]
    pub ranges: Vec<block::Range>,
}

impl Command for BlockRanges {
    type Response = BlockRangesResponse;
    const TAG: &'static str = "block_device.meta_data.blocks";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Add {
    pub storage: Storage,
}

impl Command for Add {
    type Response = AddResult;
    const TAG: &'static str = "block_device.meta_data.add";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Remove {
    pub range: block::Range,
}

impl Command for Remove {
    type Response = RemoveResult;
    const TAG: &'static str = "block_device.meta_data.remove";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct LocationOf {
    pub block_id: block::Id,
}

impl Command for LocationOf {
    type Response = Location;
    const TAG: &'static str = "block_device.meta_data.location";
}
