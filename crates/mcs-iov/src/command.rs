//! Backend commands.

use binrw::prelude::*;

use mcs_dtyp::{Range, Size, binrw_util};
use mcs_rpc::{Command, Done};

use crate::collection::{self, Location, UsedStorage};
use crate::state;
use crate::storage::{self, Storage};

/// A snapshot of the provider's whole state.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateSnapshot;

impl Command for StateSnapshot {
    type Response = state::State;
    const TAG: &'static str = "iov_backend.state";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RangeOf {
    pub collection_id: collection::Id,
}

impl Command for RangeOf {
    type Response = Range;
    const TAG: &'static str = "iov_backend.range";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct LocationsOf {
    pub collection_id: collection::Id,
    pub range: Range,
}

#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq, Eq)]
#[brw(little)]
pub struct LocationsResponse {
    #[bw(write_with = binrw_util::write_vec)]
    #[br(parse_with = binrw_util::parse_vec)]
    pub locations: Vec<Location>,
}

impl Command for LocationsOf {
    type Response = LocationsResponse;
    const TAG: &'static str = "iov_backend.locations";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct CollectionCreate {
    pub collection_id: collection::Id,
    pub size: Size,
}

#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq, Eq)]
#[brw(little)]
pub struct UsedStoragesResponse {
    #[bw(write_with = binrw_util::write_vec)]
    #[br(parse_with = binrw_util::parse_vec)]
    pub used: Vec<UsedStorage>,
}

impl Command for CollectionCreate {
    type Response = UsedStoragesResponse;
    const TAG: &'static str = "iov_backend.collection.create";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct CollectionAppend {
    pub collection_id: collection::Id,
    pub range: Range,
}

impl Command for CollectionAppend {
    /// The collection's new total size.
    type Response = Size;
    const TAG: &'static str = "iov_backend.collection.append";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct CollectionDelete {
    pub collection_id: collection::Id,
}

impl Command for CollectionDelete {
    type Response = Done;
    const TAG: &'static str = "iov_backend.collection.delete";
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct StorageAdd {
    pub storage: Storage,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct StorageAddResponse {
    pub storage_id: storage::Id,
}

impl Command for StorageAdd {
    type Response = StorageAddResponse;
    const TAG: &'static str = "iov_backend.storage.add";
}
