//! Collections: named sequences of logical byte ranges striped across
//! storages.

use binrw::prelude::*;
use binrw::{BinResult, Endian};

use mcs_core::storage::ImplementationId;
use mcs_dtyp::read::{Read, ReadError, State};
use mcs_dtyp::{Connectable, Parameter, Range, binrw_util};

use mcs_core::transport::Address;

use crate::storage;

/// A collection name; unique per backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(String);

impl Id {
    pub fn new(name: impl Into<String>) -> Id {
        Id(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl Read for Id {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        Ok(Id(state.quoted()?))
    }
}

impl BinRead for Id {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(Id(binrw_util::parse_string(reader, endian, ())?))
    }
}

impl BinWrite for Id {
    type Args<'a> = ();

    fn write_options<W: std::io::Write + std::io::Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        binrw_util::write_string(&self.0, writer, endian, ())
    }
}

/// One striped piece of a collection: which segment on which storage
/// holds which logical range.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct UsedStorage {
    pub segment_id: mcs_dtyp::SegmentId,
    /// Logical range within the collection.
    pub range: Range,
    pub storage_id: storage::Id,
}

pub type UsedStorages = Vec<UsedStorage>;

/// One resolved piece of a locations query: where a logical subrange
/// physically lives and how to reach it.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Location {
    /// The covered logical subrange.
    pub range: Range,
    pub storages_provider: Connectable,
    pub implementation_id: ImplementationId,
    pub parameter_file_read: Parameter,
    pub parameter_file_write: Parameter,
    pub transport_provider: Connectable,
    pub address: Address,
}

pub type Locations = Vec<Location>;
