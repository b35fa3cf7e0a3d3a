//! The backend's description of one physical storage.

use binrw::prelude::*;
use binrw::{BinResult, Endian};

use mcs_core::storage::ImplementationId;
use mcs_dtyp::read::{Read, ReadError, State};
use mcs_dtyp::{Connectable, Parameter, StorageId};

/// Backend-local storage id, monotonically issued by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    pub const FIRST: Id = Id(0);

    pub const fn new(value: u64) -> Self {
        Id(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    pub fn issue(&mut self) -> Id {
        let issued = *self;
        self.0 += 1;
        issued
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "st_{}", self.0)
    }
}

impl Read for Id {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("st_")?;
        Ok(Id(state.uint()?))
    }
}

impl BinRead for Id {
    type Args<'a> = ();

    fn read_options<R: std::io::Read + std::io::Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        Ok(Id(u64::read_options(reader, endian, ())?))
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
        self.0.write_options(writer, endian, ())
    }
}

/// Everything the backend needs to allocate on, route to and account for
/// one storage: where its providers live, and the parameter blobs its
/// implementation expects for each operation.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Storage {
    pub implementation_id: ImplementationId,
    pub parameter_create: Parameter,
    pub storages_provider: Connectable,
    pub transport_provider: Connectable,
    pub storage_id: StorageId,
    pub parameter_size_max: Parameter,
    pub parameter_size_used: Parameter,
    pub parameter_segment_create: Parameter,
    pub parameter_segment_remove: Parameter,
    pub parameter_chunk_description: Parameter,
    pub parameter_file_read: Parameter,
    pub parameter_file_write: Parameter,
}

impl std::fmt::Display for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {} }}",
            self.implementation_id,
            self.parameter_create,
            self.storages_provider,
            self.transport_provider,
            self.storage_id,
            self.parameter_size_max,
            self.parameter_size_used,
            self.parameter_segment_create,
            self.parameter_segment_remove,
            self.parameter_chunk_description,
            self.parameter_file_read,
            self.parameter_file_write
        )
    }
}

impl Read for Storage {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("{ ")?;
        let implementation_id = <ImplementationId as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_create = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let storages_provider = <Connectable as Read>::read(state)?;
        state.prefix(", ")?;
        let transport_provider = <Connectable as Read>::read(state)?;
        state.prefix(", ")?;
        let storage_id = <StorageId as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_size_max = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_size_used = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_segment_create = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_segment_remove = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_chunk_description = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_file_read = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let parameter_file_write = <Parameter as Read>::read(state)?;
        state.prefix(" }")?;
        Ok(Storage {
            implementation_id,
            parameter_create,
            storages_provider,
            transport_provider,
            storage_id,
            parameter_size_max,
            parameter_size_used,
            parameter_segment_create,
            parameter_segment_remove,
            parameter_chunk_description,
            parameter_file_read,
            parameter_file_write,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::{load, read, save};

    fn sample() -> Storage {
        Storage {
            implementation_id: ImplementationId::Heap,
            parameter_create: Parameter::encode(&1u8).unwrap(),
            storages_provider: Connectable::tcp("127.0.0.1", 7000),
            transport_provider: Connectable::unix("/run/mcs-transport.sock"),
            storage_id: StorageId::new(0),
            parameter_size_max: Parameter::default(),
            parameter_size_used: Parameter::default(),
            parameter_segment_create: Parameter::encode(&2u16).unwrap(),
            parameter_segment_remove: Parameter::default(),
            parameter_chunk_description: Parameter::default(),
            parameter_file_read: Parameter::default(),
            parameter_file_write: Parameter::default(),
        }
    }

    #[test]
    fn read_of_fmt_is_identity() {
        let storage = sample();
        assert_eq!(read::read::<Storage>(&storage.to_string()).unwrap(), storage);
    }

    #[test]
    fn codec_round_trip() {
        let storage = sample();
        assert_eq!(load::<Storage>(&save(&storage).unwrap()).unwrap(), storage);
    }
}
