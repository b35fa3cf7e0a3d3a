//! A storage keeping blocks.

use binrw::prelude::*;

use mcs_dtyp::read::{Read, ReadError, State};
use mcs_dtyp::{Connectable, Parameter, Range, SegmentId, StorageId};

/// One segment range on one transport provider, backing a run of blocks.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Storage {
    /// The transport provider holding the bytes.
    pub provider: Connectable,
    pub storage_id: StorageId,
    pub chunk_description_parameter: Parameter,
    pub segment_id: SegmentId,
    pub range: Range,
}

impl std::fmt::Display for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ {}, {}, {}, {}, {} }}",
            self.provider,
            self.storage_id,
            self.chunk_description_parameter,
            self.segment_id,
            self.range
        )
    }
}

impl Read for Storage {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        state.prefix("{ ")?;
        let provider = <Connectable as Read>::read(state)?;
        state.prefix(", ")?;
        let storage_id = <StorageId as Read>::read(state)?;
        state.prefix(", ")?;
        let chunk_description_parameter = <Parameter as Read>::read(state)?;
        state.prefix(", ")?;
        let segment_id = <SegmentId as Read>::read(state)?;
        state.prefix(", ")?;
        let range = <Range as Read>::read(state)?;
        state.prefix(" }")?;
        Ok(Storage {
            provider,
            storage_id,
            chunk_description_parameter,
            segment_id,
            range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::{Offset, Size, load, read, save};

    fn storage() -> Storage {
        Storage {
            provider: Connectable::tcp("127.0.0.1", 4711),
            storage_id: StorageId::new(1),
            chunk_description_parameter: Parameter::default(),
            segment_id: SegmentId::new(0),
            range: Range::at(Offset::ZERO, Size::new(65536)),
        }
    }

    #[test]
    fn read_of_fmt_is_identity() {
        let storage = storage();
        assert_eq!(read::read::<Storage>(&storage.to_string()).unwrap(), storage);
    }

    #[test]
    fn codec_round_trip() {
        let storage = storage();
        assert_eq!(load::<Storage>(&save(&storage).unwrap()).unwrap(), storage);
    }
}
