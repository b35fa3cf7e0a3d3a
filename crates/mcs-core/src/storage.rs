//! Backing storage implementations.

pub mod c_api;
pub mod files;
pub mod heap;
pub mod shmem;
pub mod virt;

use std::path::PathBuf;

use binrw::prelude::*;
use thiserror::Error;

use mcs_dtyp::read::{Read, ReadError, State};
use mcs_dtyp::{MaxSize, Offset, Range, SegmentId, Size};

use crate::chunk::{self, AccessMode};

/// Bound every parameter and description type has to satisfy to travel
/// through commands and state files.
pub trait Wire:
    for<'a> BinWrite<Args<'a> = ()>
    + for<'a> BinRead<Args<'a> = ()>
    + std::fmt::Debug
    + Send
    + 'static
{
}

impl<T> Wire for T where
    T: for<'a> BinWrite<Args<'a> = ()>
        + for<'a> BinRead<Args<'a> = ()>
        + std::fmt::Debug
        + Send
        + 'static
{
}

/// Runtime tag of the compile-time implementation choice.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[brw(little, repr(u8))]
#[repr(u8)]
pub enum ImplementationId {
    Heap = 0,
    Shmem = 1,
    Files = 2,
    Virtual = 3,
}

impl std::fmt::Display for ImplementationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ImplementationId::Heap => "heap",
            ImplementationId::Shmem => "shmem",
            ImplementationId::Files => "files",
            ImplementationId::Virtual => "virtual",
        };
        write!(f, "{name}")
    }
}

impl Read for ImplementationId {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        // "virtual" before "files": no shared prefixes, order is free
        for (name, id) in [
            ("heap", ImplementationId::Heap),
            ("shmem", ImplementationId::Shmem),
            ("files", ImplementationId::Files),
            ("virtual", ImplementationId::Virtual),
        ] {
            if state.maybe_prefix(name) {
                return Ok(id);
            }
        }
        Err(state.error("a storage implementation name"))
    }
}

/// One backing storage implementation.
///
/// Implementations are not thread safe themselves; the registry's lock
/// discipline serializes access.
pub trait Implementation: Sized + Send + 'static {
    const ID: ImplementationId;

    type Create: Wire;
    type SizeMax: Wire;
    type SizeUsed: Wire;
    type SegmentCreate: Wire;
    type SegmentRemove: Wire;
    type ChunkDescription: Wire;
    type FileRead: Wire;
    type FileWrite: Wire;

    fn create(parameter: Self::Create) -> Result<Self, StorageError>;

    fn size_max(&self, parameter: &Self::SizeMax) -> MaxSize;
    fn size_used(&self, parameter: &Self::SizeUsed) -> Size;

    fn segment_create(
        &mut self,
        parameter: Self::SegmentCreate,
        size: Size,
    ) -> Result<SegmentId, StorageError>;

    /// Returns the bytes actually freed; zero for kept persistent segments.
    fn segment_remove(
        &mut self,
        parameter: Self::SegmentRemove,
        segment_id: SegmentId,
    ) -> Result<Size, StorageError>;

    fn chunk_description(
        &self,
        parameter: Self::ChunkDescription,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, StorageError>;

    fn file_read(
        &self,
        parameter: Self::FileRead,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError>;

    fn file_write(
        &self,
        parameter: Self::FileWrite,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError>;
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("unknown storage id {0}")]
    UnknownId(mcs_dtyp::StorageId),

    #[error("storage {storage_id} is a {actual} storage, not {expected}")]
    WrongImplementation {
        storage_id: mcs_dtyp::StorageId,
        expected: ImplementationId,
        actual: ImplementationId,
    },

    #[error("bad alloc: requested {requested}, used {used}, max {max}")]
    BadAlloc {
        requested: Size,
        used: Size,
        max: MaxSize,
    },

    #[error("unknown segment id {0}")]
    UnknownSegmentId(SegmentId),

    #[error("duplicate segment id {0}")]
    DuplicateSegmentId(SegmentId),

    #[error("chunk description for segment {segment_id}, range {memory_range} failed")]
    ChunkDescription {
        segment_id: SegmentId,
        memory_range: Range,
        #[source]
        source: Box<StorageError>,
    },

    #[error("range {requested} is out of the segment range {segment}")]
    OutOfRange { requested: Range, segment: Range },

    #[error("storage create failed")]
    Create(#[source] Box<StorageError>),

    #[error("prefix contains a non-segment file: '{path}'")]
    PrefixContainsNonSegmentFile { path: PathBuf },

    #[error("method '{name}' is not provided by the loaded implementation")]
    MethodNotProvided { name: &'static str },

    #[error("the loaded implementation failed: {reason}")]
    Implementation { reason: String },

    #[error("could not load '{path}'")]
    DlError {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("file read from '{path}' failed")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file write to '{path}' failed")]
    WriteFileFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syscall {what} failed")]
    Syscall {
        what: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("I/O failed")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] mcs_dtyp::CodecError),
}

impl StorageError {
    pub(crate) fn chunk_description(
        segment_id: SegmentId,
        memory_range: Range,
        source: StorageError,
    ) -> StorageError {
        StorageError::ChunkDescription {
            segment_id,
            memory_range,
            source: Box::new(source),
        }
    }

    pub(crate) fn syscall(what: &'static str) -> impl FnOnce(nix::Error) -> StorageError {
        move |source| StorageError::Syscall { what, source }
    }
}

/// Validates that `requested` lies within a segment of `segment_size`
/// bytes.
pub(crate) fn check_range(requested: Range, segment_size: usize) -> Result<(), StorageError> {
    let segment = Range::at(Offset::ZERO, Size::new(segment_size as u64));
    if !segment.contains(requested) {
        return Err(StorageError::OutOfRange { requested, segment });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::read;

    #[test]
    fn implementation_id_read_of_fmt_is_identity() {
        for id in [
            ImplementationId::Heap,
            ImplementationId::Shmem,
            ImplementationId::Files,
            ImplementationId::Virtual,
        ] {
            assert_eq!(
                read::read::<ImplementationId>(&id.to_string()).unwrap(),
                id
            );
        }
    }

    #[test]
    fn check_range_rejects_overhang() {
        let inside = Range::at(Offset::new(2), Size::new(8));
        assert!(check_range(inside, 10).is_ok());
        let overhang = Range::at(Offset::new(4), Size::new(8));
        assert!(matches!(
            check_range(overhang, 10),
            Err(StorageError::OutOfRange { .. })
        ));
    }
}
