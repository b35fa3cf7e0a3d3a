//! Access-mode-qualified views over segment memory.
//!
//! A [`Description`] is the serializable recipe the registry resolves for a
//! `(storage, segment, range)` triple; a [`Chunk`] is the live view built
//! from it. The chunk owns whatever mapping state its backing needs, but
//! never the segment: the segment must outlive every chunk over it.

use std::marker::PhantomData;
use std::path::PathBuf;

use binrw::prelude::*;
use thiserror::Error;

use mcs_dtyp::{Range, Size, binrw_util};

use crate::storage::{StorageError, files, heap, shmem, virt};

/// Read-only access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Const;

/// Read-write access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mutable;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Const {}
    impl Sealed for super::Mutable {}
}

/// The two access modes, as types.
pub trait Access: sealed::Sealed + Send + Sync + 'static {
    const MODE: AccessMode;
}

impl Access for Const {
    const MODE: AccessMode = AccessMode::Const;
}

impl Access for Mutable {
    const MODE: AccessMode = AccessMode::Mutable;
}

/// The two access modes, as values on the wire.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[brw(little, repr(u8))]
#[repr(u8)]
pub enum AccessMode {
    Const = 0,
    Mutable = 1,
}

/// The per-backing recipe for building a [`Chunk`].
///
/// Heap and virtual descriptions carry in-process addresses and are only
/// meaningful inside the process owning the storage; shared-memory and
/// file descriptions name their object and resolve anywhere.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Description {
    pub access: AccessMode,
    pub backing: Backing,
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub enum Backing {
    #[brw(magic = 0u8)]
    Heap { address: u64, length: u64 },
    #[brw(magic = 1u8)]
    Shmem {
        #[bw(write_with = binrw_util::write_string)]
        #[br(parse_with = binrw_util::parse_string)]
        name: String,
        segment_length: u64,
        range: Range,
    },
    #[brw(magic = 2u8)]
    Files {
        #[bw(write_with = binrw_util::write_path)]
        #[br(parse_with = binrw_util::parse_path)]
        path: PathBuf,
        range: Range,
    },
    #[brw(magic = 3u8)]
    Virtual {
        methods: u64,
        instance: u64,
        #[bw(write_with = binrw_util::write_bytes)]
        #[br(parse_with = binrw_util::parse_bytes)]
        blob: Vec<u8>,
    },
}

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("chunk access mismatch: requested {requested:?}, description is {description:?}")]
    WrongAccess {
        requested: AccessMode,
        description: AccessMode,
    },

    #[error("could not resolve chunk description")]
    Resolve(#[source] StorageError),
}

enum State {
    Heap(heap::ChunkState),
    Shmem(shmem::ChunkState),
    Files(files::ChunkState),
    Virtual(virt::ChunkState),
}

/// A live, access-mode-qualified view over a range of segment memory.
pub struct Chunk<A: Access> {
    state: State,
    _access: PhantomData<A>,
}

impl<A: Access> Chunk<A> {
    /// Builds the view a description describes.
    ///
    /// The description must have been produced for the same access mode.
    pub fn resolve(description: Description) -> Result<Chunk<A>, ChunkError> {
        if description.access != A::MODE {
            return Err(ChunkError::WrongAccess {
                requested: A::MODE,
                description: description.access,
            });
        }
        let state = match description.backing {
            Backing::Heap { address, length } => {
                State::Heap(heap::ChunkState::new(address, length))
            }
            Backing::Shmem {
                name,
                segment_length,
                range,
            } => State::Shmem(
                shmem::ChunkState::open(&name, segment_length, range).map_err(ChunkError::Resolve)?,
            ),
            Backing::Files { path, range } => State::Files(
                files::ChunkState::open(&path, range, A::MODE).map_err(ChunkError::Resolve)?,
            ),
            Backing::Virtual {
                methods,
                instance,
                blob,
            } => State::Virtual(
                virt::ChunkState::resolve(methods, instance, &blob, A::MODE)
                    .map_err(ChunkError::Resolve)?,
            ),
        };
        Ok(Chunk {
            state,
            _access: PhantomData,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.state {
            State::Heap(state) => state.bytes(),
            State::Shmem(state) => state.bytes(),
            State::Files(state) => state.bytes(),
            State::Virtual(state) => state.bytes(),
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.bytes().len() as u64)
    }
}

impl Chunk<Mutable> {
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.state {
            State::Heap(state) => state.bytes_mut(),
            State::Shmem(state) => state.bytes_mut(),
            State::Files(state) => state.bytes_mut(),
            State::Virtual(state) => state.bytes_mut(),
        }
    }
}

/// Reinterprets the chunk's bytes as a slice of `T` with
/// `bytes / size_of::<T>()` elements.
///
/// This is the one defined aliasing point of the system.
///
/// # Safety
///
/// The chunk's memory must be valid for `T`: correctly aligned for `T`,
/// and holding initialized values of `T` for the reinterpreted prefix. The
/// backing segment must stay alive for the returned lifetime.
pub unsafe fn as_slice<A: Access, T>(chunk: &Chunk<A>) -> &[T] {
    let bytes = chunk.bytes();
    debug_assert_eq!(bytes.as_ptr().align_offset(align_of::<T>()), 0);
    unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast(), bytes.len() / size_of::<T>()) }
}

/// Mutable variant of [`as_slice`]; same safety contract.
pub unsafe fn as_slice_mut<T>(chunk: &mut Chunk<Mutable>) -> &mut [T] {
    let bytes = chunk.bytes_mut();
    debug_assert_eq!(bytes.as_ptr().align_offset(align_of::<T>()), 0);
    unsafe {
        std::slice::from_raw_parts_mut(bytes.as_mut_ptr().cast(), bytes.len() / size_of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::{Offset, load, save};

    #[test]
    fn description_codec_round_trip() {
        let description = Description {
            access: AccessMode::Mutable,
            backing: Backing::Shmem {
                name: "/mcs-7".into(),
                segment_length: 4096,
                range: Range::at(Offset::new(64), Size::new(128)),
            },
        };
        let bytes = save(&description).unwrap();
        assert_eq!(load::<Description>(&bytes).unwrap(), description);
    }

    #[test]
    fn resolve_checks_the_access_mode() {
        let description = Description {
            access: AccessMode::Const,
            backing: Backing::Heap {
                address: 0x1000,
                length: 8,
            },
        };
        assert!(matches!(
            Chunk::<Mutable>::resolve(description),
            Err(ChunkError::WrongAccess { .. })
        ));
    }
}
