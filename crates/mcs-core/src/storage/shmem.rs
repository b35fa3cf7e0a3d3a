//! POSIX shared-memory backing.
//!
//! Segments are shared memory objects named `<prefix>-<segment_id>`; other
//! processes attach by resolving a chunk description, which carries the
//! object name.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::os::fd::OwnedFd;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::ptr::NonNull;

use binrw::prelude::*;
use nix::fcntl::OFlag;
use nix::sys::mman::{MapFlags, ProtFlags};
use nix::sys::stat::Mode;

use mcs_dtyp::{MaxSize, Offset, Range, SegmentId, Size, binrw_util};

use crate::chunk::{self, AccessMode};
use crate::storage::heap::read_at_fully;
use crate::storage::{Implementation, ImplementationId, StorageError, check_range};

/// Whether a segment's backing object survives its removal.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little, repr(u8))]
#[repr(u8)]
pub enum Persistency {
    #[default]
    RemoveOnSegmentRemoval = 0,
    Keep = 1,
}

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Create {
    /// Shared-memory object name prefix, e.g. `/mcs-cache`.
    #[bw(write_with = binrw_util::write_string)]
    #[br(parse_with = binrw_util::parse_string)]
    pub prefix: String,
    pub max_size: MaxSize,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeMax;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeUsed;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct SegmentCreate {
    pub persistency: Persistency,
    /// File mode bits of the created object.
    pub access_mode: u32,
    #[br(map = |v: u8| v != 0)]
    #[bw(map = |v| u8::from(*v))]
    pub mlocked: bool,
}

impl Default for SegmentCreate {
    fn default() -> Self {
        SegmentCreate {
            persistency: Persistency::default(),
            access_mode: 0o600,
            mlocked: false,
        }
    }
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct SegmentRemove {
    /// Unlink the object even if the segment was created with
    /// [`Persistency::Keep`].
    #[br(map = |v: u8| v != 0)]
    #[bw(map = |v| u8::from(*v))]
    pub force_removal: bool,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkDescription;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileRead;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileWrite;

/// An owned `mmap` of a whole shared-memory object.
pub(crate) struct Mapping {
    data: Option<NonNull<libc::c_void>>,
    len: usize,
    mlocked: bool,
}

unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    fn map(fd: &OwnedFd, len: usize, mlocked: bool) -> Result<Mapping, StorageError> {
        let Some(length) = NonZeroUsize::new(len) else {
            return Ok(Mapping {
                data: None,
                len: 0,
                mlocked: false,
            });
        };
        let data = unsafe {
            nix::sys::mman::mmap(
                None,
                length,
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                fd,
                0,
            )
        }
        .map_err(StorageError::syscall("mmap"))?;
        if mlocked {
            unsafe { nix::sys::mman::mlock(data, len) }
                .map_err(StorageError::syscall("mlock"))?;
        }
        Ok(Mapping {
            data: Some(data),
            len,
            mlocked,
        })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        match self.data {
            None => &[],
            Some(data) => unsafe {
                std::slice::from_raw_parts(data.as_ptr().cast(), self.len)
            },
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        match self.data {
            None => &mut [],
            Some(data) => unsafe {
                std::slice::from_raw_parts_mut(data.as_ptr().cast(), self.len)
            },
        }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        if let Some(data) = self.data {
            if self.mlocked {
                let _ = unsafe { nix::sys::mman::munlock(data, self.len) };
            }
            let _ = unsafe { nix::sys::mman::munmap(data, self.len) };
        }
    }
}

struct Segment {
    name: String,
    mapping: Mapping,
    size: Size,
    keep: bool,
}

impl Segment {
    /// Bytes this segment contributes to `size_used`; kept segments are
    /// not storage-owned.
    fn counted(&self) -> Size {
        if self.keep { Size::ZERO } else { self.size }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if !self.keep {
            let _ = nix::sys::mman::shm_unlink(self.name.as_str());
        }
    }
}

/// Segments in named POSIX shared memory objects.
pub struct Shmem {
    prefix: String,
    max_size: MaxSize,
    size_used: Size,
    next_segment_id: SegmentId,
    segments: HashMap<SegmentId, Segment>,
}

impl Shmem {
    fn segment(&self, segment_id: SegmentId) -> Result<&Segment, StorageError> {
        self.segments
            .get(&segment_id)
            .ok_or(StorageError::UnknownSegmentId(segment_id))
    }

    fn object_name(&self, segment_id: SegmentId) -> String {
        format!("{}-{segment_id}", self.prefix)
    }
}

impl Implementation for Shmem {
    const ID: ImplementationId = ImplementationId::Shmem;

    type Create = Create;
    type SizeMax = SizeMax;
    type SizeUsed = SizeUsed;
    type SegmentCreate = SegmentCreate;
    type SegmentRemove = SegmentRemove;
    type ChunkDescription = ChunkDescription;
    type FileRead = FileRead;
    type FileWrite = FileWrite;

    fn create(parameter: Create) -> Result<Shmem, StorageError> {
        Ok(Shmem {
            prefix: parameter.prefix,
            max_size: parameter.max_size,
            size_used: Size::ZERO,
            next_segment_id: SegmentId::FIRST,
            segments: HashMap::new(),
        })
    }

    fn size_max(&self, _: &SizeMax) -> MaxSize {
        self.max_size
    }

    fn size_used(&self, _: &SizeUsed) -> Size {
        self.size_used
    }

    fn segment_create(
        &mut self,
        parameter: SegmentCreate,
        size: Size,
    ) -> Result<SegmentId, StorageError> {
        let keep = parameter.persistency == Persistency::Keep;
        let counted = if keep { Size::ZERO } else { size };
        if !self.max_size.admits(self.size_used + counted) {
            return Err(StorageError::BadAlloc {
                requested: size,
                used: self.size_used,
                max: self.max_size,
            });
        }

        let name = self.object_name(self.next_segment_id);
        let fd = nix::sys::mman::shm_open(
            name.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            Mode::from_bits_truncate(parameter.access_mode),
        )
        .map_err(StorageError::syscall("shm_open"))?;
        nix::unistd::ftruncate(&fd, size.value() as libc::off_t)
            .map_err(StorageError::syscall("ftruncate"))?;
        let mapping = Mapping::map(&fd, size.as_usize(), parameter.mlocked)?;

        let segment_id = self.next_segment_id.issue();
        let segment = Segment {
            name,
            mapping,
            size,
            keep,
        };
        self.size_used += segment.counted();
        if self.segments.insert(segment_id, segment).is_some() {
            return Err(StorageError::DuplicateSegmentId(segment_id));
        }
        Ok(segment_id)
    }

    fn segment_remove(
        &mut self,
        parameter: SegmentRemove,
        segment_id: SegmentId,
    ) -> Result<Size, StorageError> {
        let mut segment = self
            .segments
            .remove(&segment_id)
            .ok_or(StorageError::UnknownSegmentId(segment_id))?;
        let freed = segment.counted();
        self.size_used -= freed;
        if parameter.force_removal {
            segment.keep = false;
        }
        Ok(freed)
    }

    fn chunk_description(
        &self,
        _: ChunkDescription,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, StorageError> {
        let describe = || -> Result<chunk::Description, StorageError> {
            let segment = self.segment(segment_id)?;
            check_range(memory_range, segment.size.as_usize())?;
            Ok(chunk::Description {
                access,
                backing: chunk::Backing::Shmem {
                    name: segment.name.clone(),
                    segment_length: segment.size.value(),
                    range: memory_range,
                },
            })
        };
        describe().map_err(|source| StorageError::chunk_description(segment_id, memory_range, source))
    }

    fn file_read(
        &self,
        _: FileRead,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let segment = self.segment(segment_id)?;
        check_range(Range::at(offset, range.size()), segment.size.as_usize())?;
        let file = std::fs::File::open(&path).map_err(|source| StorageError::FileReadFailed {
            path: path.clone(),
            source,
        })?;
        let into = unsafe {
            std::slice::from_raw_parts_mut(
                segment
                    .mapping
                    .bytes()
                    .as_ptr()
                    .cast_mut()
                    .add(offset.value() as usize),
                range.size().as_usize(),
            )
        };
        read_at_fully(&file, range.begin(), into)
            .map_err(|source| StorageError::FileReadFailed { path, source })
    }

    fn file_write(
        &self,
        _: FileWrite,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let segment = self.segment(segment_id)?;
        check_range(Range::at(offset, range.size()), segment.size.as_usize())?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::WriteFileFailed {
                path: path.clone(),
                source,
            })?;
        let from = mcs_dtyp::memory::select(
            segment.mapping.bytes(),
            Range::at(offset, range.size()),
        );
        file.write_all_at(from, range.begin().value())
            .map_err(|source| StorageError::WriteFileFailed { path, source })?;
        Ok(range.size())
    }
}

/// An attached view: its own mapping of the named object.
pub struct ChunkState {
    mapping: Mapping,
    range: Range,
}

impl ChunkState {
    pub(crate) fn open(
        name: &str,
        segment_length: u64,
        range: Range,
    ) -> Result<ChunkState, StorageError> {
        let fd = nix::sys::mman::shm_open(name, OFlag::O_RDWR, Mode::empty())
            .map_err(StorageError::syscall("shm_open"))?;
        let mapping = Mapping::map(&fd, segment_length as usize, false)?;
        Ok(ChunkState { mapping, range })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        mcs_dtyp::memory::select(self.mapping.bytes(), self.range)
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        mcs_dtyp::memory::select_mut(self.mapping.bytes_mut(), self.range)
    }
}
