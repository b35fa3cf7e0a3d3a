//! Process-heap backing.

use std::alloc::Layout;
use std::collections::HashMap;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::ptr::NonNull;

use binrw::prelude::*;

use mcs_dtyp::{MaxSize, Offset, Range, SegmentId, Size};

use crate::chunk::{self, AccessMode};
use crate::storage::{Implementation, ImplementationId, StorageError, check_range};

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Create {
    pub max_size: MaxSize,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeMax;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeUsed;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct SegmentCreate {
    /// Pin the segment's pages into RAM.
    #[br(map = |v: u8| v != 0)]
    #[bw(map = |v| u8::from(*v))]
    pub mlocked: bool,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentRemove;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkDescription;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileRead;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileWrite;

struct Segment {
    data: NonNull<u8>,
    layout: Layout,
    mlocked: bool,
}

// The allocation is exclusively owned and never reallocated.
unsafe impl Send for Segment {}
unsafe impl Sync for Segment {}

impl Segment {
    fn allocate(size: usize, mlocked: bool) -> Result<Segment, StorageError> {
        let layout = Layout::array::<u8>(size.max(1)).expect("segment size fits a layout");
        let data = match NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) }) {
            Some(data) => data,
            None => std::alloc::handle_alloc_error(layout),
        };
        if mlocked {
            unsafe { nix::sys::mman::mlock(data.cast(), size) }
                .map_err(StorageError::syscall("mlock"))?;
        }
        Ok(Segment {
            data,
            layout,
            mlocked,
        })
    }

    fn len(&self) -> usize {
        self.layout.size()
    }

    fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.len()) }
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        if self.mlocked {
            let _ = unsafe { nix::sys::mman::munlock(self.data.cast(), self.len()) };
        }
        unsafe { std::alloc::dealloc(self.data.as_ptr(), self.layout) };
    }
}

/// Heap-allocated segments, optionally `mlock`ed.
pub struct Heap {
    max_size: MaxSize,
    size_used: Size,
    next_segment_id: SegmentId,
    segments: HashMap<SegmentId, (Segment, Size)>,
}

impl Heap {
    fn segment(&self, segment_id: SegmentId) -> Result<&(Segment, Size), StorageError> {
        self.segments
            .get(&segment_id)
            .ok_or(StorageError::UnknownSegmentId(segment_id))
    }
}

impl Implementation for Heap {
    const ID: ImplementationId = ImplementationId::Heap;

    type Create = Create;
    type SizeMax = SizeMax;
    type SizeUsed = SizeUsed;
    type SegmentCreate = SegmentCreate;
    type SegmentRemove = SegmentRemove;
    type ChunkDescription = ChunkDescription;
    type FileRead = FileRead;
    type FileWrite = FileWrite;

    fn create(parameter: Create) -> Result<Heap, StorageError> {
        Ok(Heap {
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
        if !self.max_size.admits(self.size_used + size) {
            return Err(StorageError::BadAlloc {
                requested: size,
                used: self.size_used,
                max: self.max_size,
            });
        }
        let segment = Segment::allocate(size.as_usize(), parameter.mlocked)?;
        let segment_id = self.next_segment_id.issue();
        if self.segments.insert(segment_id, (segment, size)).is_some() {
            return Err(StorageError::DuplicateSegmentId(segment_id));
        }
        self.size_used += size;
        Ok(segment_id)
    }

    fn segment_remove(&mut self, _: SegmentRemove, segment_id: SegmentId) -> Result<Size, StorageError> {
        let (_, size) = self
            .segments
            .remove(&segment_id)
            .ok_or(StorageError::UnknownSegmentId(segment_id))?;
        self.size_used -= size;
        Ok(size)
    }

    fn chunk_description(
        &self,
        _: ChunkDescription,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, StorageError> {
        let describe = || -> Result<chunk::Description, StorageError> {
            let (segment, size) = self.segment(segment_id)?;
            check_range(memory_range, size.as_usize())?;
            Ok(chunk::Description {
                access,
                backing: chunk::Backing::Heap {
                    address: segment.data.as_ptr() as u64 + memory_range.begin().value(),
                    length: memory_range.size().value(),
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
        let (segment, size) = self.segment(segment_id)?;
        check_range(Range::at(offset, range.size()), size.as_usize())?;
        let file = std::fs::File::open(&path).map_err(|source| StorageError::FileReadFailed {
            path: path.clone(),
            source,
        })?;
        let into = mcs_dtyp::memory::select_mut(
            // write access to segment bytes through a shared registry lock
            // follows the chunk aliasing contract
            unsafe { std::slice::from_raw_parts_mut(segment.data.as_ptr(), segment.len()) },
            Range::at(offset, range.size()),
        );
        read_at_fully(&file, range.begin(), into).map_err(|source| StorageError::FileReadFailed {
            path,
            source,
        })
    }

    fn file_write(
        &self,
        _: FileWrite,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let (segment, size) = self.segment(segment_id)?;
        check_range(Range::at(offset, range.size()), size.as_usize())?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::WriteFileFailed {
                path: path.clone(),
                source,
            })?;
        let from = mcs_dtyp::memory::select(segment.bytes(), Range::at(offset, range.size()));
        file.write_all_at(from, range.begin().value())
            .map_err(|source| StorageError::WriteFileFailed { path, source })?;
        Ok(range.size())
    }
}

/// Reads up to `into.len()` bytes at `begin`; returns the bytes read,
/// which is less than requested at end of file.
pub(crate) fn read_at_fully(
    file: &std::fs::File,
    begin: Offset,
    into: &mut [u8],
) -> std::io::Result<Size> {
    let mut filled = 0usize;
    while filled < into.len() {
        let n = file.read_at(&mut into[filled..], begin.value() + filled as u64)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(Size::new(filled as u64))
}

/// In-process chunk state: a borrowed address range.
pub struct ChunkState {
    data: *mut u8,
    len: usize,
}

// Valid while the owning segment lives; the chunk contract requires that.
unsafe impl Send for ChunkState {}
unsafe impl Sync for ChunkState {}

impl ChunkState {
    pub(crate) fn new(address: u64, length: u64) -> ChunkState {
        ChunkState {
            data: address as *mut u8,
            len: length as usize,
        }
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.data, self.len) }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.data, self.len) }
    }
}
