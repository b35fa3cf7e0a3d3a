//! File-backed segments under a directory prefix.
//!
//! One file per segment, named by the segment id's canonical form. Opening
//! a storage adopts every file already present, which is how a storage
//! survives a provider restart; anything else in the directory is an
//! error.

use std::collections::HashMap;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use binrw::prelude::*;
use memmap2::MmapRaw;

use mcs_dtyp::{MaxSize, Offset, Range, SegmentId, Size, binrw_util, read};

use crate::chunk::{self, AccessMode};
use crate::storage::heap::read_at_fully;
use crate::storage::shmem::Persistency;
use crate::storage::{Implementation, ImplementationId, StorageError, check_range};

#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Create {
    /// Directory holding one file per segment.
    #[bw(write_with = binrw_util::write_path)]
    #[br(parse_with = binrw_util::parse_path)]
    pub prefix: PathBuf,
    pub max_size: MaxSize,
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeMax;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeUsed;

#[derive(BinRead, BinWrite, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[brw(little)]
pub struct SegmentCreate {
    pub persistency: Persistency,
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
    path: PathBuf,
    size: Size,
    keep: bool,
}

/// One file per segment under a directory prefix.
pub struct Files {
    prefix: PathBuf,
    max_size: MaxSize,
    size_used: Size,
    next_segment_id: SegmentId,
    segments: HashMap<SegmentId, Segment>,
}

impl Files {
    fn segment(&self, segment_id: SegmentId) -> Result<&Segment, StorageError> {
        self.segments
            .get(&segment_id)
            .ok_or(StorageError::UnknownSegmentId(segment_id))
    }
}

impl Implementation for Files {
    const ID: ImplementationId = ImplementationId::Files;

    type Create = Create;
    type SizeMax = SizeMax;
    type SizeUsed = SizeUsed;
    type SegmentCreate = SegmentCreate;
    type SegmentRemove = SegmentRemove;
    type ChunkDescription = ChunkDescription;
    type FileRead = FileRead;
    type FileWrite = FileWrite;

    fn create(parameter: Create) -> Result<Files, StorageError> {
        let open = || -> Result<Files, StorageError> {
            std::fs::create_dir_all(&parameter.prefix)?;
            let mut storage = Files {
                prefix: parameter.prefix.clone(),
                max_size: parameter.max_size,
                size_used: Size::ZERO,
                next_segment_id: SegmentId::FIRST,
                segments: HashMap::new(),
            };
            for entry in std::fs::read_dir(&parameter.prefix)? {
                let entry = entry?;
                let name = entry.file_name();
                let segment_id = name
                    .to_str()
                    .and_then(|name| read::read::<SegmentId>(name).ok())
                    .ok_or_else(|| StorageError::PrefixContainsNonSegmentFile {
                        path: entry.path(),
                    })?;
                let size = Size::new(entry.metadata()?.len());
                storage.segments.insert(
                    segment_id,
                    Segment {
                        path: entry.path(),
                        size,
                        keep: false,
                    },
                );
                storage.size_used += size;
                if segment_id >= storage.next_segment_id {
                    storage.next_segment_id = SegmentId::new(segment_id.value() + 1);
                }
            }
            Ok(storage)
        };
        open().map_err(|source| StorageError::Create(Box::new(source)))
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
        let path = self.prefix.join(self.next_segment_id.to_string());
        let file = std::fs::File::create(&path)?;
        file.set_len(size.value())?;

        let segment_id = self.next_segment_id.issue();
        if self
            .segments
            .insert(
                segment_id,
                Segment {
                    path,
                    size,
                    keep: parameter.persistency == Persistency::Keep,
                },
            )
            .is_some()
        {
            return Err(StorageError::DuplicateSegmentId(segment_id));
        }
        self.size_used += size;
        Ok(segment_id)
    }

    fn segment_remove(&mut self, _: SegmentRemove, segment_id: SegmentId) -> Result<Size, StorageError> {
        let segment = self
            .segments
            .remove(&segment_id)
            .ok_or(StorageError::UnknownSegmentId(segment_id))?;
        if segment.keep {
            // bytes stay on disk and stay counted until the next open
            return Ok(Size::ZERO);
        }
        std::fs::remove_file(&segment.path)?;
        self.size_used -= segment.size;
        Ok(segment.size)
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
                backing: chunk::Backing::Files {
                    path: segment.path.clone(),
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
        let from = std::fs::File::open(&path).map_err(|source| StorageError::FileReadFailed {
            path: path.clone(),
            source,
        })?;
        let mut bytes = vec![0u8; range.size().as_usize()];
        let copied = read_at_fully(&from, range.begin(), &mut bytes)
            .map_err(|source| StorageError::FileReadFailed { path, source })?;
        let into = std::fs::OpenOptions::new().write(true).open(&segment.path)?;
        into.write_all_at(&bytes[..copied.as_usize()], offset.value())?;
        Ok(copied)
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
        let from = std::fs::File::open(&segment.path)?;
        let mut bytes = vec![0u8; range.size().as_usize()];
        let copied = read_at_fully(&from, offset, &mut bytes)?;
        let into = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|source| StorageError::WriteFileFailed {
                path: path.clone(),
                source,
            })?;
        into.write_all_at(&bytes[..copied.as_usize()], range.begin().value())
            .map_err(|source| StorageError::WriteFileFailed { path, source })?;
        Ok(copied)
    }
}

/// A memory-mapped range of a segment file.
pub struct ChunkState {
    map: MmapRaw,
    range: Range,
}

impl ChunkState {
    pub(crate) fn open(
        path: &std::path::Path,
        range: Range,
        access: AccessMode,
    ) -> Result<ChunkState, StorageError> {
        let file = match access {
            AccessMode::Const => std::fs::File::open(path),
            AccessMode::Mutable => std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(path),
        }?;
        let map = MmapRaw::map_raw(&file)?;
        Ok(ChunkState { map, range })
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.map.as_ptr().add(self.range.begin().value() as usize),
                self.range.size().as_usize(),
            )
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe {
            std::slice::from_raw_parts_mut(
                self.map.as_mut_ptr().add(self.range.begin().value() as usize),
                self.range.size().as_usize(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(prefix: PathBuf, max: u64) -> Result<Files, StorageError> {
        Files::create(Create {
            prefix,
            max_size: MaxSize::Limit(Size::new(max)),
        })
    }

    #[test]
    fn a_foreign_file_in_the_prefix_is_rejected() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("not-a-segment"), b"x").unwrap();
        match files(directory.path().to_path_buf(), 100) {
            Err(StorageError::Create(source)) => {
                assert!(matches!(
                    *source,
                    StorageError::PrefixContainsNonSegmentFile { .. }
                ));
            }
            other => panic!("expected Create error, got {:?}", other.err()),
        }
    }

    #[test]
    fn reopening_adopts_existing_segments() {
        let directory = tempfile::tempdir().unwrap();
        let prefix = directory.path().to_path_buf();
        {
            let mut storage = files(prefix.clone(), 100).unwrap();
            storage
                .segment_create(
                    SegmentCreate {
                        persistency: Persistency::Keep,
                    },
                    Size::new(40),
                )
                .unwrap();
        }
        let mut storage = files(prefix, 100).unwrap();
        assert_eq!(storage.size_used(&SizeUsed), Size::new(40));
        // ids continue after the adopted ones
        let next = storage
            .segment_create(SegmentCreate::default(), Size::new(10))
            .unwrap();
        assert_eq!(next, SegmentId::new(1));
    }

    #[test]
    fn kept_segments_free_zero_bytes() {
        let directory = tempfile::tempdir().unwrap();
        let mut storage = files(directory.path().to_path_buf(), 100).unwrap();
        let segment_id = storage
            .segment_create(
                SegmentCreate {
                    persistency: Persistency::Keep,
                },
                Size::new(8),
            )
            .unwrap();
        let path = directory.path().join(segment_id.to_string());
        assert_eq!(
            storage.segment_remove(SegmentRemove, segment_id).unwrap(),
            Size::ZERO
        );
        assert!(path.exists());
    }

    #[test]
    fn chunks_are_memory_mapped_ranges() {
        let directory = tempfile::tempdir().unwrap();
        let mut storage = files(directory.path().to_path_buf(), 4096).unwrap();
        let segment_id = storage
            .segment_create(SegmentCreate::default(), Size::new(256))
            .unwrap();

        let description = storage
            .chunk_description(
                ChunkDescription,
                segment_id,
                Range::at(Offset::new(16), Size::new(32)),
                AccessMode::Mutable,
            )
            .unwrap();
        let mut chunk = crate::chunk::Chunk::<crate::chunk::Mutable>::resolve(description).unwrap();
        chunk.bytes_mut().fill(7);
        drop(chunk);

        let bytes = std::fs::read(directory.path().join(segment_id.to_string())).unwrap();
        assert!(bytes[16..48].iter().all(|b| *b == 7));
        assert!(bytes[..16].iter().all(|b| *b == 0));
    }
}
