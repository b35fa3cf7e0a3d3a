//! Block bookkeeping: which storage backs which run of blocks.

use binrw::prelude::*;
use thiserror::Error;

use mcs_dtyp::{Offset, Size, binrw_util};

use crate::block;
use crate::storage::Storage;
use mcs_core::transport::Address;

#[derive(Debug, Error)]
pub enum BlocksError {
    #[error("storage {storage} holds no complete block of {block_size} bytes")]
    TooSmall {
        storage: Box<Storage>,
        block_size: block::Size,
    },

    #[error("unknown block id {0}")]
    UnknownBlockId(block::Id),

    #[error("blocks {missing} of {requested} are not present")]
    NotPresent {
        requested: block::Range,
        missing: block::Id,
    },
}

/// The range of blocks a storage was assigned.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct AddResult {
    pub range: block::Range,
}

/// The storages that backed removed blocks and now back none.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct RemoveResult {
    #[bw(write_with = binrw_util::write_vec)]
    #[br(parse_with = binrw_util::parse_vec)]
    pub unused: Vec<Storage>,
}

/// Where one block lives.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Location {
    pub provider: mcs_dtyp::Connectable,
    pub address: Address,
}

struct Entry {
    blocks: block::Range,
    /// Index of `blocks.begin()` within the storage's own block run.
    storage_block_offset: u64,
    storage: Storage,
}

/// Meta data of one block device; all blocks are `block_size` bytes.
pub struct Blocks {
    block_size: block::Size,
    next_block: block::Id,
    entries: Vec<Entry>,
}

impl Blocks {
    pub fn new(block_size: block::Size) -> Blocks {
        Blocks {
            block_size,
            next_block: block::Id::new(0),
            entries: Vec::new(),
        }
    }

    pub fn block_size(&self) -> block::Size {
        self.block_size
    }

    pub fn number_of_blocks(&self) -> block::Count {
        block::Count::new(
            self.entries
                .iter()
                .map(|entry| entry.blocks.count().value())
                .sum(),
        )
    }

    /// The present block ranges, in order, adjacent runs merged.
    pub fn blocks(&self) -> Vec<block::Range> {
        let mut ranges: Vec<block::Range> = Vec::new();
        for entry in &self.entries {
            match ranges.last_mut() {
                Some(last) if last.end() == entry.blocks.begin() => {
                    *last = block::Range::new(last.begin(), entry.blocks.end())
                        .expect("merged range grows");
                }
                _ => ranges.push(entry.blocks),
            }
        }
        ranges
    }

    /// Appends the blocks the storage can hold; partial blocks at the tail
    /// of the storage range are not used.
    pub fn add(&mut self, storage: Storage) -> Result<AddResult, BlocksError> {
        let count = storage.range.size().value() / self.block_size.value();
        if count == 0 {
            return Err(BlocksError::TooSmall {
                storage: Box::new(storage),
                block_size: self.block_size,
            });
        }
        let begin = self.next_block;
        let end = block::Id::new(begin.value() + count);
        let blocks = block::Range::new(begin, end).expect("count is positive");
        self.next_block = end;
        self.entries.push(Entry {
            blocks,
            storage_block_offset: 0,
            storage,
        });
        Ok(AddResult { range: blocks })
    }

    /// Removes a range of present blocks.
    ///
    /// Returns every storage that backed part of the range and now backs
    /// no blocks at all.
    pub fn remove(&mut self, range: block::Range) -> Result<RemoveResult, BlocksError> {
        for id in range.begin().value()..range.end().value() {
            let id = block::Id::new(id);
            if !self.entries.iter().any(|entry| entry.blocks.contains(id)) {
                return Err(BlocksError::NotPresent {
                    requested: range,
                    missing: id,
                });
            }
        }

        let mut touched: Vec<Storage> = Vec::new();
        let mut kept: Vec<Entry> = Vec::new();
        for entry in self.entries.drain(..) {
            let begin = entry.blocks.begin().max(range.begin());
            let end = entry.blocks.end().min(range.end());
            if begin >= end {
                kept.push(entry);
                continue;
            }
            if !touched.contains(&entry.storage) {
                touched.push(entry.storage.clone());
            }
            // the run before the removed part
            if entry.blocks.begin() < begin {
                kept.push(Entry {
                    blocks: block::Range::new(entry.blocks.begin(), begin)
                        .expect("non-empty prefix"),
                    storage_block_offset: entry.storage_block_offset,
                    storage: entry.storage.clone(),
                });
            }
            // the run after the removed part
            if end < entry.blocks.end() {
                kept.push(Entry {
                    blocks: block::Range::new(end, entry.blocks.end()).expect("non-empty suffix"),
                    storage_block_offset: entry.storage_block_offset
                        + (end.value() - entry.blocks.begin().value()),
                    storage: entry.storage,
                });
            }
        }
        self.entries = kept;

        let unused = touched
            .into_iter()
            .filter(|storage| !self.entries.iter().any(|entry| entry.storage == *storage))
            .collect();
        Ok(RemoveResult { unused })
    }

    pub fn location(&self, id: block::Id) -> Result<Location, BlocksError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.blocks.contains(id))
            .ok_or(BlocksError::UnknownBlockId(id))?;
        let block_index =
            entry.storage_block_offset + (id.value() - entry.blocks.begin().value());
        let offset = entry.storage.range.begin()
            + Size::new(block_index * self.block_size.value());
        Ok(Location {
            provider: entry.storage.provider.clone(),
            address: Address {
                storage_id: entry.storage.storage_id,
                chunk_description_parameter: entry.storage.chunk_description_parameter.clone(),
                segment_id: entry.storage.segment_id,
                offset,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::{Connectable, Parameter, Range, SegmentId, StorageId};

    fn storage(storage_id: u64, bytes: u64) -> Storage {
        Storage {
            provider: Connectable::tcp("127.0.0.1", 9000 + storage_id as u16),
            storage_id: StorageId::new(storage_id),
            chunk_description_parameter: Parameter::default(),
            segment_id: SegmentId::new(0),
            range: Range::at(Offset::ZERO, Size::new(bytes)),
        }
    }

    fn blocks(block_size: u64) -> Blocks {
        Blocks::new(block::Size::new(block_size).unwrap())
    }

    #[test]
    fn add_appends_contiguous_ranges() {
        let mut blocks = blocks(512);
        let first = blocks.add(storage(0, 512 * 4)).unwrap();
        let second = blocks.add(storage(1, 512 * 2)).unwrap();
        assert_eq!(first.range.to_string(), "[bi_0, bi_4)");
        assert_eq!(second.range.to_string(), "[bi_4, bi_6)");
        assert_eq!(blocks.number_of_blocks(), block::Count::new(6));
        assert_eq!(blocks.blocks().len(), 1);
    }

    #[test]
    fn partial_blocks_are_not_used() {
        let mut blocks = blocks(512);
        let result = blocks.add(storage(0, 512 + 511)).unwrap();
        assert_eq!(result.range.count(), block::Count::new(1));
        assert!(matches!(
            blocks.add(storage(1, 100)),
            Err(BlocksError::TooSmall { .. })
        ));
    }

    #[test]
    fn locations_route_through_the_backing_storage() {
        let mut blocks = blocks(512);
        blocks.add(storage(0, 512 * 4)).unwrap();
        blocks.add(storage(1, 512 * 2)).unwrap();

        let location = blocks.location(block::Id::new(5)).unwrap();
        assert_eq!(location.address.storage_id, StorageId::new(1));
        assert_eq!(location.address.offset, Offset::new(512));

        assert!(matches!(
            blocks.location(block::Id::new(6)),
            Err(BlocksError::UnknownBlockId(_))
        ));
    }

    #[test]
    fn remove_reports_storages_that_became_empty() {
        let mut blocks = blocks(512);
        blocks.add(storage(0, 512 * 4)).unwrap();
        blocks.add(storage(1, 512 * 2)).unwrap();

        // take out the middle of the first storage: it still backs blocks
        let removed = blocks
            .remove(block::Range::new(block::Id::new(1), block::Id::new(3)).unwrap())
            .unwrap();
        assert!(removed.unused.is_empty());
        assert_eq!(blocks.number_of_blocks(), block::Count::new(4));

        // its last blocks go away: now it is unused
        let removed = blocks
            .remove(block::Range::new(block::Id::new(0), block::Id::new(1)).unwrap())
            .unwrap();
        assert!(removed.unused.is_empty());
        let removed = blocks
            .remove(block::Range::new(block::Id::new(3), block::Id::new(4)).unwrap())
            .unwrap();
        assert_eq!(removed.unused.len(), 1);
        assert_eq!(removed.unused[0].storage_id, StorageId::new(0));

        // split ranges route correctly after removal
        let location = blocks.location(block::Id::new(4)).unwrap();
        assert_eq!(location.address.storage_id, StorageId::new(1));
        assert_eq!(location.address.offset, Offset::ZERO);
    }

    #[test]
    fn removing_absent_blocks_fails() {
        let mut blocks = blocks(512);
        blocks.add(storage(0, 512 * 2)).unwrap();
        assert!(matches!(
            blocks.remove(block::Range::new(block::Id::new(1), block::Id::new(3)).unwrap()),
            Err(BlocksError::NotPresent { .. })
        ));
    }
}
