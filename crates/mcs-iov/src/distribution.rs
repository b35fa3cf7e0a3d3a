//! Byte distribution over storages with bounded capacities.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use mcs_dtyp::distribution::equal;
use mcs_dtyp::{MaxSize, Offset, Range, Size};

use crate::IovError;
use crate::storage;

/// A queue entry: remaining capacity first so that smaller storages sort
/// first, the id breaking ties deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StorageIdAndCapacity {
    pub capacity: MaxSize,
    pub storage_id: storage::Id,
}

/// Distributes `size` bytes over the queued storages, as equal as
/// possible.
///
/// Smaller storages are considered first: a storage that cannot take its
/// equal share is filled up, and the remainder spreads over the larger
/// rest. The returned ranges partition `[begin, begin + size)` in
/// allocation order.
///
/// The queued capacities must cover `size`.
pub fn as_equal_as_possible(
    size: Size,
    begin: Offset,
    capacities: Vec<StorageIdAndCapacity>,
) -> Result<Vec<(storage::Id, Range)>, IovError> {
    let available = capacities
        .iter()
        .try_fold(Size::ZERO, |sum, entry| match entry.capacity {
            MaxSize::Unlimited => None,
            MaxSize::Limit(limit) => Some(sum + limit),
        })
        .map_or(MaxSize::Unlimited, MaxSize::Limit);
    if !available.admits(size) {
        return Err(IovError::InsufficientCapacity {
            requested: size,
            available,
        });
    }

    let mut queue: BinaryHeap<Reverse<StorageIdAndCapacity>> =
        capacities.into_iter().map(Reverse).collect();
    let mut ranges = Vec::new();
    let mut begin = begin;
    let mut remaining = size;

    while let Some(Reverse(StorageIdAndCapacity {
        capacity,
        storage_id,
    })) = queue.pop()
    {
        // the share that would make the rest of the distribution equal
        let wanted = Size::new(equal::size(
            remaining.value(),
            queue.len() as u64 + 1,
            0,
        ));
        let taken = match capacity.limit() {
            Some(limit) => wanted.min(limit),
            None => wanted,
        };
        if taken > Size::ZERO {
            ranges.push((storage_id, Range::at(begin, taken)));
            begin += taken;
            remaining -= taken;
        }
    }

    debug_assert_eq!(remaining, Size::ZERO);
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, capacity: u64) -> StorageIdAndCapacity {
        StorageIdAndCapacity {
            capacity: MaxSize::Limit(Size::new(capacity)),
            storage_id: storage::Id::new(id),
        }
    }

    #[test]
    fn small_storages_are_filled_first() {
        let ranges = as_equal_as_possible(
            Size::new(300),
            Offset::ZERO,
            vec![entry(0, 5), entry(1, 50), entry(2, 500)],
        )
        .unwrap();

        assert_eq!(
            ranges,
            vec![
                (storage::Id::new(0), Range::at(Offset::ZERO, Size::new(5))),
                (storage::Id::new(1), Range::at(Offset::new(5), Size::new(50))),
                (
                    storage::Id::new(2),
                    Range::at(Offset::new(55), Size::new(245))
                ),
            ]
        );
        let total: Size = ranges.iter().map(|(_, range)| range.size()).sum();
        assert_eq!(total, Size::new(300));
    }

    #[test]
    fn unconstrained_storages_share_equally() {
        let ranges = as_equal_as_possible(
            Size::new(10),
            Offset::ZERO,
            vec![entry(0, 100), entry(1, 100), entry(2, 100)],
        )
        .unwrap();
        let mut sizes: Vec<u64> = ranges.iter().map(|(_, r)| r.size().value()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 3, 4]);

        // touching, starting at zero
        let mut expected_begin = Offset::ZERO;
        for (_, range) in &ranges {
            assert_eq!(range.begin(), expected_begin);
            expected_begin = range.end();
        }
    }

    #[test]
    fn unlimited_capacity_takes_the_equal_share() {
        let ranges = as_equal_as_possible(
            Size::new(9),
            Offset::ZERO,
            vec![
                entry(0, 1),
                StorageIdAndCapacity {
                    capacity: MaxSize::Unlimited,
                    storage_id: storage::Id::new(1),
                },
            ],
        )
        .unwrap();
        assert_eq!(
            ranges,
            vec![
                (storage::Id::new(0), Range::at(Offset::ZERO, Size::new(1))),
                (storage::Id::new(1), Range::at(Offset::new(1), Size::new(8))),
            ]
        );
    }

    #[test]
    fn too_little_capacity_is_rejected() {
        assert!(matches!(
            as_equal_as_possible(
                Size::new(100),
                Offset::ZERO,
                vec![entry(0, 10), entry(1, 10)],
            ),
            Err(IovError::InsufficientCapacity { .. })
        ));
    }

    #[test]
    fn storages_with_nothing_to_take_get_no_range() {
        let ranges =
            as_equal_as_possible(Size::new(4), Offset::ZERO, vec![entry(0, 0), entry(1, 10)])
                .unwrap();
        assert_eq!(
            ranges,
            vec![(storage::Id::new(1), Range::at(Offset::ZERO, Size::new(4)))]
        );
    }
}
