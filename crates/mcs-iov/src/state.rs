//! Provider state: storages, collections and their bookkeeping.
//!
//! The state is codec-serializable; a provider restarted from a state
//! file re-opens its storages-clients before serving again.

use std::collections::BTreeMap;

use binrw::prelude::*;

use mcs_dtyp::{Offset, Range, Size, binrw_util};

use crate::collection::{self, Location, Locations, UsedStorage, UsedStorages};
use crate::distribution::{self, StorageIdAndCapacity};
use crate::storage::{self, Storage};
use crate::storages_clients::StoragesClients;
use crate::IovError;

use mcs_core::transport::Address;

/// The whole of a provider's knowledge; a snapshot of it is what the
/// `State` command returns and what the state file holds.
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq, Eq)]
#[brw(little)]
pub struct State {
    pub next_storage_id: storage::Id,
    #[bw(write_with = binrw_util::write_map)]
    #[br(parse_with = binrw_util::parse_map)]
    pub storages: BTreeMap<storage::Id, Storage>,
    #[bw(write_with = binrw_util::write_map)]
    #[br(parse_with = binrw_util::parse_map)]
    pub collections: BTreeMap<collection::Id, CollectionEntries>,
}

/// The used storages of one collection, ordered by logical range.
#[derive(BinRead, BinWrite, Debug, Clone, Default, PartialEq, Eq)]
#[brw(little)]
pub struct CollectionEntries {
    #[bw(write_with = binrw_util::write_vec)]
    #[br(parse_with = binrw_util::parse_vec)]
    pub used: UsedStorages,
}

impl CollectionEntries {
    fn total(&self) -> Size {
        self.used
            .last()
            .map(|entry| entry.range.end() - Offset::ZERO)
            .unwrap_or(Size::ZERO)
    }
}

impl State {
    /// Registers a storage and opens its persistent client connection.
    pub async fn storage_add(
        &mut self,
        clients: &StoragesClients,
        storage: Storage,
    ) -> Result<storage::Id, IovError> {
        let storage_id = self.next_storage_id.issue();
        clients.open(storage_id, &storage.storages_provider).await?;
        self.storages.insert(storage_id, storage);
        Ok(storage_id)
    }

    /// Re-opens the client connections of every known storage; called
    /// before a restarted provider accepts calls.
    pub async fn restart(&self, clients: &StoragesClients) -> Result<(), IovError> {
        for (storage_id, storage) in &self.storages {
            clients.open(*storage_id, &storage.storages_provider).await?;
        }
        Ok(())
    }

    /// Creates a collection of `size` bytes striped over the storages.
    pub async fn collection_create(
        &mut self,
        clients: &StoragesClients,
        collection_id: collection::Id,
        size: Size,
    ) -> Result<UsedStorages, IovError> {
        if self.collections.contains_key(&collection_id) {
            return Err(IovError::DuplicateId(collection_id));
        }
        let used = self.allocate(clients, Offset::ZERO, size).await?;
        self.collections.insert(
            collection_id,
            CollectionEntries { used: used.clone() },
        );
        Ok(used)
    }

    /// Grows the collection so that `range` fits; already covered ranges
    /// allocate nothing. Returns the collection's new total size.
    pub async fn collection_append(
        &mut self,
        clients: &StoragesClients,
        collection_id: collection::Id,
        range: Range,
    ) -> Result<Size, IovError> {
        let total = {
            let entries = self
                .collections
                .get(&collection_id)
                .ok_or_else(|| IovError::UnknownCollection(collection_id.clone()))?;
            entries.total()
        };
        let tail = range.end() - Offset::ZERO;
        if tail <= total {
            return Ok(total);
        }
        let grown = self
            .allocate(clients, Offset::ZERO + total, tail - total)
            .await?;
        let entries = self
            .collections
            .get_mut(&collection_id)
            .ok_or(IovError::UnknownCollection(collection_id))?;
        entries.used.extend(grown);
        Ok(entries.total())
    }

    /// Frees all used storages of the collection, then forgets it.
    pub async fn collection_delete(
        &mut self,
        clients: &StoragesClients,
        collection_id: collection::Id,
    ) -> Result<(), IovError> {
        let entries = self
            .collections
            .get(&collection_id)
            .ok_or_else(|| IovError::UnknownCollection(collection_id.clone()))?;
        clients.remove_segments(&self.storages, &entries.used).await?;
        self.collections.remove(&collection_id);
        Ok(())
    }

    /// The collection's logical range, `[0, total)`.
    pub fn range(&self, collection_id: &collection::Id) -> Result<Range, IovError> {
        let entries = self
            .collections
            .get(collection_id)
            .ok_or_else(|| IovError::UnknownCollection(collection_id.clone()))?;
        Ok(Range::at(Offset::ZERO, entries.total()))
    }

    /// Resolves the physical locations covering `range`, exactly.
    pub fn locations(
        &self,
        collection_id: &collection::Id,
        range: Range,
    ) -> Result<Locations, IovError> {
        let entries = self
            .collections
            .get(collection_id)
            .ok_or_else(|| IovError::UnknownCollection(collection_id.clone()))?;
        let collection = Range::at(Offset::ZERO, entries.total());
        if !collection.contains(range) {
            return Err(IovError::OutOfRange {
                requested: range,
                collection,
            });
        }

        let mut locations = Vec::new();
        for used in &entries.used {
            let begin = used.range.begin().max(range.begin());
            let end = used.range.end().min(range.end());
            if begin >= end {
                continue;
            }
            let storage = self
                .storages
                .get(&used.storage_id)
                .ok_or(IovError::UnknownStorageId(used.storage_id))?;
            locations.push(Location {
                range: Range::new(begin, end).expect("overlap is non-empty"),
                storages_provider: storage.storages_provider.clone(),
                implementation_id: storage.implementation_id,
                parameter_file_read: storage.parameter_file_read.clone(),
                parameter_file_write: storage.parameter_file_write.clone(),
                transport_provider: storage.transport_provider.clone(),
                address: Address {
                    storage_id: storage.storage_id,
                    chunk_description_parameter: storage.parameter_chunk_description.clone(),
                    segment_id: used.segment_id,
                    offset: Offset::new(
                        begin.value() - used.range.begin().value(),
                    ),
                },
            });
        }
        Ok(locations)
    }

    /// Queries remote capacities, distributes, and creates one segment
    /// per chosen storage.
    async fn allocate(
        &self,
        clients: &StoragesClients,
        begin: Offset,
        size: Size,
    ) -> Result<UsedStorages, IovError> {
        let mut capacities = Vec::new();
        for (storage_id, storage) in &self.storages {
            let client = clients.at(*storage_id)?;
            let (max, used) = client
                .storage_size(
                    storage.storage_id,
                    storage.parameter_size_max.clone(),
                    storage.parameter_size_used.clone(),
                )
                .await?;
            capacities.push(StorageIdAndCapacity {
                capacity: max.remaining(used),
                storage_id: *storage_id,
            });
        }

        let ranges = distribution::as_equal_as_possible(size, begin, capacities)?;

        let mut used = Vec::new();
        for (storage_id, range) in ranges {
            let storage = self
                .storages
                .get(&storage_id)
                .ok_or(IovError::UnknownStorageId(storage_id))?;
            let client = clients.at(storage_id)?;
            let segment_id = client
                .segment_create(
                    storage.storage_id,
                    storage.parameter_segment_create.clone(),
                    range.size(),
                )
                .await;
            let segment_id = match segment_id {
                Ok(segment_id) => segment_id,
                Err(error) => {
                    // free what this allocation already took
                    if let Err(cleanup) =
                        clients.remove_segments(&self.storages, &used).await
                    {
                        log::warn!("could not roll back allocation: {cleanup}");
                    }
                    return Err(error.into());
                }
            };
            used.push(UsedStorage {
                segment_id,
                range,
                storage_id,
            });
        }
        Ok(used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_core::storage::ImplementationId;
    use mcs_dtyp::{Connectable, Parameter, StorageId, load, save};

    fn storage(port: u16) -> Storage {
        Storage {
            implementation_id: ImplementationId::Heap,
            parameter_create: Parameter::default(),
            storages_provider: Connectable::tcp("127.0.0.1", port),
            transport_provider: Connectable::tcp("127.0.0.1", port + 1),
            storage_id: StorageId::new(0),
            parameter_size_max: Parameter::default(),
            parameter_size_used: Parameter::default(),
            parameter_segment_create: Parameter::default(),
            parameter_segment_remove: Parameter::default(),
            parameter_chunk_description: Parameter::default(),
            parameter_file_read: Parameter::default(),
            parameter_file_write: Parameter::default(),
        }
    }

    #[test]
    fn state_codec_round_trip() {
        let mut state = State::default();
        state.next_storage_id = storage::Id::new(2);
        state.storages.insert(storage::Id::new(0), storage(7000));
        state.storages.insert(storage::Id::new(1), storage(7002));
        state.collections.insert(
            collection::Id::new("alpha"),
            CollectionEntries {
                used: vec![UsedStorage {
                    segment_id: mcs_dtyp::SegmentId::new(0),
                    range: Range::at(Offset::ZERO, Size::new(128)),
                    storage_id: storage::Id::new(1),
                }],
            },
        );

        let bytes = save(&state).unwrap();
        assert_eq!(load::<State>(&bytes).unwrap(), state);
    }

    #[test]
    fn locations_cover_a_queried_subrange_exactly() {
        let mut state = State::default();
        state.storages.insert(storage::Id::new(0), storage(7000));
        state.storages.insert(storage::Id::new(1), storage(7002));
        state.collections.insert(
            collection::Id::new("c"),
            CollectionEntries {
                used: vec![
                    UsedStorage {
                        segment_id: mcs_dtyp::SegmentId::new(0),
                        range: Range::at(Offset::ZERO, Size::new(100)),
                        storage_id: storage::Id::new(0),
                    },
                    UsedStorage {
                        segment_id: mcs_dtyp::SegmentId::new(0),
                        range: Range::at(Offset::new(100), Size::new(200)),
                        storage_id: storage::Id::new(1),
                    },
                ],
            },
        );

        let locations = state
            .locations(
                &collection::Id::new("c"),
                Range::at(Offset::new(80), Size::new(60)),
            )
            .unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].range, Range::at(Offset::new(80), Size::new(20)));
        assert_eq!(locations[0].address.offset, Offset::new(80));
        assert_eq!(locations[1].range, Range::at(Offset::new(100), Size::new(40)));
        assert_eq!(locations[1].address.offset, Offset::ZERO);

        // the pieces cover the request exactly
        let covered: Size = locations.iter().map(|l| l.range.size()).sum();
        assert_eq!(covered, Size::new(60));

        assert!(matches!(
            state.locations(
                &collection::Id::new("c"),
                Range::at(Offset::new(200), Size::new(200)),
            ),
            Err(IovError::OutOfRange { .. })
        ));
    }

    #[test]
    fn the_range_of_an_empty_backend_is_unknown() {
        let state = State::default();
        assert!(matches!(
            state.range(&collection::Id::new("nope")),
            Err(IovError::UnknownCollection(_))
        ));
    }
}
