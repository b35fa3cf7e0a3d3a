//! The storage registry.
//!
//! Maps storage ids to instances of the supported implementations under a
//! read/write lock discipline: readers run concurrently, writers are
//! exclusive, implementations themselves need not be thread safe.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mcs_dtyp::{MaxSize, Offset, Parameter, Range, SegmentId, Size, StorageId};

use crate::chunk::{self, AccessMode};
use crate::storage::files::Files;
use crate::storage::heap::Heap;
use crate::storage::shmem::Shmem;
use crate::storage::virt::Virtual;
use crate::storage::{Implementation, ImplementationId, StorageError};
use crate::tracer::{Event, Tracer};

/// A runtime instance of one of the supported implementations.
pub enum Backend {
    Heap(Heap),
    Shmem(Shmem),
    Files(Files),
    Virtual(Virtual),
}

impl Backend {
    fn implementation_id(&self) -> ImplementationId {
        match self {
            Backend::Heap(_) => ImplementationId::Heap,
            Backend::Shmem(_) => ImplementationId::Shmem,
            Backend::Files(_) => ImplementationId::Files,
            Backend::Virtual(_) => ImplementationId::Virtual,
        }
    }
}

/// Type-checked up- and downcasts between an implementation and the
/// registry's backend slot.
pub trait Registered: Implementation {
    fn into_backend(self) -> Backend;
    fn of_backend(backend: &Backend) -> Option<&Self>;
    fn of_backend_mut(backend: &mut Backend) -> Option<&mut Self>;
}

macro_rules! register {
    ($implementation:ty, $variant:ident) => {
        impl Registered for $implementation {
            fn into_backend(self) -> Backend {
                Backend::$variant(self)
            }

            fn of_backend(backend: &Backend) -> Option<&Self> {
                match backend {
                    Backend::$variant(storage) => Some(storage),
                    _ => None,
                }
            }

            fn of_backend_mut(backend: &mut Backend) -> Option<&mut Self> {
                match backend {
                    Backend::$variant(storage) => Some(storage),
                    _ => None,
                }
            }
        }
    };
}

register!(Heap, Heap);
register!(Shmem, Shmem);
register!(Files, Files);
register!(Virtual, Virtual);

/// Runs `body` with `I` bound to the implementation `id` names.
macro_rules! for_implementation {
    ($id:expr, $I:ident => $body:expr) => {
        match $id {
            ImplementationId::Heap => {
                type $I = crate::storage::heap::Heap;
                $body
            }
            ImplementationId::Shmem => {
                type $I = crate::storage::shmem::Shmem;
                $body
            }
            ImplementationId::Files => {
                type $I = crate::storage::files::Files;
                $body
            }
            ImplementationId::Virtual => {
                type $I = crate::storage::virt::Virtual;
                $body
            }
        }
    };
}

#[derive(Default)]
struct State {
    next_storage_id: StorageId,
    backends: HashMap<StorageId, Backend>,
}

impl State {
    fn backend(&self, storage_id: StorageId) -> Result<&Backend, StorageError> {
        self.backends
            .get(&storage_id)
            .ok_or(StorageError::UnknownId(storage_id))
    }

    fn backend_mut(&mut self, storage_id: StorageId) -> Result<&mut Backend, StorageError> {
        self.backends
            .get_mut(&storage_id)
            .ok_or(StorageError::UnknownId(storage_id))
    }

    fn storage<I: Registered>(&self, storage_id: StorageId) -> Result<&I, StorageError> {
        let backend = self.backend(storage_id)?;
        I::of_backend(backend).ok_or(StorageError::WrongImplementation {
            storage_id,
            expected: I::ID,
            actual: backend.implementation_id(),
        })
    }

    fn storage_mut<I: Registered>(&mut self, storage_id: StorageId) -> Result<&mut I, StorageError> {
        let backend = self.backend_mut(storage_id)?;
        let actual = backend.implementation_id();
        I::of_backend_mut(backend).ok_or(StorageError::WrongImplementation {
            storage_id,
            expected: I::ID,
            actual,
        })
    }
}

/// The registry. Shared freely; all operations lock internally.
#[derive(Default)]
pub struct Storages {
    state: RwLock<State>,
    tracer: Option<Arc<Tracer>>,
}

impl Storages {
    pub fn new() -> Storages {
        Storages::default()
    }

    pub fn with_tracer(tracer: Arc<Tracer>) -> Storages {
        Storages {
            state: RwLock::default(),
            tracer: Some(tracer),
        }
    }

    fn trace(&self, event: impl FnOnce() -> Event) {
        if let Some(tracer) = &self.tracer {
            tracer.trace(event());
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Constructs a new storage and issues its id.
    pub fn create<I: Registered>(&self, parameter: I::Create) -> Result<StorageId, StorageError> {
        let storage = I::create(parameter)?;
        let mut state = self.write();
        let storage_id = state.next_storage_id.issue();
        let previous = state.backends.insert(storage_id, storage.into_backend());
        assert!(previous.is_none(), "duplicate storage id {storage_id}");
        self.trace(|| Event::StorageCreate {
            implementation: I::ID,
            storage_id,
        });
        Ok(storage_id)
    }

    pub fn remove(&self, storage_id: StorageId) -> Result<(), StorageError> {
        let mut state = self.write();
        state
            .backends
            .remove(&storage_id)
            .ok_or(StorageError::UnknownId(storage_id))?;
        self.trace(|| Event::StorageRemove { storage_id });
        Ok(())
    }

    pub fn size_max<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: &I::SizeMax,
    ) -> Result<MaxSize, StorageError> {
        Ok(self.read().storage::<I>(storage_id)?.size_max(parameter))
    }

    pub fn size_used<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: &I::SizeUsed,
    ) -> Result<Size, StorageError> {
        Ok(self.read().storage::<I>(storage_id)?.size_used(parameter))
    }

    pub fn segment_create<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: I::SegmentCreate,
        size: Size,
    ) -> Result<SegmentId, StorageError> {
        let mut state = self.write();
        let result = state
            .storage_mut::<I>(storage_id)
            .and_then(|storage| storage.segment_create(parameter, size));
        self.trace(|| Event::SegmentCreate {
            storage_id,
            size,
            segment_id: result.as_ref().ok().copied(),
        });
        result
    }

    pub fn segment_remove<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: I::SegmentRemove,
        segment_id: SegmentId,
    ) -> Result<Size, StorageError> {
        let mut state = self.write();
        let result = state
            .storage_mut::<I>(storage_id)
            .and_then(|storage| storage.segment_remove(parameter, segment_id));
        self.trace(|| Event::SegmentRemove {
            storage_id,
            segment_id,
            freed: result.as_ref().ok().copied(),
        });
        result
    }

    pub fn chunk_description<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: I::ChunkDescription,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, StorageError> {
        let state = self.read();
        let result = state
            .storage::<I>(storage_id)
            .and_then(|storage| {
                storage.chunk_description(parameter, segment_id, memory_range, access)
            });
        self.trace(|| Event::ChunkDescription {
            storage_id,
            segment_id,
            memory_range,
            access,
            ok: result.is_ok(),
        });
        result
    }

    pub fn file_read<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: I::FileRead,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let state = self.read();
        let result = state.storage::<I>(storage_id).and_then(|storage| {
            storage.file_read(parameter, segment_id, offset, path.clone(), range)
        });
        self.trace(|| Event::FileRead {
            storage_id,
            segment_id,
            path,
            transferred: result.as_ref().ok().copied(),
        });
        result
    }

    pub fn file_write<I: Registered>(
        &self,
        storage_id: StorageId,
        parameter: I::FileWrite,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let state = self.read();
        let result = state.storage::<I>(storage_id).and_then(|storage| {
            storage.file_write(parameter, segment_id, offset, path.clone(), range)
        });
        self.trace(|| Event::FileWrite {
            storage_id,
            segment_id,
            path,
            transferred: result.as_ref().ok().copied(),
        });
        result
    }
}

/// Operations with the implementation chosen at runtime and parameters as
/// erased blobs; what the control service dispatches into.
impl Storages {
    pub fn create_erased(
        &self,
        implementation: ImplementationId,
        parameter: &Parameter,
    ) -> Result<StorageId, StorageError> {
        for_implementation!(implementation, I => {
            self.create::<I>(parameter.decode::<<I as Implementation>::Create>()?)
        })
    }

    pub fn size_erased(
        &self,
        storage_id: StorageId,
        parameter_max: &Parameter,
        parameter_used: &Parameter,
    ) -> Result<(MaxSize, Size), StorageError> {
        let implementation = self.implementation_of(storage_id)?;
        for_implementation!(implementation, I => {
            Ok((
                self.size_max::<I>(
                    storage_id,
                    &parameter_max.decode::<<I as Implementation>::SizeMax>()?,
                )?,
                self.size_used::<I>(
                    storage_id,
                    &parameter_used.decode::<<I as Implementation>::SizeUsed>()?,
                )?,
            ))
        })
    }

    pub fn segment_create_erased(
        &self,
        storage_id: StorageId,
        parameter: &Parameter,
        size: Size,
    ) -> Result<SegmentId, StorageError> {
        let implementation = self.implementation_of(storage_id)?;
        for_implementation!(implementation, I => {
            self.segment_create::<I>(
                storage_id,
                parameter.decode::<<I as Implementation>::SegmentCreate>()?,
                size,
            )
        })
    }

    pub fn segment_remove_erased(
        &self,
        storage_id: StorageId,
        parameter: &Parameter,
        segment_id: SegmentId,
    ) -> Result<Size, StorageError> {
        let implementation = self.implementation_of(storage_id)?;
        for_implementation!(implementation, I => {
            self.segment_remove::<I>(
                storage_id,
                parameter.decode::<<I as Implementation>::SegmentRemove>()?,
                segment_id,
            )
        })
    }

    pub fn chunk_description_erased(
        &self,
        storage_id: StorageId,
        parameter: &Parameter,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, StorageError> {
        let implementation = self.implementation_of(storage_id)?;
        for_implementation!(implementation, I => {
            self.chunk_description::<I>(
                storage_id,
                parameter.decode::<<I as Implementation>::ChunkDescription>()?,
                segment_id,
                memory_range,
                access,
            )
        })
    }

    pub fn file_read_erased(
        &self,
        storage_id: StorageId,
        parameter: &Parameter,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let implementation = self.implementation_of(storage_id)?;
        for_implementation!(implementation, I => {
            self.file_read::<I>(
                storage_id,
                parameter.decode::<<I as Implementation>::FileRead>()?,
                segment_id,
                offset,
                path,
                range,
            )
        })
    }

    pub fn file_write_erased(
        &self,
        storage_id: StorageId,
        parameter: &Parameter,
        segment_id: SegmentId,
        offset: Offset,
        path: PathBuf,
        range: Range,
    ) -> Result<Size, StorageError> {
        let implementation = self.implementation_of(storage_id)?;
        for_implementation!(implementation, I => {
            self.file_write::<I>(
                storage_id,
                parameter.decode::<<I as Implementation>::FileWrite>()?,
                segment_id,
                offset,
                path,
                range,
            )
        })
    }

    fn implementation_of(&self, storage_id: StorageId) -> Result<ImplementationId, StorageError> {
        Ok(self.read().backend(storage_id)?.implementation_id())
    }
}

/// Removes its storage on drop.
pub struct UniqueStorage<'a> {
    storages: &'a Storages,
    storage_id: StorageId,
}

impl<'a> UniqueStorage<'a> {
    pub fn create<I: Registered>(
        storages: &'a Storages,
        parameter: I::Create,
    ) -> Result<UniqueStorage<'a>, StorageError> {
        Ok(UniqueStorage {
            storages,
            storage_id: storages.create::<I>(parameter)?,
        })
    }

    pub fn id(&self) -> StorageId {
        self.storage_id
    }
}

impl Drop for UniqueStorage<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.storages.remove(self.storage_id) {
            log::warn!("could not remove storage {}: {error}", self.storage_id);
        }
    }
}

/// Removes its segment on drop.
pub struct UniqueSegment<'a, I: Registered> {
    storages: &'a Storages,
    storage_id: StorageId,
    segment_id: SegmentId,
    parameter_remove: Option<I::SegmentRemove>,
}

impl<'a, I: Registered> UniqueSegment<'a, I> {
    pub fn create(
        storages: &'a Storages,
        storage_id: StorageId,
        parameter_create: I::SegmentCreate,
        parameter_remove: I::SegmentRemove,
        size: Size,
    ) -> Result<UniqueSegment<'a, I>, StorageError> {
        let segment_id = storages.segment_create::<I>(storage_id, parameter_create, size)?;
        Ok(UniqueSegment {
            storages,
            storage_id,
            segment_id,
            parameter_remove: Some(parameter_remove),
        })
    }

    pub fn id(&self) -> SegmentId {
        self.segment_id
    }
}

impl<I: Registered> Drop for UniqueSegment<'_, I> {
    fn drop(&mut self) {
        let parameter = self.parameter_remove.take().expect("dropped once");
        if let Err(error) =
            self.storages
                .segment_remove::<I>(self.storage_id, parameter, self.segment_id)
        {
            log::warn!(
                "could not remove segment {} of {}: {error}",
                self.segment_id,
                self.storage_id
            );
        }
    }
}
