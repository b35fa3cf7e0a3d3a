//! Core of the memory-chunk service: the storages registry, the four
//! backing implementations, the chunk model, the storage-control service
//! and the byte transport between providers.

pub mod chunk;
pub mod control;
pub mod storage;
pub mod storages;
pub mod tracer;
pub mod transport;

pub use chunk::{AccessMode, Chunk, ChunkError, Const, Mutable};
pub use storage::{ImplementationId, StorageError};
pub use storages::{Storages, UniqueSegment, UniqueStorage};
pub use tracer::{Event, Tracer};
