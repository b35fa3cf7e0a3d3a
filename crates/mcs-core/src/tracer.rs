//! Storage event recording.
//!
//! A tracer attached to a registry observes every storage operation with
//! its outcome, either appended to a log file or collected in memory for
//! assertions and replay.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use mcs_dtyp::{Range, SegmentId, Size, StorageId};

use crate::chunk::AccessMode;
use crate::storage::ImplementationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    StorageCreate {
        implementation: ImplementationId,
        storage_id: StorageId,
    },
    StorageRemove {
        storage_id: StorageId,
    },
    SegmentCreate {
        storage_id: StorageId,
        size: Size,
        segment_id: Option<SegmentId>,
    },
    SegmentRemove {
        storage_id: StorageId,
        segment_id: SegmentId,
        freed: Option<Size>,
    },
    ChunkDescription {
        storage_id: StorageId,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
        ok: bool,
    },
    FileRead {
        storage_id: StorageId,
        segment_id: SegmentId,
        path: PathBuf,
        transferred: Option<Size>,
    },
    FileWrite {
        storage_id: StorageId,
        segment_id: SegmentId,
        path: PathBuf,
        transferred: Option<Size>,
    },
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::StorageCreate {
                implementation,
                storage_id,
            } => write!(f, "storage_create {implementation} -> {storage_id}"),
            Event::StorageRemove { storage_id } => write!(f, "storage_remove {storage_id}"),
            Event::SegmentCreate {
                storage_id,
                size,
                segment_id,
            } => match segment_id {
                Some(segment_id) => {
                    write!(f, "segment_create {storage_id} {size} -> {segment_id}")
                }
                None => write!(f, "segment_create {storage_id} {size} -> failed"),
            },
            Event::SegmentRemove {
                storage_id,
                segment_id,
                freed,
            } => match freed {
                Some(freed) => {
                    write!(f, "segment_remove {storage_id} {segment_id} -> {freed}")
                }
                None => write!(f, "segment_remove {storage_id} {segment_id} -> failed"),
            },
            Event::ChunkDescription {
                storage_id,
                segment_id,
                memory_range,
                access,
                ok,
            } => write!(
                f,
                "chunk_description {storage_id} {segment_id} {memory_range} {access:?} -> {}",
                if *ok { "ok" } else { "failed" }
            ),
            Event::FileRead {
                storage_id,
                segment_id,
                path,
                transferred,
            } => match transferred {
                Some(transferred) => write!(
                    f,
                    "file_read {storage_id} {segment_id} '{}' -> {transferred}",
                    path.display()
                ),
                None => write!(
                    f,
                    "file_read {storage_id} {segment_id} '{}' -> failed",
                    path.display()
                ),
            },
            Event::FileWrite {
                storage_id,
                segment_id,
                path,
                transferred,
            } => match transferred {
                Some(transferred) => write!(
                    f,
                    "file_write {storage_id} {segment_id} '{}' -> {transferred}",
                    path.display()
                ),
                None => write!(
                    f,
                    "file_write {storage_id} {segment_id} '{}' -> failed",
                    path.display()
                ),
            },
        }
    }
}

pub enum Tracer {
    /// One formatted record per line.
    LogFile(Mutex<std::fs::File>),
    /// Events collected in memory.
    Record(Mutex<Vec<Event>>),
}

impl Tracer {
    pub fn log_file(path: impl Into<PathBuf>) -> std::io::Result<Tracer> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.into())?;
        Ok(Tracer::LogFile(Mutex::new(file)))
    }

    pub fn record() -> Tracer {
        Tracer::Record(Mutex::new(Vec::new()))
    }

    pub fn trace(&self, event: Event) {
        match self {
            Tracer::LogFile(file) => {
                let mut file = file.lock().unwrap();
                if let Err(error) = writeln!(file, "{event}") {
                    log::warn!("could not write trace record: {error}");
                }
            }
            Tracer::Record(events) => events.lock().unwrap().push(event),
        }
    }

    /// The recorded events; empty for log-file tracers.
    pub fn events(&self) -> Vec<Event> {
        match self {
            Tracer::LogFile(_) => Vec::new(),
            Tracer::Record(events) => events.lock().unwrap().clone(),
        }
    }
}
