//! Share commands.

use binrw::prelude::*;

use mcs_core::chunk::{self, AccessMode};
use mcs_core::storage::ImplementationId;
use mcs_dtyp::{Parameter, Size};
use mcs_rpc::{Command, Done};

use crate::Chunk;

/// Creates a chunk: a fresh storage with one segment of `size` bytes.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Create {
    pub size: Size,
    pub implementation_id: ImplementationId,
    pub parameter_create: Parameter,
    pub parameter_segment_create: Parameter,
}

impl Command for Create {
    type Response = Chunk;
    const TAG: &'static str = "share_service.create";
}

/// Resolves the description a peer needs to map the chunk locally.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Attach {
    pub chunk: Chunk,
    pub parameter_chunk_description: Parameter,
    pub access: AccessMode,
}

impl Command for Attach {
    type Response = chunk::Description;
    const TAG: &'static str = "share_service.attach";
}

/// Removes the chunk's segment and its storage.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Remove {
    pub chunk: Chunk,
    pub parameter_segment_remove: Parameter,
}

impl Command for Remove {
    type Response = Done;
    const TAG: &'static str = "share_service.remove";
}
