//! Transport commands.
//!
//! Neither envelope accounts for the payload bytes: `Get` streams them
//! provider-to-caller before its response, `Put` caller-to-provider after
//! its request. The size field is what tells both ends when to stop.

use binrw::prelude::*;

use mcs_dtyp::Size;
use mcs_rpc::Command;

use crate::transport::Address;

/// Reads `size` bytes at `source` on the provider; the bytes are streamed
/// back into the caller's destination buffer.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Get {
    pub source: Address,
    pub size: Size,
}

impl Command for Get {
    /// The bytes streamed.
    type Response = Size;
    const TAG: &'static str = "transport.memory_get";
}

/// Writes `size` bytes, streamed by the caller after the envelope, at
/// `destination` on the provider.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Put {
    pub destination: Address,
    pub size: Size,
}

impl Command for Put {
    /// The bytes consumed.
    type Response = Size;
    const TAG: &'static str = "transport.memory_put";
}
