//! The block meta-data service.

pub mod blocks;
pub mod client;
pub mod command;
pub mod handler;
pub mod provider;

pub use blocks::{AddResult, Blocks, BlocksError, Location, RemoveResult};
pub use client::Client;
pub use provider::Provider;

mcs_rpc::command_set! {
    /// The meta-data command list.
    pub struct Commands {
        command::BlockSize,
        command::NumberOfBlocks,
        command::BlockRanges,
        command::Add,
        command::Remove,
        command::LocationOf,
    }
}
