//! Remote storage management: the command set providers expose over their
//! shared [`Storages`](crate::storages::Storages) registry.

pub mod client;
pub mod command;
pub mod handler;
pub mod provider;

pub use client::Client;
pub use handler::ControlHandler;
pub use provider::Provider;

mcs_rpc::command_set! {
    /// The control command list; clients may speak any prefix.
    pub struct Commands {
        command::StorageCreate,
        command::StorageRemove,
        command::StorageSize,
        command::SegmentCreate,
        command::SegmentRemove,
        command::ChunkDescription,
        command::FileRead,
        command::FileWrite,
    }
}
