//! Byte transport between storage providers: `memory_get` and
//! `memory_put` move chunk contents over the socket, outside the
//! serialized envelope.

pub mod address;
pub mod client;
pub mod command;
pub mod handler;
pub mod provider;

pub use address::Address;
pub use client::{Client, TransportError};
pub use handler::TransportHandler;
pub use provider::Provider;

mcs_rpc::command_set! {
    /// The transport command list.
    pub struct Commands {
        command::Get,
        command::Put,
    }
}
