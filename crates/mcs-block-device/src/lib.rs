//! Block-device facade: a meta-data service mapping block ids to storage
//! locations, and readers/writers moving whole blocks over the transport.

pub mod block;
pub mod meta_data;
pub mod reader;
pub mod storage;
pub mod writer;

pub use reader::Reader;
pub use storage::Storage;
pub use writer::Writer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlockDeviceError {
    #[error(transparent)]
    Rpc(#[from] mcs_rpc::RpcError),

    #[error(transparent)]
    Transport(#[from] mcs_core::transport::TransportError),

    #[error("buffer of {got} bytes does not hold a {expected}-byte block")]
    WrongBufferSize { expected: block::Size, got: u64 },
}
