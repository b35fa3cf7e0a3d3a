//! Whole-block reads.

use mcs_core::transport;
use mcs_dtyp::{Connectable, Size};

use crate::block;
use crate::meta_data;
use crate::BlockDeviceError;

/// Reads blocks by routing them through the meta data and a transport
/// client built by the injected factory.
pub struct Reader<'a, F> {
    meta_data: &'a meta_data::Client,
    make_transport_client: F,
}

impl<'a, F, Fut> Reader<'a, F>
where
    F: Fn(Connectable) -> Fut,
    Fut: Future<Output = Result<transport::Client, mcs_rpc::RpcError>>,
{
    pub fn new(meta_data: &'a meta_data::Client, make_transport_client: F) -> Self {
        Reader {
            meta_data,
            make_transport_client,
        }
    }

    /// Reads the block into `destination`, which must hold exactly one
    /// block. The destination is overwritten completely.
    pub async fn read(
        &self,
        block_id: block::Id,
        destination: &mut [u8],
    ) -> Result<Size, BlockDeviceError> {
        let block_size = self.meta_data.block_size();
        if destination.len() as u64 != block_size.value() {
            return Err(BlockDeviceError::WrongBufferSize {
                expected: block_size,
                got: destination.len() as u64,
            });
        }
        let location = self.meta_data.location(block_id).await?;
        let client = (self.make_transport_client)(location.provider).await?;
        Ok(client.get(location.address, destination).await?)
    }
}
