//! Whole-block writes.

use mcs_core::transport;
use mcs_dtyp::{Connectable, Size};

use crate::block;
use crate::meta_data;
use crate::BlockDeviceError;

/// Writes blocks by routing them through the meta data and a transport
/// client built by the injected factory.
pub struct Writer<'a, F> {
    meta_data: &'a meta_data::Client,
    make_transport_client: F,
}

impl<'a, F, Fut> Writer<'a, F>
where
    F: Fn(Connectable) -> Fut,
    Fut: Future<Output = Result<transport::Client, mcs_rpc::RpcError>>,
{
    pub fn new(meta_data: &'a meta_data::Client, make_transport_client: F) -> Self {
        Writer {
            meta_data,
            make_transport_client,
        }
    }

    /// Overwrites the block with `source`, which must hold exactly one
    /// block.
    pub async fn write(
        &self,
        block_id: block::Id,
        source: &[u8],
    ) -> Result<Size, BlockDeviceError> {
        let block_size = self.meta_data.block_size();
        if source.len() as u64 != block_size.value() {
            return Err(BlockDeviceError::WrongBufferSize {
                expected: block_size,
                got: source.len() as u64,
            });
        }
        let location = self.meta_data.location(block_id).await?;
        let client = (self.make_transport_client)(location.provider).await?;
        Ok(client.put(location.address, source).await?)
    }
}
