//! The share client.

use mcs_core::chunk::{self, Access, Chunk as CoreChunk};
use mcs_core::storage::Implementation;
use mcs_dtyp::{Connectable, Parameter, Size};
use mcs_rpc::{AccessPolicy, RpcError};

use crate::command;
use crate::{Chunk, Commands};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShareError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Codec(#[from] mcs_dtyp::CodecError),

    #[error("could not attach to the chunk")]
    Attach(#[from] chunk::ChunkError),
}

pub struct Client<AP: AccessPolicy> {
    inner: mcs_rpc::Client<AP>,
}

impl<AP: AccessPolicy> Client<AP> {
    pub async fn connect(connectable: &Connectable, policy: AP) -> Result<Self, RpcError> {
        Ok(Client {
            inner: mcs_rpc::Client::connect::<Commands>(connectable, policy).await?,
        })
    }

    /// Creates a chunk of `size` bytes in a fresh storage of
    /// implementation `I`.
    ///
    /// Fails when the requested size exceeds the max size given in the
    /// create parameter.
    pub async fn create<I: Implementation>(
        &self,
        size: Size,
        parameter_create: I::Create,
        parameter_segment_create: I::SegmentCreate,
    ) -> Result<Chunk, ShareError> {
        Ok(self
            .inner
            .call(command::Create {
                size,
                implementation_id: I::ID,
                parameter_create: Parameter::encode(&parameter_create)?,
                parameter_segment_create: Parameter::encode(&parameter_segment_create)?,
            })
            .await?)
    }

    /// Attaches to a chunk, resolving a local view over its memory.
    ///
    /// Multiple clients may attach to the same chunk; no attempt is made
    /// to synchronize their accesses.
    pub async fn attach<A: Access, I: Implementation>(
        &self,
        chunk: Chunk,
        parameter_chunk_description: I::ChunkDescription,
    ) -> Result<CoreChunk<A>, ShareError> {
        let description = self
            .inner
            .call(command::Attach {
                chunk,
                parameter_chunk_description: Parameter::encode(&parameter_chunk_description)?,
                access: A::MODE,
            })
            .await?;
        Ok(CoreChunk::<A>::resolve(description)?)
    }

    /// Removes a chunk and the storage that was created for it.
    pub async fn remove<I: Implementation>(
        &self,
        chunk: Chunk,
        parameter_segment_remove: I::SegmentRemove,
    ) -> Result<(), ShareError> {
        self.inner
            .call(command::Remove {
                chunk,
                parameter_segment_remove: Parameter::encode(&parameter_segment_remove)?,
            })
            .await?;
        Ok(())
    }
}
