//! The control client.

use mcs_dtyp::{Connectable, MaxSize, Offset, Parameter, Range, SegmentId, Size, StorageId};
use mcs_rpc::{AccessPolicy, RpcError};

use crate::chunk::{self, AccessMode};
use crate::control::{Commands, command};
use crate::storage::{Implementation, ImplementationId};

/// A client of a control provider.
pub struct Client<AP: AccessPolicy> {
    inner: mcs_rpc::Client<AP>,
}

impl<AP: AccessPolicy> Client<AP> {
    pub async fn connect(connectable: &Connectable, policy: AP) -> Result<Self, RpcError> {
        Ok(Client {
            inner: mcs_rpc::Client::connect::<Commands>(connectable, policy).await?,
        })
    }

    /// The underlying RPC client, for callers that need to dispatch
    /// commands generically (e.g. `multi_client::call`).
    pub fn inner(&self) -> &mcs_rpc::Client<AP> {
        &self.inner
    }

    /// Creates a storage of implementation `I` on the provider.
    pub async fn storage_create<I: Implementation>(
        &self,
        parameter: I::Create,
    ) -> Result<StorageId, RpcError> {
        self.storage_create_erased(I::ID, Parameter::encode(&parameter)?)
            .await
    }

    pub async fn storage_create_erased(
        &self,
        implementation_id: ImplementationId,
        parameter_create: Parameter,
    ) -> Result<StorageId, RpcError> {
        self.inner
            .call(command::StorageCreate {
                implementation_id,
                parameter_create,
            })
            .await
    }

    pub async fn storage_remove(&self, storage_id: StorageId) -> Result<(), RpcError> {
        self.inner.call(command::StorageRemove { storage_id }).await?;
        Ok(())
    }

    pub async fn storage_size(
        &self,
        storage_id: StorageId,
        parameter_size_max: Parameter,
        parameter_size_used: Parameter,
    ) -> Result<(MaxSize, Size), RpcError> {
        let response = self
            .inner
            .call(command::StorageSize {
                storage_id,
                parameter_size_max,
                parameter_size_used,
            })
            .await?;
        Ok((response.max, response.used))
    }

    pub async fn segment_create(
        &self,
        storage_id: StorageId,
        parameter: Parameter,
        size: Size,
    ) -> Result<SegmentId, RpcError> {
        self.inner
            .call(command::SegmentCreate {
                storage_id,
                parameter,
                size,
            })
            .await
    }

    /// Returns the bytes actually freed.
    pub async fn segment_remove(
        &self,
        storage_id: StorageId,
        parameter: Parameter,
        segment_id: SegmentId,
    ) -> Result<Size, RpcError> {
        self.inner
            .call(command::SegmentRemove {
                storage_id,
                parameter,
                segment_id,
            })
            .await
    }

    pub async fn chunk_description(
        &self,
        storage_id: StorageId,
        parameter: Parameter,
        segment_id: SegmentId,
        memory_range: Range,
        access: AccessMode,
    ) -> Result<chunk::Description, RpcError> {
        self.inner
            .call(command::ChunkDescription {
                storage_id,
                parameter,
                segment_id,
                memory_range,
                access,
            })
            .await
    }

    pub async fn file_read(
        &self,
        storage_id: StorageId,
        parameter: Parameter,
        segment_id: SegmentId,
        offset: Offset,
        path: std::path::PathBuf,
        range: Range,
    ) -> Result<Size, RpcError> {
        self.inner
            .call(command::FileRead {
                storage_id,
                parameter,
                segment_id,
                offset,
                path,
                range,
            })
            .await
    }

    pub async fn file_write(
        &self,
        storage_id: StorageId,
        parameter: Parameter,
        segment_id: SegmentId,
        offset: Offset,
        path: std::path::PathBuf,
        range: Range,
    ) -> Result<Size, RpcError> {
        self.inner
            .call(command::FileWrite {
                storage_id,
                parameter,
                segment_id,
                offset,
                path,
                range,
            })
            .await
    }
}
