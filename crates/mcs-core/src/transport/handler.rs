//! Transport command handlers.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use mcs_dtyp::{Range, Size};
use mcs_rpc::{Connection, Handler, HandlerFailure};

use crate::chunk::{AccessMode, Chunk, Const, Mutable};
use crate::storages::Storages;
use crate::transport::command::{Get, Put};

/// Serves `Get`/`Put` against one registry.
#[derive(Clone)]
pub struct TransportHandler {
    storages: Arc<Storages>,
}

impl TransportHandler {
    pub fn new(storages: Arc<Storages>) -> TransportHandler {
        TransportHandler { storages }
    }
}

impl Handler<Get> for TransportHandler {
    async fn handle(
        &self,
        command: Get,
        connection: &mut Connection<'_>,
    ) -> Result<Size, HandlerFailure> {
        let range = Range::at(command.source.offset, command.size);
        let resolved = self
            .storages
            .chunk_description_erased(
                command.source.storage_id,
                &command.source.chunk_description_parameter,
                command.source.segment_id,
                range,
                AccessMode::Const,
            )
            .map_err(HandlerFailure::from)
            .and_then(|description| Ok(Chunk::<Const>::resolve(description)?));

        // Exactly `size` payload bytes go out either way; on failure they
        // are zeros and the error envelope follows them. That keeps the
        // caller's stream aligned.
        match resolved {
            Ok(chunk) => {
                connection.writer.write_all(chunk.bytes()).await?;
                connection.writer.flush().await?;
                Ok(command.size)
            }
            Err(failure) => {
                let zeros = vec![0u8; 4096];
                let mut remaining = command.size.as_usize();
                while remaining > 0 {
                    let n = remaining.min(zeros.len());
                    connection.writer.write_all(&zeros[..n]).await?;
                    remaining -= n;
                }
                connection.writer.flush().await?;
                Err(failure)
            }
        }
    }
}

impl Handler<Put> for TransportHandler {
    async fn handle(
        &self,
        command: Put,
        connection: &mut Connection<'_>,
    ) -> Result<Size, HandlerFailure> {
        let range = Range::at(command.destination.offset, command.size);
        let resolved = self
            .storages
            .chunk_description_erased(
                command.destination.storage_id,
                &command.destination.chunk_description_parameter,
                command.destination.segment_id,
                range,
                AccessMode::Mutable,
            )
            .map_err(HandlerFailure::from)
            .and_then(|description| Ok(Chunk::<Mutable>::resolve(description)?));

        // The payload is on the wire regardless; consume exactly `size`
        // bytes even when the target cannot be resolved.
        match resolved {
            Ok(mut chunk) => {
                connection.reader.read_exact(chunk.bytes_mut()).await?;
                Ok(command.size)
            }
            Err(failure) => {
                let mut sink = vec![0u8; command.size.as_usize()];
                connection.reader.read_exact(&mut sink).await?;
                Err(failure)
            }
        }
    }
}
