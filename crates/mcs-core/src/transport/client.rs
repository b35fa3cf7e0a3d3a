//! The transport client.
//!
//! Streaming needs the socket to itself between the envelopes, so the
//! client is fixed to the exclusive access policy.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use mcs_dtyp::{Connectable, Size};
use mcs_rpc::client::Payload;
use mcs_rpc::{Exclusive, RpcError};

use crate::transport::command::{Get, Put};
use crate::transport::{Address, Commands};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not read all data: wanted {wanted}, read {read}")]
    CouldNotReadAllData { wanted: Size, read: Size },

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

struct ReceiveInto<'a> {
    buffer: &'a mut [u8],
    received: usize,
}

impl Payload for ReceiveInto<'_> {
    async fn receive<R: AsyncRead + Unpin + Send>(
        &mut self,
        reader: &mut R,
    ) -> Result<(), RpcError> {
        while self.received < self.buffer.len() {
            let n = reader.read(&mut self.buffer[self.received..]).await?;
            if n == 0 {
                return Err(RpcError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            self.received += n;
        }
        Ok(())
    }
}

struct SendSlice<'a>(&'a [u8]);

impl Payload for SendSlice<'_> {
    async fn send<W: AsyncWrite + Unpin + Send>(
        &mut self,
        writer: &mut W,
    ) -> Result<(), RpcError> {
        writer.write_all(self.0).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// A client of a transport provider.
pub struct Client {
    inner: mcs_rpc::Client<Exclusive>,
}

impl Client {
    pub async fn connect(connectable: &Connectable) -> Result<Client, RpcError> {
        Ok(Client {
            inner: mcs_rpc::Client::connect::<Commands>(connectable, Exclusive::default()).await?,
        })
    }

    /// Reads `destination.len()` bytes at `source` into `destination`.
    pub async fn get(
        &self,
        source: Address,
        destination: &mut [u8],
    ) -> Result<Size, TransportError> {
        let wanted = Size::new(destination.len() as u64);
        let mut receive = ReceiveInto {
            buffer: destination,
            received: 0,
        };
        let result = self
            .inner
            .call_streaming(
                Get {
                    source,
                    size: wanted,
                },
                &mut receive,
            )
            .await;
        match result {
            Ok(size) => Ok(size),
            Err(error) => {
                let read = Size::new(receive.received as u64);
                if read < wanted {
                    Err(TransportError::CouldNotReadAllData { wanted, read })
                } else {
                    Err(error.into())
                }
            }
        }
    }

    /// Writes `bytes` at `destination`.
    pub async fn put(&self, destination: Address, bytes: &[u8]) -> Result<Size, TransportError> {
        let size = Size::new(bytes.len() as u64);
        Ok(self
            .inner
            .call_streaming(
                Put {
                    destination,
                    size,
                },
                &mut SendSlice(bytes),
            )
            .await?)
    }
}
