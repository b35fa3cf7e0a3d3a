//! Wire envelope framing.
//!
//! Every message is `<u64 size> <u64 call id> [<u64 command index>] <body>`;
//! the size prefix counts everything after itself. Streamed payloads follow
//! an envelope directly and are not accounted for here.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::access_policy::CallId;
use crate::provider::Request;

const HEADER: usize = size_of::<u64>();

pub async fn write_request<W: AsyncWrite + Unpin>(
    writer: &mut W,
    call_id: CallId,
    command_index: u64,
    body: &[u8],
) -> std::io::Result<()> {
    let size = (2 * HEADER + body.len()) as u64;
    writer.write_all(&size.to_le_bytes()).await?;
    writer.write_all(&call_id.value().to_le_bytes()).await?;
    writer.write_all(&command_index.to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

pub async fn read_request<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Request> {
    let size = read_u64(reader).await?;
    let call_id = CallId::new(read_u64(reader).await?);
    let command_index = read_u64(reader).await?;
    let body = read_body(reader, size, 2 * HEADER as u64).await?;
    Ok(Request {
        call_id,
        command_index,
        body,
    })
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    call_id: CallId,
    body: &[u8],
) -> std::io::Result<()> {
    let size = (HEADER + body.len()) as u64;
    writer.write_all(&size.to_le_bytes()).await?;
    writer.write_all(&call_id.value().to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

pub async fn read_response<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<(CallId, Vec<u8>)> {
    let size = read_u64(reader).await?;
    let call_id = CallId::new(read_u64(reader).await?);
    let body = read_body(reader, size, HEADER as u64).await?;
    Ok((call_id, body))
}

/// A bare size-prefixed blob; the handshake frame.
pub async fn write_blob<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> std::io::Result<()> {
    writer.write_all(&(body.len() as u64).to_le_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await
}

pub async fn read_blob<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let size = read_u64(reader).await?;
    read_body(reader, size, 0).await
}

async fn read_u64<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<u64> {
    let mut bytes = [0u8; 8];
    reader.read_exact(&mut bytes).await?;
    Ok(u64::from_le_bytes(bytes))
}

async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut R,
    size: u64,
    consumed: u64,
) -> std::io::Result<Vec<u8>> {
    let remaining = size.checked_sub(consumed).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("envelope size {size} is smaller than its header"),
        )
    })?;
    let mut body = vec![0u8; remaining as usize];
    reader.read_exact(&mut body).await?;
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trip() {
        let mut wire = Vec::new();
        write_request(&mut wire, CallId::new(9), 2, &[1, 2, 3])
            .await
            .unwrap();
        assert_eq!(&wire[..8], &19u64.to_le_bytes());
        let request = read_request(&mut wire.as_slice()).await.unwrap();
        assert_eq!(request.call_id, CallId::new(9));
        assert_eq!(request.command_index, 2);
        assert_eq!(request.body, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn response_round_trip() {
        let mut wire = Vec::new();
        write_response(&mut wire, CallId::new(4), &[7])
            .await
            .unwrap();
        let (call_id, body) = read_response(&mut wire.as_slice()).await.unwrap();
        assert_eq!(call_id, CallId::new(4));
        assert_eq!(body, vec![7]);
    }

    #[tokio::test]
    async fn undersized_envelopes_are_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&3u64.to_le_bytes());
        wire.extend_from_slice(&0u64.to_le_bytes());
        wire.extend_from_slice(&0u64.to_le_bytes());
        assert!(read_request(&mut wire.as_slice()).await.is_err());
    }
}
