//! In-process provider and a small command family shared by the RPC tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use binrw::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use mcs_dtyp::Endpoint;
use mcs_rpc::provider::Dispatch;
use mcs_rpc::{
    Command, Connection, Fingerprint, Handler, Payload, Provider, Request, RpcError, command_set,
};

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Echo {
    pub value: u64,
}

impl Command for Echo {
    type Response = u64;
    const TAG: &'static str = "test.echo";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Sleep {
    pub mus: u64,
}

impl Command for Sleep {
    type Response = u64;
    const TAG: &'static str = "test.sleep";
}

#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct Fail;

impl Command for Fail {
    type Response = u64;
    const TAG: &'static str = "test.fail";
}

/// Payload bytes follow the envelope; the handler consumes them from the
/// socket and answers with their sum.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct PutBytes {
    pub size: u64,
}

impl Command for PutBytes {
    type Response = u64;
    const TAG: &'static str = "test.put_bytes";
}

/// The handler streams `size` counting bytes back before its response.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct GetBytes {
    pub size: u64,
}

impl Command for GetBytes {
    type Response = u64;
    const TAG: &'static str = "test.get_bytes";
}

#[derive(Default)]
pub struct TestHandler {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Handler<Echo> for TestHandler {
    async fn handle(
        &self,
        command: Echo,
        _: &mut Connection<'_>,
    ) -> Result<u64, mcs_rpc::HandlerFailure> {
        Ok(command.value)
    }
}

impl Handler<Sleep> for TestHandler {
    async fn handle(
        &self,
        command: Sleep,
        _: &mut Connection<'_>,
    ) -> Result<u64, mcs_rpc::HandlerFailure> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_micros(command.mus)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(command.mus)
    }
}

impl Handler<Fail> for TestHandler {
    async fn handle(
        &self,
        _: Fail,
        _: &mut Connection<'_>,
    ) -> Result<u64, mcs_rpc::HandlerFailure> {
        Err("the handler refuses".into())
    }
}

impl Handler<PutBytes> for TestHandler {
    async fn handle(
        &self,
        command: PutBytes,
        connection: &mut Connection<'_>,
    ) -> Result<u64, mcs_rpc::HandlerFailure> {
        let mut bytes = vec![0u8; command.size as usize];
        connection.reader.read_exact(&mut bytes).await?;
        Ok(bytes.iter().map(|b| *b as u64).sum())
    }
}

impl Handler<GetBytes> for TestHandler {
    async fn handle(
        &self,
        command: GetBytes,
        connection: &mut Connection<'_>,
    ) -> Result<u64, mcs_rpc::HandlerFailure> {
        let bytes: Vec<u8> = (0..command.size).map(|i| i as u8).collect();
        connection.writer.write_all(&bytes).await?;
        Ok(command.size)
    }
}

command_set! {
    pub struct AllCommands { Echo, Sleep, Fail, PutBytes, GetBytes }
}

#[derive(Clone)]
pub struct TestDispatch(pub Arc<TestHandler>);

impl Dispatch for TestDispatch {
    fn fingerprints(&self) -> Vec<Fingerprint> {
        <AllCommands as mcs_rpc::CommandSet>::fingerprints()
    }

    async fn dispatch(
        &self,
        request: Request,
        connection: &mut Connection<'_>,
    ) -> Result<(), RpcError> {
        AllCommands::dispatch(&*self.0, request, connection).await
    }
}

pub async fn start_provider() -> (Provider, Arc<TestHandler>) {
    let handler = Arc::new(TestHandler::default());
    let endpoint = Endpoint::Tcp("127.0.0.1:0".parse().unwrap());
    let provider = Provider::bind(&endpoint, TestDispatch(Arc::clone(&handler)))
        .await
        .unwrap();
    (provider, handler)
}

/// Sends a byte buffer as the out-of-envelope payload.
pub struct SendBytes(pub Vec<u8>);

impl Payload for SendBytes {
    async fn send<W: tokio::io::AsyncWrite + Unpin + Send>(
        &mut self,
        writer: &mut W,
    ) -> Result<(), RpcError> {
        writer.write_all(&self.0).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Fills the caller's buffer from the out-of-envelope payload.
pub struct ReceiveBytes<'a>(pub &'a mut [u8]);

impl Payload for ReceiveBytes<'_> {
    async fn receive<R: tokio::io::AsyncRead + Unpin + Send>(
        &mut self,
        reader: &mut R,
    ) -> Result<(), RpcError> {
        reader.read_exact(self.0).await?;
        Ok(())
    }
}
