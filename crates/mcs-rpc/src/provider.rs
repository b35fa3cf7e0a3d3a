//! RPC provider: accept loop, handshake and per-connection dispatch.

use binrw::prelude::*;

use tokio_util::sync::CancellationToken;

use mcs_dtyp::{Connectable, Endpoint, binrw_util, load, save};

use crate::access_policy::CallId;
use crate::command::{Command, Fingerprint, ResultOrError};
use crate::envelope;
use crate::error::{HandlerFailure, RpcError, error_chain};
use crate::socket::{self, Listener, ReadHalf, Stream, WriteHalf};

/// The handshake frame: the server's command list.
#[derive(BinRead, BinWrite, Debug, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct Fingerprints {
    #[bw(write_with = binrw_util::write_vec)]
    #[br(parse_with = binrw_util::parse_vec)]
    pub list: Vec<Fingerprint>,
}

/// One decoded request envelope.
pub struct Request {
    pub call_id: CallId,
    pub command_index: u64,
    pub body: Vec<u8>,
}

/// The connection a handler runs on.
///
/// A streaming handler consumes its payload from `reader` (or produces one
/// into `writer`) between the request envelope and the response envelope;
/// it has the socket to itself until it returns.
pub struct Connection<'a> {
    pub reader: &'a mut ReadHalf,
    pub writer: &'a mut WriteHalf,
}

/// Handles one command type.
pub trait Handler<C: Command>: Send + Sync {
    fn handle(
        &self,
        command: C,
        connection: &mut Connection<'_>,
    ) -> impl Future<Output = Result<C::Response, HandlerFailure>> + Send;
}

/// Routes decoded requests into a handler; implementations come out of
/// [`command_set!`](crate::command_set).
pub trait Dispatch: Clone + Send + Sync + 'static {
    fn fingerprints(&self) -> Vec<Fingerprint>;

    fn dispatch(
        &self,
        request: Request,
        connection: &mut Connection<'_>,
    ) -> impl Future<Output = Result<(), RpcError>> + Send;
}

/// Decodes, runs and answers a single request; the glue under the
/// dispatcher macro.
pub async fn run<C: Command, H: Handler<C>>(
    handler: &H,
    request: Request,
    connection: &mut Connection<'_>,
) -> Result<(), RpcError> {
    let command: C = load(&request.body)?;
    let reply = match handler.handle(command, connection).await {
        Ok(response) => ResultOrError::Result(response),
        Err(failure) => {
            let reason = error_chain(failure.as_ref());
            log::debug!("handler for '{}' failed: {reason}", C::TAG);
            ResultOrError::Error { reason }
        }
    };
    let body = save(&reply)?;
    envelope::write_response(connection.writer, request.call_id, &body).await?;
    Ok(())
}

/// A listening provider; serves until dropped.
pub struct Provider {
    endpoint: Endpoint,
    cancel: CancellationToken,
    accept_task: tokio::task::JoinHandle<()>,
}

impl Provider {
    pub async fn bind<D: Dispatch>(endpoint: &Endpoint, dispatch: D) -> Result<Provider, RpcError> {
        let listener = Listener::bind(endpoint).await?;
        let endpoint = listener.local_endpoint()?;
        let cancel = CancellationToken::new();
        log::info!("provider listening on {endpoint}");
        let accept_task = tokio::spawn(accept_loop(listener, dispatch, cancel.clone()));
        Ok(Provider {
            endpoint,
            cancel,
            accept_task,
        })
    }

    /// The bound endpoint, with the port the OS assigned.
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The address peers use to reach this provider.
    pub fn connectable(&self) -> Connectable {
        socket::published(&self.endpoint)
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.accept_task.abort();
    }
}

async fn accept_loop<D: Dispatch>(listener: Listener, dispatch: D, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(stream) => {
                    tokio::spawn(serve_connection(stream, dispatch.clone(), cancel.clone()));
                }
                Err(error) => {
                    log::warn!("accept failed: {error}");
                    break;
                }
            },
        }
    }
}

async fn serve_connection<D: Dispatch>(stream: Stream, dispatch: D, cancel: CancellationToken) {
    if let Err(error) = serve(stream, dispatch, cancel).await {
        log::debug!("connection closed: {}", error_chain(&error));
    }
}

async fn serve<D: Dispatch>(
    stream: Stream,
    dispatch: D,
    cancel: CancellationToken,
) -> Result<(), RpcError> {
    let (mut reader, mut writer) = stream.into_split();
    let handshake = save(&Fingerprints {
        list: dispatch.fingerprints(),
    })?;
    envelope::write_blob(&mut writer, &handshake).await?;

    loop {
        let request = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            request = envelope::read_request(&mut reader) => request,
        };
        let request = match request {
            Ok(request) => request,
            // The peer hanging up between requests is a normal close.
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(error) => return Err(error.into()),
        };
        let mut connection = Connection {
            reader: &mut reader,
            writer: &mut writer,
        };
        dispatch.dispatch(request, &mut connection).await?;
    }
}

/// Declares a command set: its fingerprint list, and a dispatch routine
/// requiring a [`Handler`] impl per command.
#[macro_export]
macro_rules! command_set {
    ($(#[$meta:meta])* $vis:vis struct $name:ident { $($command:ty),* $(,)? }) => {
        $(#[$meta])*
        $vis struct $name;

        impl $crate::CommandSet for $name {
            fn fingerprints() -> Vec<$crate::Fingerprint> {
                let mut fingerprints: Vec<$crate::Fingerprint> = Vec::new();
                $(
                    fingerprints.push($crate::Fingerprint {
                        index: fingerprints.len() as u64,
                        tag: <$command as $crate::Command>::TAG.to_string(),
                    });
                )*
                fingerprints
            }
        }

        impl $name {
            $vis async fn dispatch<H>(
                handler: &H,
                request: $crate::Request,
                connection: &mut $crate::Connection<'_>,
            ) -> Result<(), $crate::RpcError>
            where
                H: $($crate::Handler<$command> +)* Sync,
            {
                let _ = (&handler, &connection);
                let mut command_index: u64 = 0;
                $(
                    if request.command_index == command_index {
                        return $crate::provider::run::<$command, H>(
                            handler, request, connection,
                        )
                        .await;
                    }
                    command_index += 1;
                )*
                let _ = command_index;
                Err($crate::RpcError::UnknownCommandIndex(request.command_index))
            }
        }
    };
}
