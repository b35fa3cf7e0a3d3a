//! RPC client.
//!
//! A client owns the sending side of a socket; the receiving side belongs
//! to whatever receive path the access policy prescribes. Dropping the
//! client does not cancel in-flight operations: the receive task keeps the
//! socket alive until every outstanding completion has been delivered.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, Notify, oneshot};

use mcs_dtyp::{Connectable, load, save};

use crate::access_policy::{AccessPolicy, Completion, InlineReceive};
use crate::command::{Command, CommandSet, Fingerprint, ResultOrError, is_prefix};
use crate::envelope;
use crate::error::RpcError;
use crate::provider::Fingerprints;
use crate::socket::{ReadHalf, Stream, WriteHalf};

/// Payload bytes travelling outside the serialized envelope.
///
/// [`Payload::send`] runs on the caller after the request envelope was
/// written; [`Payload::receive`] runs before the response envelope is read.
/// Only a client whose policy receives inline can use a receiving payload.
pub trait Payload: Send {
    fn send<W: AsyncWrite + Unpin + Send>(
        &mut self,
        writer: &mut W,
    ) -> impl Future<Output = Result<(), RpcError>> + Send {
        let _ = writer;
        async { Ok(()) }
    }

    fn receive<R: AsyncRead + Unpin + Send>(
        &mut self,
        reader: &mut R,
    ) -> impl Future<Output = Result<(), RpcError>> + Send {
        let _ = reader;
        async { Ok(()) }
    }
}

/// The payload of an ordinary, fully enveloped command.
pub struct NoPayload;

impl Payload for NoPayload {}

pub struct Client<AP: AccessPolicy> {
    shared: Arc<Shared<AP>>,
}

impl<AP: AccessPolicy> Clone for Client<AP> {
    fn clone(&self) -> Self {
        Client {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<AP: AccessPolicy> std::fmt::Debug for Client<AP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

struct Shared<AP> {
    policy: AP,
    writer: Mutex<WriteHalf>,
    reader: Mutex<ReadHalf>,
    fingerprints: Vec<Fingerprint>,
    closed: AtomicBool,
    closed_notify: Notify,
}

impl<AP: AccessPolicy> Client<AP> {
    /// Connects and performs the handshake for the command set `CS`.
    pub async fn connect<CS: CommandSet>(
        connectable: &Connectable,
        policy: AP,
    ) -> Result<Self, RpcError> {
        let stream = Stream::connect(connectable).await?;
        Self::from_stream::<CS>(stream, policy).await
    }

    /// Performs the handshake on an already connected stream.
    ///
    /// The client's command set must be a prefix of the server's.
    pub async fn from_stream<CS: CommandSet>(
        stream: Stream,
        policy: AP,
    ) -> Result<Self, RpcError> {
        let (mut reader, writer) = stream.into_split();
        let server = load::<Fingerprints>(&envelope::read_blob(&mut reader).await?)?.list;
        let client = CS::fingerprints();
        if !is_prefix(&client, &server) {
            return Err(RpcError::HandshakeFailed { client, server });
        }
        log::debug!("handshake ok: {} of {} commands", client.len(), server.len());
        Ok(Client {
            shared: Arc::new(Shared {
                policy,
                writer: Mutex::new(writer),
                reader: Mutex::new(reader),
                fingerprints: client,
                closed: AtomicBool::new(false),
                closed_notify: Notify::new(),
            }),
        })
    }

    /// Issues `command` and awaits its response.
    pub async fn call<C: Command>(&self, command: C) -> Result<C::Response, RpcError> {
        self.call_with_payload(command, &mut NoPayload).await
    }

    async fn call_with_payload<C: Command>(
        &self,
        command: C,
        payload: &mut impl Payload,
    ) -> Result<C::Response, RpcError> {
        let command_index = self.command_index::<C>()?;
        let _call_guard = match self.shared.policy.call_lock() {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let body = save(&command)?;
        let (tx, rx) = oneshot::channel();

        // Registration and send happen under one lock so that queue order
        // is send order; Sequential depends on that to match responses.
        let started = {
            let mut writer = self.shared.writer.lock().await;
            let started = self.shared.policy.start_call(Completion::new(tx))?;
            let written: Result<(), RpcError> = async {
                envelope::write_request(&mut *writer, started.call_id, command_index, &body)
                    .await?;
                payload.send(&mut *writer).await
            }
            .await;
            if let Err(error) = written {
                return Err(self.fail(error));
            }
            self.shared.policy.sent();
            started
        };

        if started.spawn_receiver {
            spawn_receiver(Arc::clone(&self.shared));
        }
        if self.shared.policy.call_lock().is_some() {
            self.receive_inline(payload).await?;
        }

        let frame = rx
            .await
            .map_err(|_| RpcError::Dropped)??;
        load::<ResultOrError<C::Response>>(&frame)?.into_result()
    }

    /// Receives the single in-flight response on the caller, running the
    /// payload's receiving side first.
    async fn receive_inline(&self, payload: &mut impl Payload) -> Result<(), RpcError> {
        let mut reader = self.shared.reader.lock().await;
        let received: Result<(), RpcError> = async {
            payload.receive(&mut *reader).await?;
            let (call_id, frame) = envelope::read_response(&mut *reader).await?;
            match self.shared.policy.completion(call_id)? {
                Some(completion) => completion.complete(frame),
                None => {}
            }
            Ok(())
        }
        .await;
        received.map_err(|error| self.fail(error))
    }

    fn command_index<C: Command>(&self) -> Result<u64, RpcError> {
        self.shared
            .fingerprints
            .iter()
            .find(|fingerprint| fingerprint.tag == C::TAG)
            .map(|fingerprint| fingerprint.index)
            .ok_or(RpcError::UnknownCommand(C::TAG))
    }

    /// Poisons the policy with `error` and returns the shared form.
    fn fail(&self, error: RpcError) -> RpcError {
        let shared = error.shared();
        self.shared.policy.error(Arc::clone(&shared));
        RpcError::Completion(shared)
    }
}

impl<AP: InlineReceive> Client<AP> {
    /// Issues a command whose payload travels outside the envelope.
    ///
    /// Inline reception gives the payload exclusive access to the socket
    /// between the request envelope and the response envelope.
    pub async fn call_streaming<C: Command>(
        &self,
        command: C,
        payload: &mut impl Payload,
    ) -> Result<C::Response, RpcError> {
        self.call_with_payload(command, payload).await
    }
}

impl<AP: AccessPolicy> Drop for Client<AP> {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.closed_notify.notify_one();
    }
}

fn spawn_receiver<AP: AccessPolicy>(shared: Arc<Shared<AP>>) {
    tokio::spawn(async move {
        let mut reader = shared.reader.lock().await;
        loop {
            if shared.policy.has_outstanding() {
                match envelope::read_response(&mut *reader).await {
                    Ok((call_id, frame)) => {
                        match shared.policy.completion(call_id) {
                            Ok(Some(completion)) => completion.complete(frame),
                            Ok(None) => {}
                            Err(error) => {
                                shared.policy.error(error.shared());
                                break;
                            }
                        }
                        if shared
                            .policy
                            .receiver_done(shared.closed.load(Ordering::Acquire))
                        {
                            break;
                        }
                    }
                    Err(error) => {
                        shared.policy.error(RpcError::from(error).shared());
                        break;
                    }
                }
            } else {
                // Idle: nothing on the wire is legitimate until the next
                // call registers, so waking up mid-read cannot lose a frame.
                if shared.closed.load(Ordering::Acquire)
                    && shared.policy.receiver_done(true)
                {
                    break;
                }
                tokio::select! {
                    biased;
                    result = envelope::read_response(&mut *reader) => match result {
                        Ok((call_id, frame)) => match shared.policy.completion(call_id) {
                            Ok(Some(completion)) => completion.complete(frame),
                            Ok(None) => {}
                            Err(error) => {
                                shared.policy.error(error.shared());
                                break;
                            }
                        },
                        Err(error) => {
                            shared.policy.error(RpcError::from(error).shared());
                            break;
                        }
                    },
                    _ = shared.closed_notify.notified() => {}
                }
            }
        }
        log::trace!("receive task finished");
    });
}
