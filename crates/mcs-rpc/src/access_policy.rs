//! Access policies gating concurrent use of a single socket.
//!
//! A policy owns the bookkeeping between a call's initiation and the
//! arrival of its response frame: [`AccessPolicy::start_call`] registers a
//! completion under a fresh call id, [`AccessPolicy::completion`] retires
//! it when the matching frame arrives, and [`AccessPolicy::error`] drains
//! every outstanding completion once and poisons the policy.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::error::RpcError;

/// Client-chosen correlation id, unique within the lifetime of its policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallId(u64);

impl CallId {
    pub const fn new(value: u64) -> Self {
        CallId(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Delivers a call's outcome to the future awaiting it.
///
/// Completing into a dropped future is a no-op; that is how a retired call
/// disappears silently.
pub struct Completion(oneshot::Sender<Result<Vec<u8>, RpcError>>);

impl Completion {
    pub fn new(sender: oneshot::Sender<Result<Vec<u8>, RpcError>>) -> Self {
        Completion(sender)
    }

    pub fn complete(self, frame: Vec<u8>) {
        let _ = self.0.send(Ok(frame));
    }

    pub fn fail(self, error: RpcError) {
        let _ = self.0.send(Err(error));
    }
}

/// Outcome of [`AccessPolicy::start_call`].
pub struct StartedCall {
    pub call_id: CallId,
    /// The caller must spawn the receive task for this policy.
    pub spawn_receiver: bool,
}

pub trait AccessPolicy: Send + Sync + 'static {
    /// Registers a completion and issues the call id.
    fn start_call(&self, completion: Completion) -> Result<StartedCall, RpcError>;

    /// Retires the completion for an inbound frame.
    ///
    /// `Ok(None)` means the call was already retired (its future was
    /// dropped) and the frame is to be discarded.
    fn completion(&self, call_id: CallId) -> Result<Option<Completion>, RpcError>;

    /// Drains all outstanding completions with `error`, once; the policy
    /// stays poisoned and every later call fails.
    fn error(&self, error: Arc<RpcError>);

    /// The envelope and any streamed payload reached the wire.
    fn sent(&self) {}

    fn has_outstanding(&self) -> bool;

    /// Called by the receive task when it considers stopping; returning
    /// `true` commits the stop (the policy forgets the task).
    fn receiver_done(&self, client_dropped: bool) -> bool;

    /// A lock serializing whole calls; `Some` forces one call at a time
    /// with the response received inline.
    fn call_lock(&self) -> Option<&tokio::sync::Mutex<()>> {
        None
    }
}

/// Marker for policies whose response is read inline by the caller, which
/// is what gives a streaming payload exclusive access to the socket.
pub trait InlineReceive: AccessPolicy {}

#[derive(Default)]
struct Book {
    next_call_id: u64,
    poisoned: Option<Arc<RpcError>>,
    receiver_running: bool,
}

impl Book {
    fn issue(&mut self) -> Result<CallId, RpcError> {
        if let Some(error) = &self.poisoned {
            return Err(RpcError::Poisoned(Arc::clone(error)));
        }
        let call_id = CallId(self.next_call_id);
        self.next_call_id += 1;
        Ok(call_id)
    }

    /// Whether a receive task has to be spawned for this call.
    fn claim_receiver(&mut self) -> bool {
        !std::mem::replace(&mut self.receiver_running, true)
    }
}

/// One call at a time; the caller blocks until the response returns.
#[derive(Default)]
pub struct Exclusive {
    lock: tokio::sync::Mutex<()>,
    state: Mutex<ExclusiveState>,
}

#[derive(Default)]
struct ExclusiveState {
    book: Book,
    pending: Option<(CallId, Completion)>,
}

impl AccessPolicy for Exclusive {
    fn start_call(&self, completion: Completion) -> Result<StartedCall, RpcError> {
        let mut state = self.state.lock().unwrap();
        let call_id = state.book.issue()?;
        debug_assert!(state.pending.is_none());
        state.pending = Some((call_id, completion));
        Ok(StartedCall {
            call_id,
            spawn_receiver: false,
        })
    }

    fn completion(&self, call_id: CallId) -> Result<Option<Completion>, RpcError> {
        let mut state = self.state.lock().unwrap();
        match state.pending.take() {
            Some((pending_id, completion)) if pending_id == call_id => Ok(Some(completion)),
            other => {
                state.pending = other;
                Err(RpcError::UnknownCallId(call_id))
            }
        }
    }

    fn error(&self, error: Arc<RpcError>) {
        let mut state = self.state.lock().unwrap();
        state.book.poisoned = Some(Arc::clone(&error));
        if let Some((_, completion)) = state.pending.take() {
            completion.fail(RpcError::Completion(error));
        }
    }

    fn has_outstanding(&self) -> bool {
        self.state.lock().unwrap().pending.is_some()
    }

    fn receiver_done(&self, _: bool) -> bool {
        true
    }

    fn call_lock(&self) -> Option<&tokio::sync::Mutex<()>> {
        Some(&self.lock)
    }
}

impl InlineReceive for Exclusive {}

/// Sends are FIFO; responses are delivered in send order by a single
/// receive task that lives while calls are outstanding.
#[derive(Default)]
pub struct Sequential {
    state: Mutex<SequentialState>,
}

#[derive(Default)]
struct SequentialState {
    book: Book,
    queue: VecDeque<(CallId, Completion)>,
}

impl AccessPolicy for Sequential {
    fn start_call(&self, completion: Completion) -> Result<StartedCall, RpcError> {
        let mut state = self.state.lock().unwrap();
        let call_id = state.book.issue()?;
        state.queue.push_back((call_id, completion));
        let spawn_receiver = state.book.claim_receiver();
        Ok(StartedCall {
            call_id,
            spawn_receiver,
        })
    }

    fn completion(&self, call_id: CallId) -> Result<Option<Completion>, RpcError> {
        let mut state = self.state.lock().unwrap();
        match state.queue.pop_front() {
            Some((front_id, completion)) if front_id == call_id => Ok(Some(completion)),
            Some(front) => {
                state.queue.push_front(front);
                Err(RpcError::UnknownCallId(call_id))
            }
            None => Err(RpcError::UnknownCallId(call_id)),
        }
    }

    fn error(&self, error: Arc<RpcError>) {
        let mut state = self.state.lock().unwrap();
        state.book.poisoned = Some(Arc::clone(&error));
        for (_, completion) in state.queue.drain(..) {
            completion.fail(RpcError::Completion(Arc::clone(&error)));
        }
    }

    fn has_outstanding(&self) -> bool {
        !self.state.lock().unwrap().queue.is_empty()
    }

    fn receiver_done(&self, _: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.queue.is_empty() {
            state.book.receiver_running = false;
            true
        } else {
            false
        }
    }
}

/// Arbitrary outstanding calls; responses are matched by call id and may be
/// delivered in any order.
#[derive(Default)]
pub struct Concurrent {
    state: Mutex<ConcurrentState>,
}

#[derive(Default)]
struct ConcurrentState {
    book: Book,
    completions: HashMap<u64, Completion>,
}

impl AccessPolicy for Concurrent {
    fn start_call(&self, completion: Completion) -> Result<StartedCall, RpcError> {
        let mut state = self.state.lock().unwrap();
        let call_id = state.book.issue()?;
        state.completions.insert(call_id.value(), completion);
        let spawn_receiver = state.book.claim_receiver();
        Ok(StartedCall {
            call_id,
            spawn_receiver,
        })
    }

    fn completion(&self, call_id: CallId) -> Result<Option<Completion>, RpcError> {
        let mut state = self.state.lock().unwrap();
        state
            .completions
            .remove(&call_id.value())
            .map(Some)
            .ok_or(RpcError::UnknownCallId(call_id))
    }

    fn error(&self, error: Arc<RpcError>) {
        let mut state = self.state.lock().unwrap();
        state.book.poisoned = Some(Arc::clone(&error));
        for (_, completion) in state.completions.drain() {
            completion.fail(RpcError::Completion(Arc::clone(&error)));
        }
    }

    fn has_outstanding(&self) -> bool {
        !self.state.lock().unwrap().completions.is_empty()
    }

    fn receiver_done(&self, client_dropped: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        if client_dropped && state.completions.is_empty() {
            state.book.receiver_running = false;
            true
        } else {
            false
        }
    }
}
