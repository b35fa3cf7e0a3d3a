//! RPC error taxonomy.

use std::sync::Arc;

use thiserror::Error;

use crate::access_policy::CallId;
use crate::command::Fingerprint;

/// Failure of a handler; stringified into the wire `Error { reason }` form
/// before it travels back to the caller.
pub type HandlerFailure = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("transport I/O failed")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] mcs_dtyp::CodecError),

    #[error(
        "handshake failed: client commands {client:?} are not a prefix of server commands {server:?}"
    )]
    HandshakeFailed {
        client: Vec<Fingerprint>,
        server: Vec<Fingerprint>,
    },

    #[error("remote handler failed: {reason}")]
    Handler { reason: String },

    #[error("transport broke during an in-flight call")]
    Completion(#[source] Arc<RpcError>),

    #[error("access policy is poisoned")]
    Poisoned(#[source] Arc<RpcError>),

    #[error("unknown call id {0}")]
    UnknownCallId(CallId),

    #[error("unknown command index {0}")]
    UnknownCommandIndex(u64),

    #[error("command '{0}' is not part of this client's command set")]
    UnknownCommand(&'static str),

    #[error("call dropped before completion")]
    Dropped,
}

impl RpcError {
    /// A shareable copy for draining many outstanding completions with one
    /// transport failure.
    pub fn shared(self) -> Arc<RpcError> {
        match self {
            RpcError::Completion(inner) => inner,
            other => Arc::new(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{what} must be positive")]
pub struct MustBePositiveError {
    pub what: &'static str,
}

/// Formats an error chain with the deepest cause last.
pub fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
