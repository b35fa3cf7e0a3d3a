//! Command-dispatched bidirectional request/response engine.
//!
//! A provider serves a compile-time list of commands behind a socket; a
//! client verifies at connection time that its own command list is a prefix
//! of the provider's and then issues calls under an access policy that
//! governs how the single socket is shared between concurrent callers.

pub mod access_policy;
pub mod client;
pub mod command;
pub mod endpoint_files;
pub mod envelope;
pub mod error;
pub mod multi_client;
pub mod provider;
pub mod runtime;
pub mod socket;

pub use access_policy::{AccessPolicy, CallId, Completion, Concurrent, Exclusive, Sequential};
pub use client::Client;
pub use client::{NoPayload, Payload};
pub use command::{Command, CommandSet, Done, Fingerprint, ResultOrError};
pub use error::{HandlerFailure, MustBePositiveError, RpcError};
pub use multi_client::{AtMost, Collect, ParallelCallsLimit};
pub use provider::{Connection, Handler, Provider, Request};
pub use runtime::{NumberOfThreads, ScopedRuntime};
pub use socket::{Listener, ReadHalf, Stream, WriteHalf};
