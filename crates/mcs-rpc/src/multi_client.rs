//! Fan-out of one command family over many clients.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::access_policy::AccessPolicy;
use crate::client::Client;
use crate::command::Command;
use crate::error::{MustBePositiveError, RpcError};
use mcs_dtyp::read::{Read, ReadError, State};

/// A strictly positive parallelism bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtMost(u32);

impl AtMost {
    pub fn new(value: u32) -> Result<Self, MustBePositiveError> {
        if value == 0 {
            return Err(MustBePositiveError {
                what: "parallel calls limit",
            });
        }
        Ok(AtMost(value))
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParallelCallsLimit {
    Unlimited,
    AtMost(AtMost),
}

impl ParallelCallsLimit {
    fn admits(&self, in_flight: usize) -> bool {
        match self {
            ParallelCallsLimit::Unlimited => true,
            ParallelCallsLimit::AtMost(at_most) => in_flight < at_most.value() as usize,
        }
    }
}

impl std::fmt::Display for ParallelCallsLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParallelCallsLimit::Unlimited => write!(f, "unlimited"),
            ParallelCallsLimit::AtMost(at_most) => write!(f, "{}", at_most.value()),
        }
    }
}

impl Read for ParallelCallsLimit {
    fn read(state: &mut State) -> Result<Self, ReadError> {
        if state.maybe_prefix("unlimited") {
            Ok(ParallelCallsLimit::Unlimited)
        } else {
            let value = state.uint()?;
            AtMost::new(value)
                .map(ParallelCallsLimit::AtMost)
                .map_err(|e| state.error(e.to_string()))
        }
    }
}

/// Receives per-target outcomes of a fan-out.
pub trait Collect<Id, C: Command> {
    fn result(&mut self, id: &Id, response: C::Response);
    fn error(&mut self, id: &Id, error: RpcError);

    /// Throttle hook: returning `false` pauses starting new calls until
    /// the next completion was collected.
    fn start_more_calls(&mut self) -> bool {
        true
    }
}

/// Issues one command per target id, at most `limit` in flight, feeding
/// every outcome to `collect`.
///
/// Calls start in id order; on each completion one more call starts until
/// the targets are exhausted.
pub async fn call<C, AP, Id, Col>(
    mut command_for: impl FnMut(&Id) -> C,
    mut client_for: impl FnMut(&Id) -> Arc<Client<AP>>,
    ids: impl IntoIterator<Item = Id>,
    limit: ParallelCallsLimit,
    collect: &mut Col,
) where
    C: Command,
    C::Response: Send + 'static,
    AP: AccessPolicy,
    Id: Clone,
    Col: Collect<Id, C>,
{
    let ids: Vec<Id> = ids.into_iter().collect();
    let mut next = 0usize;
    let mut in_flight: JoinSet<(usize, Result<C::Response, RpcError>)> = JoinSet::new();

    loop {
        while next < ids.len() && limit.admits(in_flight.len()) && collect.start_more_calls() {
            let command = command_for(&ids[next]);
            let client = client_for(&ids[next]);
            let index = next;
            in_flight.spawn(async move { (index, client.call(command).await) });
            next += 1;
        }

        match in_flight.join_next().await {
            None => break,
            Some(Ok((index, outcome))) => match outcome {
                Ok(response) => collect.result(&ids[index], response),
                Err(error) => collect.error(&ids[index], error),
            },
            Some(Err(join_error)) => {
                // A panicking call task counts as an errored call; there is
                // no id to attribute it to beyond the join error itself.
                log::error!("fan-out call task failed: {join_error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_dtyp::read;

    #[test]
    fn at_most_zero_is_rejected() {
        assert_eq!(
            AtMost::new(0),
            Err(MustBePositiveError {
                what: "parallel calls limit",
            })
        );
        assert_eq!(AtMost::new(16).unwrap().value(), 16);
    }

    #[test]
    fn read_of_fmt_is_identity() {
        for limit in [
            ParallelCallsLimit::Unlimited,
            ParallelCallsLimit::AtMost(AtMost::new(16).unwrap()),
        ] {
            assert_eq!(
                read::read::<ParallelCallsLimit>(&limit.to_string()).unwrap(),
                limit
            );
        }
        assert!(read::read::<ParallelCallsLimit>("0").is_err());
    }
}
