//! The backend provider.

use std::sync::Arc;

use tokio::sync::RwLock;

use mcs_dtyp::{Connectable, Endpoint};
use mcs_rpc::provider::Dispatch;
use mcs_rpc::{Connection, Fingerprint, Request, RpcError};

use crate::handler::IovHandler;
use crate::state::State;
use crate::storages_clients::StoragesClients;
use crate::{Commands, IovError};

#[derive(Clone)]
pub struct Dispatcher(pub IovHandler);

impl Dispatch for Dispatcher {
    fn fingerprints(&self) -> Vec<Fingerprint> {
        <Commands as mcs_rpc::CommandSet>::fingerprints()
    }

    async fn dispatch(
        &self,
        request: Request,
        connection: &mut Connection<'_>,
    ) -> Result<(), RpcError> {
        Commands::dispatch(&self.0, request, connection).await
    }
}

/// Serves the backend command set over a (possibly restored) state.
pub struct Provider {
    inner: mcs_rpc::Provider,
    state: Arc<RwLock<State>>,
}

impl Provider {
    /// Binds with the given state; a restored state re-opens all its
    /// storages-clients before the provider accepts calls.
    pub async fn bind(
        endpoint: &Endpoint,
        state: State,
        clients: Arc<StoragesClients>,
    ) -> Result<Provider, IovError> {
        state.restart(&clients).await?;
        let state = Arc::new(RwLock::new(state));
        let inner = mcs_rpc::Provider::bind(
            endpoint,
            Dispatcher(IovHandler::new(Arc::clone(&state), clients)),
        )
        .await?;
        Ok(Provider { inner, state })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        self.inner.local_endpoint()
    }

    pub fn connectable(&self) -> Connectable {
        self.inner.connectable()
    }

    /// The live state, for snapshotting into a state file.
    pub async fn state(&self) -> State {
        self.state.read().await.clone()
    }
}
