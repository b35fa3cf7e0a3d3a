//! The share provider.

use std::sync::Arc;

use mcs_core::storages::Storages;
use mcs_dtyp::{Connectable, Endpoint};
use mcs_rpc::provider::Dispatch;
use mcs_rpc::{Connection, Fingerprint, Request, RpcError};

use crate::handler::ShareHandler;
use crate::Commands;

#[derive(Clone)]
pub struct Dispatcher(pub ShareHandler);

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

/// Serves the share command set over a shared registry.
pub struct Provider {
    inner: mcs_rpc::Provider,
}

impl Provider {
    pub async fn bind(endpoint: &Endpoint, storages: Arc<Storages>) -> Result<Provider, RpcError> {
        Ok(Provider {
            inner: mcs_rpc::Provider::bind(endpoint, Dispatcher(ShareHandler::new(storages)))
                .await?,
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        self.inner.local_endpoint()
    }

    pub fn connectable(&self) -> Connectable {
        self.inner.connectable()
    }
}
