//! The meta-data provider.

use std::sync::{Arc, Mutex};

use mcs_dtyp::{Connectable, Endpoint};
use mcs_rpc::provider::Dispatch;
use mcs_rpc::{Connection, Fingerprint, Request, RpcError};

use crate::meta_data::blocks::Blocks;
use crate::meta_data::handler::MetaDataHandler;
use crate::meta_data::Commands;

#[derive(Clone)]
pub struct Dispatcher(pub MetaDataHandler);

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

/// Serves block meta data.
pub struct Provider {
    inner: mcs_rpc::Provider,
}

impl Provider {
    pub async fn bind(
        endpoint: &Endpoint,
        blocks: Arc<Mutex<Blocks>>,
    ) -> Result<Provider, RpcError> {
        Ok(Provider {
            inner: mcs_rpc::Provider::bind(endpoint, Dispatcher(MetaDataHandler::new(blocks)))
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
