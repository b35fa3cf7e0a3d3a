use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;

use mcs_dtyp::{Connectable, Endpoint, Range, Size};
use mcs_iov::{Client, Provider, State, StoragesClients, collection};
use mcs_rpc::Exclusive;

use crate::cli::{CliError, parse, runtime};

#[derive(Subcommand)]
pub enum Command {
    /// Starts a backend provider, prints its connectable and serves until
    /// signalled. With a state file, the state is restored on start and
    /// saved back on shutdown.
    Provider {
        #[arg(value_parser = parse::<Endpoint>)]
        endpoint: Endpoint,
        threads: usize,
        state_file: Option<PathBuf>,
    },
    /// Creates a collection and prints its used storages.
    CollectionCreate {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
        collection_id: String,
        #[arg(value_parser = parse::<Size>)]
        size: Size,
    },
    /// Grows a collection to cover a range and prints the new total size.
    CollectionAppend {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
        collection_id: String,
        #[arg(value_parser = parse::<Range>)]
        range: Range,
    },
    /// Deletes a collection, freeing all its used storages.
    CollectionDelete {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
        collection_id: String,
    },
    /// Prints the collection's logical range.
    Range {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
        collection_id: String,
    },
    /// Prints the physical locations covering a range of a collection.
    Locations {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
        collection_id: String,
        #[arg(value_parser = parse::<Range>)]
        range: Range,
    },
    /// Registers a storage and prints its backend id.
    StorageAdd {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
        #[arg(value_parser = parse::<mcs_iov::Storage>)]
        storage: mcs_iov::Storage,
    },
    /// Prints all collections.
    ListCollections {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
    },
    /// Prints all registered storages.
    ListStorages {
        #[arg(value_parser = parse::<Connectable>)]
        provider: Connectable,
    },
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Provider {
            endpoint,
            threads,
            state_file,
        } => {
            let runtime = runtime(threads)?;
            let state = match &state_file {
                Some(path) => mcs_dtyp::load_from_file::<State>(path)?,
                None => State::default(),
            };
            let provider = runtime.block_on(Provider::bind(
                &endpoint,
                state,
                Arc::new(StoragesClients::new()),
            ))?;
            println!("{}", provider.connectable());
            runtime.wait();
            if let Some(path) = state_file {
                let state = runtime.block_on(provider.state());
                mcs_dtyp::save_to_file(&path, &state)?;
            }
            Ok(())
        }
        Command::CollectionCreate {
            provider,
            collection_id,
            size,
        } => with_client(provider, async move |client| {
            let used = client
                .collection_create(collection::Id::new(collection_id), size)
                .await?;
            for used in used {
                println!("{}: {}/{}", used.storage_id, used.segment_id, used.range);
            }
            Ok(())
        }),
        Command::CollectionAppend {
            provider,
            collection_id,
            range,
        } => with_client(provider, async move |client| {
            println!(
                "{}",
                client
                    .collection_append(collection::Id::new(collection_id), range)
                    .await?
            );
            Ok(())
        }),
        Command::CollectionDelete {
            provider,
            collection_id,
        } => with_client(provider, async move |client| {
            client
                .collection_delete(collection::Id::new(collection_id))
                .await?;
            Ok(())
        }),
        Command::Range {
            provider,
            collection_id,
        } => with_client(provider, async move |client| {
            println!(
                "{}",
                client.range(collection::Id::new(collection_id)).await?
            );
            Ok(())
        }),
        Command::Locations {
            provider,
            collection_id,
            range,
        } => with_client(provider, async move |client| {
            let locations = client
                .locations(collection::Id::new(collection_id), range)
                .await?;
            for location in locations {
                println!(
                    "{}: {}/{} via {}/({}, {})",
                    location.range,
                    location.transport_provider,
                    location.address,
                    location.storages_provider,
                    location.parameter_file_read,
                    location.parameter_file_write,
                );
            }
            Ok(())
        }),
        Command::StorageAdd { provider, storage } => {
            with_client(provider, async move |client| {
                println!("{}", client.storage_add(storage).await?);
                Ok(())
            })
        }
        Command::ListCollections { provider } => with_client(provider, async move |client| {
            let state = client.provider_state().await?;
            for (collection_id, entries) in &state.collections {
                println!("{collection_id}: {} used storage(s)", entries.used.len());
            }
            Ok(())
        }),
        Command::ListStorages { provider } => with_client(provider, async move |client| {
            let state = client.provider_state().await?;
            for (storage_id, storage) in &state.storages {
                println!("{storage_id}: {storage}");
            }
            Ok(())
        }),
    }
}

fn with_client<F>(provider: Connectable, body: F) -> Result<(), CliError>
where
    F: AsyncFnOnce(Client<Exclusive>) -> Result<(), CliError>,
{
    let runtime = runtime(1)?;
    runtime.block_on(async move {
        let client = Client::connect(&provider, Exclusive::default()).await?;
        body(client).await
    })
}
