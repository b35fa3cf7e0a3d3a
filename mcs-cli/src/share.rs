use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;

use mcs_core::storage::{heap, shmem};
use mcs_core::storages::Storages;
use mcs_dtyp::{Endpoint, MaxSize, Size};
use mcs_rpc::{Exclusive, endpoint_files};
use mcs_share as share;

use crate::cli::{CliError, parse, runtime};

#[derive(Subcommand)]
pub enum Command {
    /// Starts a share provider and serves until signalled.
    Provider {
        #[arg(value_parser = parse::<Endpoint>)]
        endpoint: Endpoint,
        /// Directory receiving the PROVIDER and PID files.
        directory: PathBuf,
        threads: usize,
    },
    /// Creates a chunk and prints it.
    Create {
        /// The share provider's directory.
        directory: PathBuf,
        #[arg(value_parser = parse::<Size>)]
        size: Size,
        #[command(subcommand)]
        backing: Backing,
    },
}

#[derive(Subcommand)]
pub enum Backing {
    /// A process-heap chunk; attachable within the provider only.
    Heap {
        #[arg(long, value_parser = parse::<MaxSize>, default_value = "unlimited")]
        max_size: MaxSize,
    },
    /// A POSIX shared-memory chunk.
    Shmem {
        /// Object name prefix, e.g. /mcs-share.
        #[arg(long)]
        prefix: String,
        #[arg(long, value_parser = parse::<MaxSize>, default_value = "unlimited")]
        max_size: MaxSize,
    },
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Provider {
            endpoint,
            directory,
            threads,
        } => {
            let runtime = runtime(threads)?;
            let storages = Arc::new(Storages::new());
            let provider = runtime.block_on(share::Provider::bind(&endpoint, storages))?;
            endpoint_files::write(&directory, &provider.connectable())?;
            runtime.wait();
            Ok(())
        }
        Command::Create {
            directory,
            size,
            backing,
        } => {
            let runtime = runtime(1)?;
            runtime.block_on(async move {
                let connectable = endpoint_files::read_provider(&directory)?;
                let client = share::Client::connect(&connectable, Exclusive::default()).await?;
                let chunk = match backing {
                    Backing::Heap { max_size } => {
                        client
                            .create::<heap::Heap>(
                                size,
                                heap::Create { max_size },
                                heap::SegmentCreate::default(),
                            )
                            .await?
                    }
                    Backing::Shmem { prefix, max_size } => {
                        client
                            .create::<shmem::Shmem>(
                                size,
                                shmem::Create { prefix, max_size },
                                shmem::SegmentCreate::default(),
                            )
                            .await?
                    }
                };
                println!("{chunk}");
                Ok(())
            })
        }
    }
}
