use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Subcommand;

use mcs_block_device::meta_data::{self, Blocks};
use mcs_block_device::{Reader, block};
use mcs_core::storage::heap;
use mcs_core::storages::{Storages, UniqueSegment, UniqueStorage};
use mcs_core::transport;
use mcs_core::{Chunk, Const, Mutable, chunk};
use mcs_dtyp::{Endpoint, MaxSize, Offset, Range, Size};
use mcs_rpc::endpoint_files;

use crate::cli::{CliError, parse, runtime};

#[derive(Subcommand)]
pub enum Command {
    /// Starts a meta-data provider and serves until signalled.
    Provider {
        #[arg(value_parser = parse::<Endpoint>)]
        endpoint: Endpoint,
        /// Directory receiving the PROVIDER and PID files.
        directory: PathBuf,
        #[arg(value_parser = parse::<block::Size>)]
        block_size: block::Size,
        threads: usize,
    },
    /// Reads one block to stdout.
    Cat {
        /// The meta-data provider's directory.
        directory: PathBuf,
        #[arg(value_parser = parse::<block::Id>)]
        block_id: block::Id,
    },
    /// Prints the number of blocks.
    NumberOfBlocks {
        directory: PathBuf,
    },
    /// Removes a range of blocks and prints the storages that became
    /// unused.
    Remove {
        directory: PathBuf,
        #[arg(value_parser = parse::<block::Range>)]
        block_range: block::Range,
    },
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Provider {
            endpoint,
            directory,
            block_size,
            threads,
        } => {
            let runtime = runtime(threads)?;
            let blocks = Arc::new(Mutex::new(Blocks::new(block_size)));
            let provider =
                runtime.block_on(meta_data::Provider::bind(&endpoint, blocks))?;
            endpoint_files::write(&directory, &provider.connectable())?;
            runtime.wait();
            Ok(())
        }
        Command::Cat {
            directory,
            block_id,
        } => {
            let runtime = runtime(1)?;
            runtime.block_on(cat(directory, block_id))
        }
        Command::NumberOfBlocks { directory } => {
            let runtime = runtime(1)?;
            runtime.block_on(async move {
                let client = connect(&directory).await?;
                println!("{}", client.number_of_blocks().await?);
                Ok(())
            })
        }
        Command::Remove {
            directory,
            block_range,
        } => {
            let runtime = runtime(1)?;
            runtime.block_on(async move {
                let client = connect(&directory).await?;
                for storage in client.remove(block_range).await?.unused {
                    println!("{storage}");
                }
                Ok(())
            })
        }
    }
}

async fn connect(directory: &std::path::Path) -> Result<meta_data::Client, CliError> {
    let connectable = endpoint_files::read_provider(directory)?;
    Ok(meta_data::Client::connect(&connectable).await?)
}

async fn cat(directory: PathBuf, block_id: block::Id) -> Result<(), CliError> {
    let client = connect(&directory).await?;
    let size = Size::new(client.block_size().value());

    // the destination block lives in a local heap storage
    let storages = Storages::new();
    let storage = UniqueStorage::create::<heap::Heap>(
        &storages,
        heap::Create {
            max_size: MaxSize::Limit(size),
        },
    )?;
    let segment = UniqueSegment::<heap::Heap>::create(
        &storages,
        storage.id(),
        heap::SegmentCreate::default(),
        heap::SegmentRemove,
        size,
    )?;
    let range = Range::at(Offset::ZERO, size);

    let destination = storages.chunk_description::<heap::Heap>(
        storage.id(),
        heap::ChunkDescription,
        segment.id(),
        range,
        chunk::AccessMode::Mutable,
    )?;
    let mut destination = Chunk::<Mutable>::resolve(destination)?;

    let reader = Reader::new(&client, |provider| async move {
        transport::Client::connect(&provider).await
    });
    let bytes_read = reader.read(block_id, destination.bytes_mut()).await?;
    if bytes_read != size {
        return Err("Could not read all data.".into());
    }

    let bytes = storages.chunk_description::<heap::Heap>(
        storage.id(),
        heap::ChunkDescription,
        segment.id(),
        range,
        chunk::AccessMode::Const,
    )?;
    let bytes = Chunk::<Const>::resolve(bytes)?;
    let stdout = std::io::stdout();
    if stdout.lock().write_all(bytes.bytes()).is_err() {
        return Err("Failure, broken pipe.".into());
    }
    Ok(())
}
