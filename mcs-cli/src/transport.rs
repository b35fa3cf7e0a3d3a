use std::path::PathBuf;
use std::sync::Arc;

use clap::Subcommand;

use mcs_core::storage::heap;
use mcs_core::storages::Storages;
use mcs_core::transport::{self, Address};
use mcs_core::{Chunk, Mutable, chunk};
use mcs_dtyp::{Endpoint, MaxSize, Offset, Parameter, Range, Size};
use mcs_rpc::endpoint_files;

use crate::cli::{CliError, parse, runtime};

#[derive(Subcommand)]
pub enum Command {
    /// Starts a transport provider over a heap storage of `n_longs` long
    /// integers holding the values `0..n_longs`, prints the storage's
    /// address and serves until signalled.
    Provider {
        #[arg(value_parser = parse::<Endpoint>)]
        endpoint: Endpoint,
        /// Directory receiving the PROVIDER and PID files.
        directory: PathBuf,
        n_longs: u64,
        threads: usize,
    },
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Provider {
            endpoint,
            directory,
            n_longs,
            threads,
        } => {
            let runtime = runtime(threads)?;
            let size = Size::of::<i64>(n_longs);

            let storages = Arc::new(Storages::new());
            let storage_id = storages.create::<heap::Heap>(heap::Create {
                max_size: MaxSize::Limit(size),
            })?;
            let segment_id = storages.segment_create::<heap::Heap>(
                storage_id,
                heap::SegmentCreate::default(),
                size,
            )?;
            let description = storages.chunk_description::<heap::Heap>(
                storage_id,
                heap::ChunkDescription,
                segment_id,
                Range::at(Offset::ZERO, size),
                chunk::AccessMode::Mutable,
            )?;
            let mut segment = Chunk::<Mutable>::resolve(description)?;
            let longs = unsafe { chunk::as_slice_mut::<i64>(&mut segment) };
            for (i, value) in longs.iter_mut().enumerate() {
                *value = i as i64;
            }
            drop(segment);

            let provider =
                runtime.block_on(transport::Provider::bind(&endpoint, storages))?;
            endpoint_files::write(&directory, &provider.connectable())?;
            println!(
                "{}",
                Address {
                    storage_id,
                    chunk_description_parameter: Parameter::encode(&heap::ChunkDescription)?,
                    segment_id,
                    offset: Offset::ZERO,
                }
            );
            runtime.wait();
            Ok(())
        }
    }
}
