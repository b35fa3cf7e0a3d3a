use clap::{Parser, Subcommand};

use mcs_dtyp::read::Read;

#[derive(Parser)]
#[command(name = "mcs", version, about = "Memory-chunk service front-ends", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Block-device meta data and whole-block I/O.
    #[command(subcommand)]
    BlockDevice(crate::block_device::Command),
    /// A demo transport provider exposing a storage of long integers.
    #[command(subcommand)]
    Transport(crate::transport::Command),
    /// The named-chunk share service.
    #[command(subcommand)]
    Share(crate::share::Command),
    /// The IOV striping backend.
    #[command(subcommand)]
    Iov(crate::iov::Command),
}

/// clap value parser for everything with a text representation.
pub fn parse<T: Read>(input: &str) -> Result<T, String> {
    mcs_dtyp::read::read(input).map_err(|error| error.to_string())
}

pub type CliError = Box<dyn std::error::Error + Send + Sync>;

pub fn runtime(threads: usize) -> Result<mcs_rpc::ScopedRuntime, CliError> {
    Ok(mcs_rpc::ScopedRuntime::new(mcs_rpc::NumberOfThreads::new(
        threads,
    )?)?)
}
