mod block_device;
mod cli;
mod iov;
mod share;
mod transport;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::BlockDevice(command) => block_device::run(command),
        Commands::Transport(command) => transport::run(command),
        Commands::Share(command) => share::run(command),
        Commands::Iov(command) => iov::run(command),
    };
    if let Err(error) = result {
        eprintln!("{}", mcs_rpc::error::error_chain(error.as_ref()));
        std::process::exit(1);
    }
}
