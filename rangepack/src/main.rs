mod cli;
mod commands;
mod error;

use structopt::StructOpt;
use tracing::Level;

use cli::{CliOpts, Commands};

fn main() -> anyhow::Result<()> {
    let opts = CliOpts::from_iter(wild::args_os());

    tracing_subscriber::fmt()
        .with_max_level(if opts.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    match opts.cmd {
        Commands::Compress(args) => commands::compress(args)?,
        Commands::Decompress(args) => commands::decompress(args)?,
        Commands::Read(args) => commands::read(args)?,
        Commands::Info(args) => commands::info(args)?,
    };

    Ok(())
}
