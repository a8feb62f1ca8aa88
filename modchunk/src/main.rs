mod cmd;
mod file;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use eyre::Result;
use human_panic::setup_panic;
#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about=None)]
/// Signal chunk datasets for modified base models.
struct Args {
    #[clap(flatten)]
    verbose: Verbosity,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract and encode chunks from mapped signal reads into a dataset
    Prepare(cmd::prepare::PrepareCmd),

    /// Summarize a dataset's settings and label counts
    Inspect(cmd::inspect::InspectCmd),

    /// Shrink the kmer or chunk context of a dataset
    Trim(cmd::trim::TrimCmd),

    /// Split a dataset into training and validation datasets
    Split(cmd::split::SplitCmd),
}

fn main() -> Result<()> {
    setup_panic!();
    jane_eyre::install()?;

    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    match args.command {
        Commands::Prepare(cmd) => cmd.run()?,
        Commands::Inspect(cmd) => cmd.run()?,
        Commands::Trim(cmd) => cmd.run()?,
        Commands::Split(cmd) => cmd.run()?,
    }
    Ok(())
}
