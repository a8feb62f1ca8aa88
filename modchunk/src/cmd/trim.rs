use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use libmodchunk::{BatchOptions, Dataset};

use crate::file::ValidPathBuf;

#[derive(Debug, Parser)]
pub struct TrimCmd {
    /// Dataset pickle file
    #[clap(short, long)]
    pub input: ValidPathBuf,

    /// Path to trimmed dataset
    #[clap(short, long)]
    pub output: PathBuf,

    /// New kmer context bases, must not be larger than the current ones
    #[clap(long, num_args = 2)]
    pub kmer_context_bases: Option<Vec<usize>>,

    /// New chunk context, only for fixed signal length chunks
    #[clap(long, num_args = 2)]
    pub chunk_context: Option<Vec<usize>>,
}

impl TrimCmd {
    pub fn run(self) -> Result<()> {
        let mut dataset = Dataset::load(&self.input, BatchOptions::default().store_read_data(true))?;
        if let Some(kmer) = &self.kmer_context_bases {
            log::info!("Trimming kmer context to {kmer:?}");
            dataset.trim_kmer_context(kmer[0], kmer[1])?;
        }
        if let Some(context) = &self.chunk_context {
            log::info!("Trimming chunk context to {context:?}");
            dataset.trim_chunk_context(context[0], context[1])?;
        }
        dataset.save(&self.output)?;
        Ok(())
    }
}
