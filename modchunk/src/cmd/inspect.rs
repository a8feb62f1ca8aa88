use std::{io::Write, path::PathBuf};

use clap::Parser;
use eyre::Result;
use libmodchunk::{utils::stdout_or_file, BatchOptions, Dataset};

use crate::file::ValidPathBuf;

#[derive(Debug, Parser)]
pub struct InspectCmd {
    /// Dataset pickle file
    #[clap(short, long)]
    pub input: ValidPathBuf,

    /// Path to output summary, by default stdout
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

impl InspectCmd {
    pub fn run(self) -> Result<()> {
        let dataset = Dataset::load(&self.input, BatchOptions::default().store_read_data(true))?;
        let mut writer = stdout_or_file(self.output.as_ref())?;
        let metadata = dataset.metadata();
        let (_, channels, max_sig_len) = dataset.features().dim();

        writeln!(writer, "chunks\t{}", dataset.len())?;
        writeln!(writer, "chunk_context\t{:?}", metadata.chunk_context)?;
        writeln!(writer, "fixed_seq_len_chunks\t{}", metadata.fixed_seq_len_chunks)?;
        writeln!(writer, "kmer_context_bases\t{:?}", metadata.kmer_context_bases)?;
        writeln!(writer, "motif\t{}:{}", metadata.motif.1 + 1, metadata.motif.0)?;
        writeln!(writer, "base_pred\t{}", metadata.base_pred)?;
        writeln!(writer, "mod_bases\t{}", metadata.mod_bases)?;
        writeln!(writer, "mod_long_names\t{}", metadata.mod_long_names.join(","))?;
        writeln!(writer, "num_outputs\t{}", metadata.num_outputs())?;
        writeln!(writer, "feature_channels\t{channels}")?;
        writeln!(writer, "max_signal_len\t{max_sig_len}")?;
        writeln!(writer, "read_data\t{}", dataset.read_data().is_some())?;
        for (label, count) in dataset.label_distribution() {
            writeln!(writer, "label_{label}\t{count}")?;
        }
        Ok(())
    }
}
