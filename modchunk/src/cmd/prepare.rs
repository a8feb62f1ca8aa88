use std::{fs::File, io::BufReader, path::PathBuf};

use clap::Parser;
use eyre::Result;
use libmodchunk::{
    arrow::arrow_utils::read_records,
    utils::with_spinner,
    Alphabet, BatchOptions, CallMode, ChunkWindow, Dataset, DatasetMetadata, ExtractOptions,
    KmerContext, LabelConverter, Motif, SiteSelection,
};

#[derive(Debug, Parser)]
pub struct PrepareCmd {
    /// Arrow file of mapped signal reads
    #[clap(short, long)]
    pub input: crate::file::ValidPathBuf,

    /// Path to output dataset pickle file
    #[clap(short, long)]
    pub output: PathBuf,

    /// Extended alphabet of the integer coded sequences
    #[clap(long, default_value = "ACGT")]
    pub alphabet: String,

    /// Canonical base for each letter of the alphabet
    #[clap(long, default_value = "ACGT")]
    pub collapse_alphabet: String,

    /// Long names of modified bases, in alphabet order
    #[clap(long, value_delimiter = ',')]
    pub mod_long_names: Vec<String>,

    /// Modified bases to train on, by default every modified base in the
    /// alphabet
    #[clap(long)]
    pub mod_bases: Option<String>,

    /// Motif to extract chunks around. Format = "{position of called
    /// base}:{motif}", ie "1:CG" for the C in CpG. Calls every base by
    /// default.
    #[clap(short, long, default_value = "1:N")]
    pub motif: Motif,

    /// Extract a single chunk per read at this sequence position instead of
    /// every motif hit
    #[clap(long)]
    pub focus_offset: Option<usize>,

    /// Signal samples, or bases with --fixed-seq-len-chunks, before and
    /// after the called base
    #[clap(long, num_args = 2, default_values_t = [50, 50])]
    pub chunk_context: Vec<usize>,

    /// Use a fixed number of bases per chunk instead of a fixed number of
    /// signal samples
    #[clap(long)]
    pub fixed_seq_len_chunks: bool,

    /// Bases before and after each base included in its encoding
    #[clap(long, num_args = 2, default_values_t = [4, 4])]
    pub kmer_context_bases: Vec<usize>,

    /// Predict the canonical called base instead of its modification
    #[clap(long)]
    pub base_pred: bool,

    /// Maximum number of chunks to extract
    #[clap(long)]
    pub max_chunks: Option<usize>,

    /// Keep the read id and position of each chunk in the dataset
    #[clap(long)]
    pub store_read_data: bool,

    /// Number of threads to use, by default num cpus
    #[clap(short = 'j', long)]
    pub threads: Option<usize>,
}

impl PrepareCmd {
    fn label_converter(&self, alphabet: &Alphabet) -> Result<(LabelConverter, Vec<u8>)> {
        if self.base_pred {
            if self.mod_bases.is_some() {
                eyre::bail!("--mod-bases cannot be used with --base-pred");
            }
            return Ok((LabelConverter::canonical(alphabet), Vec::new()));
        }
        let mod_bases = self
            .mod_bases
            .as_ref()
            .map(|m| m.as_bytes().to_vec())
            .unwrap_or_else(|| alphabet.mod_bases());
        let label_conv = LabelConverter::for_mods(alphabet, &mod_bases, &self.motif)?;
        Ok((label_conv, mod_bases))
    }

    pub fn run(self) -> Result<()> {
        log::info!("Prepare command");
        let n_threads = super::init_threads(self.threads)?;
        log::info!("Using {n_threads} logical cores");

        let alphabet = Alphabet::try_new(
            self.alphabet.as_str(),
            self.collapse_alphabet.as_str(),
            self.mod_long_names.clone(),
        )?;
        let (label_conv, mod_bases) = self.label_converter(&alphabet)?;

        let window = ChunkWindow::new(
            (self.chunk_context[0], self.chunk_context[1]),
            self.fixed_seq_len_chunks,
        );
        let sites = match self.focus_offset {
            Some(offset) => SiteSelection::FocusOffset {
                motif: self.motif.clone(),
                offset,
            },
            None => SiteSelection::Motif(self.motif.clone()),
        };
        let call_mode = if self.base_pred {
            CallMode::BasePrediction
        } else {
            CallMode::Modification
        };
        let extract = ExtractOptions::new(window, sites)
            .kmer_context(KmerContext::new(
                self.kmer_context_bases[0],
                self.kmer_context_bases[1],
            ))
            .call_mode(call_mode)
            .label_conv(label_conv)
            .max_chunks(self.max_chunks);

        let reader = BufReader::new(File::open(&self.input)?);
        let reads = read_records(reader, &alphabet)?;
        let (chunks, _) = with_spinner("Extracting chunks", || Ok(extract.run(&reads)?))?;

        let metadata = DatasetMetadata::from_options(&extract, &mod_bases, &alphabet);
        let opts = BatchOptions::default().store_read_data(self.store_read_data);
        let dataset = Dataset::from_chunks(&chunks, metadata, opts)?;
        for (label, count) in dataset.label_distribution() {
            log::info!("Label {label}: {count} chunks");
        }
        dataset.save(&self.output)?;
        log::info!("Saved {} chunks to {}", dataset.len(), self.output.display());
        Ok(())
    }
}
