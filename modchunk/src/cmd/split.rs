use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use libmodchunk::{BatchOptions, Dataset, Splits};

use crate::file::ValidPathBuf;

#[derive(Debug, Parser)]
pub struct SplitCmd {
    /// Dataset pickle file
    #[clap(short, long)]
    pub input: ValidPathBuf,

    /// Directory for train.pkl, val.pkl and val_trn.pkl
    #[clap(short, long)]
    pub output_dir: PathBuf,

    /// Proportion of chunks held out for validation
    #[clap(long, default_value_t = 0.01)]
    pub val_prop: f64,

    /// Seed for the shuffle before splitting
    #[clap(long, default_value_t = 2456)]
    pub seed: u64,
}

impl SplitCmd {
    pub fn run(self) -> Result<()> {
        let opts = BatchOptions::default().store_read_data(true).seed(self.seed);
        let dataset = Dataset::load(&self.input, opts)?;
        dataset.ensure_trainable()?;

        std::fs::create_dir_all(&self.output_dir)?;
        let Splits {
            train,
            val,
            val_trn,
        } = dataset.split(self.val_prop)?;
        train.save(self.output_dir.join("train.pkl"))?;
        if let Some(val) = val {
            val.save(self.output_dir.join("val.pkl"))?;
        }
        if let Some(val_trn) = val_trn {
            val_trn.save(self.output_dir.join("val_trn.pkl"))?;
        }
        Ok(())
    }
}
