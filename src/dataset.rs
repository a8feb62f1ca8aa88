//! Batched collection of encoded chunks.
//!
//! Every row-indexed buffer (signal, features, labels, signal lengths and
//! optional read positions) is kept in lockstep, so any reordering is applied
//! to all of them at once.
use std::{collections::BTreeMap, fs::File, io::BufWriter, path::Path};

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};
use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    alphabet::Alphabet,
    chunk::{Chunk, KmerContext},
    encode::{encode_kmer_batch, ENCODING_LEN},
    error::DatasetError,
    extract::{CallMode, ChunkWindow, ExtractOptions},
    motif::Motif,
};

/// Settings a dataset was built with. Stored alongside the buffers so a
/// model can be configured from a saved dataset alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub chunk_context: (usize, usize),
    pub fixed_seq_len_chunks: bool,
    pub kmer_context_bases: (usize, usize),
    pub motif: (String, usize),
    pub base_pred: bool,
    pub mod_bases: String,
    pub mod_long_names: Vec<String>,
}

impl DatasetMetadata {
    pub fn from_options(opts: &ExtractOptions, mod_bases: &[u8], alphabet: &Alphabet) -> Self {
        let window = opts.window();
        let mod_long_names = mod_bases
            .iter()
            .filter_map(|&b| alphabet.long_name(b))
            .map(String::from)
            .collect();
        DatasetMetadata {
            chunk_context: window.context(),
            fixed_seq_len_chunks: window.is_fixed_seq_len(),
            kmer_context_bases: opts.get_kmer_context().as_tuple(),
            motif: opts.sites().motif().to_tuple(),
            base_pred: opts.get_call_mode() == CallMode::BasePrediction,
            mod_bases: String::from_utf8_lossy(mod_bases).into_owned(),
            mod_long_names,
        }
    }

    pub fn window(&self) -> ChunkWindow {
        ChunkWindow::new(self.chunk_context, self.fixed_seq_len_chunks)
    }

    pub fn kmer_context(&self) -> KmerContext {
        let (before, after) = self.kmer_context_bases;
        KmerContext::new(before, after)
    }

    /// Size of the classifier output layer
    pub fn num_outputs(&self) -> usize {
        if self.base_pred {
            4
        } else {
            self.mod_bases.len() + 1
        }
    }

    pub fn validate(&self) -> Result<(), DatasetError> {
        let (pattern, focus_pos) = &self.motif;
        Motif::new(pattern.as_str(), *focus_pos)
            .map_err(|e| DatasetError::CorruptDataset(format!("motif: {e}")))?;
        if self.base_pred && !self.mod_bases.is_empty() {
            return Err(DatasetError::CorruptDataset(format!(
                "base prediction dataset lists modified bases {}",
                self.mod_bases
            )));
        }
        if !self.mod_long_names.is_empty() && self.mod_long_names.len() != self.mod_bases.len() {
            return Err(DatasetError::CorruptDataset(format!(
                "{} modified bases but {} long names",
                self.mod_bases.len(),
                self.mod_long_names.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    batch_size: usize,
    shuffle: bool,
    drop_last: bool,
    store_read_data: bool,
    seed: u64,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            batch_size: 1024,
            shuffle: false,
            drop_last: false,
            store_read_data: false,
            seed: 2456,
        }
    }
}

impl BatchOptions {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn store_read_data(mut self, store_read_data: bool) -> Self {
        self.store_read_data = store_read_data;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn get_batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn get_shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn get_drop_last(&self) -> bool {
        self.drop_last
    }

    pub fn get_seed(&self) -> u64 {
        self.seed
    }

    fn validation(&self) -> Self {
        self.clone().shuffle(false).drop_last(false)
    }
}

/// Where a chunk came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadPos {
    pub read_id: String,
    pub read_seq_pos: usize,
}

/// On disk form of a dataset.
#[derive(Debug, Serialize, Deserialize)]
pub struct DatasetFile {
    metadata: DatasetMetadata,
    signal: Array2<f32>,
    features: Array3<f32>,
    labels: Array1<i64>,
    sig_lens: Vec<usize>,
    read_data: Option<Vec<ReadPos>>,
}

impl DatasetFile {
    fn validate(&self) -> Result<(), DatasetError> {
        self.metadata.validate()?;
        let n = self.labels.len();
        let corrupt = |what: &str, found: usize| {
            Err(DatasetError::CorruptDataset(format!(
                "{what} has {found} rows, expected {n}"
            )))
        };
        if self.signal.nrows() != n {
            return corrupt("signal", self.signal.nrows());
        }
        if self.features.len_of(Axis(0)) != n {
            return corrupt("features", self.features.len_of(Axis(0)));
        }
        if self.sig_lens.len() != n {
            return corrupt("signal lengths", self.sig_lens.len());
        }
        if let Some(read_data) = &self.read_data {
            if read_data.len() != n {
                return corrupt("read data", read_data.len());
            }
        }

        let (_, channels, feature_len) = self.features.dim();
        let expected_channels = self.metadata.kmer_context().channels();
        if channels != expected_channels {
            return Err(DatasetError::CorruptDataset(format!(
                "features have {channels} channels, expected {expected_channels}"
            )));
        }
        if feature_len != self.signal.ncols() {
            return Err(DatasetError::CorruptDataset(format!(
                "features have length {feature_len}, signal has length {}",
                self.signal.ncols()
            )));
        }
        if self.sig_lens.iter().any(|&l| l > self.signal.ncols()) {
            return Err(DatasetError::CorruptDataset(
                "signal length longer than signal buffer".to_string(),
            ));
        }
        Ok(())
    }
}

pub trait ModchunkIO {
    fn save<P>(&self, filename: P) -> Result<(), DatasetError>
    where
        P: AsRef<Path>,
        Self: Sized;
    fn load<P>(filename: P) -> Result<Self, DatasetError>
    where
        P: AsRef<Path>,
        Self: Sized;
}

impl ModchunkIO for DatasetFile {
    fn save<P>(&self, filename: P) -> Result<(), DatasetError>
    where
        P: AsRef<Path>,
    {
        let mut file = BufWriter::new(File::create(filename)?);
        serde_pickle::to_writer(&mut file, &self, Default::default())?;
        Ok(())
    }

    fn load<P>(filename: P) -> Result<Self, DatasetError>
    where
        P: AsRef<Path>,
    {
        let file = File::open(filename)?;
        let dataset = serde_pickle::from_reader(file, Default::default())?;
        Ok(dataset)
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    metadata: DatasetMetadata,
    signal: Array2<f32>,
    features: Array3<f32>,
    labels: Array1<i64>,
    sig_lens: Vec<usize>,
    read_data: Option<Vec<ReadPos>>,
    opts: BatchOptions,
    rng: SmallRng,
}

impl Dataset {
    /// Stack chunks into zero padded buffers, encoding all of them at once.
    pub fn from_chunks(
        chunks: &[Chunk],
        metadata: DatasetMetadata,
        opts: BatchOptions,
    ) -> Result<Self, DatasetError> {
        if chunks.is_empty() {
            return Err(DatasetError::NoValidChunks);
        }
        let kmer_context = metadata.kmer_context();
        if let Some(chunk) = chunks.iter().find(|c| c.kmer_context() != kmer_context) {
            return Err(DatasetError::CorruptDataset(format!(
                "chunk from {} has kmer context {:?}, expected {:?}",
                chunk.read_id(),
                chunk.kmer_context().as_tuple(),
                kmer_context.as_tuple()
            )));
        }

        let n = chunks.len();
        let max_sig_len = chunks.iter().map(|c| c.sig_len()).max().unwrap_or(0);
        let max_seq_len = chunks.iter().map(|c| c.seq_len()).max().unwrap_or(0);

        let mut flat_signal = Vec::with_capacity(n * max_sig_len);
        for chunk in chunks {
            flat_signal.extend_from_slice(chunk.signal());
            flat_signal.resize(flat_signal.len() + max_sig_len - chunk.sig_len(), 0.0);
        }
        let signal = Array2::from_shape_vec((n, max_sig_len), flat_signal)?;

        let mut seqs = Array2::from_elem((n, max_seq_len + kmer_context.kmer_len() - 1), b'N');
        let mut seq_maps = Array2::zeros((n, max_seq_len + 1));
        for (i, chunk) in chunks.iter().enumerate() {
            for (j, base) in chunk.seq_w_context().into_iter().enumerate() {
                seqs[[i, j]] = base;
            }
            for (j, &x) in chunk.seq_to_sig_map().iter().enumerate() {
                seq_maps[[i, j]] = x;
            }
        }
        let seq_lens: Vec<usize> = chunks.iter().map(|c| c.seq_len()).collect();
        let features = encode_kmer_batch(kmer_context, seqs.view(), seq_maps.view(), &seq_lens);

        let read_data = opts.store_read_data.then(|| {
            chunks
                .iter()
                .map(|c| ReadPos {
                    read_id: c.read_id().to_string(),
                    read_seq_pos: c.read_seq_pos(),
                })
                .collect()
        });

        Ok(Dataset {
            metadata,
            signal,
            features,
            labels: chunks.iter().map(|c| c.label()).collect(),
            sig_lens: chunks.iter().map(|c| c.sig_len()).collect(),
            read_data,
            rng: SmallRng::seed_from_u64(opts.seed),
            opts,
        })
    }

    fn from_file(file: DatasetFile, opts: BatchOptions) -> Self {
        let read_data = if opts.store_read_data {
            file.read_data
        } else {
            None
        };
        Dataset {
            metadata: file.metadata,
            signal: file.signal,
            features: file.features,
            labels: file.labels,
            sig_lens: file.sig_lens,
            read_data,
            rng: SmallRng::seed_from_u64(opts.seed),
            opts,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, filename: P) -> Result<(), DatasetError> {
        let file = DatasetFile {
            metadata: self.metadata.clone(),
            signal: self.signal.clone(),
            features: self.features.clone(),
            labels: self.labels.clone(),
            sig_lens: self.sig_lens.clone(),
            read_data: self.read_data.clone(),
        };
        file.save(filename)
    }

    /// Load a saved dataset, checking metadata and buffer shapes agree.
    pub fn load<P: AsRef<Path>>(filename: P, opts: BatchOptions) -> Result<Self, DatasetError> {
        let file = DatasetFile::load(filename)?;
        file.validate()?;
        Ok(Dataset::from_file(file, opts))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_batches(&self) -> usize {
        let n = self.len();
        let batch_size = self.opts.batch_size;
        if self.opts.drop_last {
            n / batch_size
        } else {
            (n + batch_size - 1) / batch_size
        }
    }

    pub fn metadata(&self) -> &DatasetMetadata {
        &self.metadata
    }

    pub fn batch_options(&self) -> &BatchOptions {
        &self.opts
    }

    pub fn signal(&self) -> ArrayView2<f32> {
        self.signal.view()
    }

    pub fn features(&self) -> ArrayView3<f32> {
        self.features.view()
    }

    pub fn labels(&self) -> ArrayView1<i64> {
        self.labels.view()
    }

    pub fn sig_lens(&self) -> &[usize] {
        &self.sig_lens
    }

    pub fn read_data(&self) -> Option<&[ReadPos]> {
        self.read_data.as_deref()
    }

    fn permute(&mut self, idxs: &[usize]) {
        self.signal = self.signal.select(Axis(0), idxs);
        self.features = self.features.select(Axis(0), idxs);
        self.labels = self.labels.select(Axis(0), idxs);
        self.sig_lens = idxs.iter().map(|&i| self.sig_lens[i]).collect();
        if let Some(read_data) = &self.read_data {
            let permuted = idxs.iter().map(|&i| read_data[i].clone()).collect();
            self.read_data = Some(permuted);
        }
    }

    /// Reorder all rows with one random permutation.
    pub fn shuffle(&mut self) {
        let mut idxs: Vec<usize> = (0..self.len()).collect();
        idxs.shuffle(&mut self.rng);
        self.permute(&idxs);
    }

    /// Start a pass over the data, shuffling first if requested.
    pub fn batches(&mut self) -> Batches<'_> {
        if self.opts.shuffle {
            self.shuffle();
        }
        let n_batches = self.n_batches();
        Batches {
            dataset: self,
            next: 0,
            n_batches,
        }
    }

    fn subset(&self, start: usize, end: usize, opts: BatchOptions) -> Dataset {
        Dataset {
            metadata: self.metadata.clone(),
            signal: self.signal.slice(s![start..end, ..]).to_owned(),
            features: self.features.slice(s![start..end, .., ..]).to_owned(),
            labels: self.labels.slice(s![start..end]).to_owned(),
            sig_lens: self.sig_lens[start..end].to_vec(),
            read_data: self.read_data.as_ref().map(|rd| rd[start..end].to_vec()),
            rng: SmallRng::seed_from_u64(opts.seed),
            opts,
        }
    }

    /// Split off validation data after one shuffle. The training split is
    /// shuffled every pass and drops its last partial batch; the validation
    /// splits are neither. A second validation set is drawn from the start of
    /// the training rows to track overfitting.
    pub fn split(mut self, val_prop: f64) -> Result<Splits, DatasetError> {
        if val_prop.is_nan() || val_prop >= 1.0 {
            return Err(DatasetError::InvalidValidationProportion(val_prop));
        }
        if val_prop <= 0.0 {
            self.opts = self.opts.validation();
            return Ok(Splits {
                train: self,
                val: None,
                val_trn: None,
            });
        }

        let n = self.len();
        let required = ((1.0 / val_prop).floor() as usize).saturating_mul(2);
        if n < required {
            return Err(DatasetError::InsufficientValidationData {
                available: n,
                required,
            });
        }
        self.shuffle();
        let val_idx = (n as f64 * val_prop).floor() as usize;
        let val_opts = self.opts.validation();
        let train_opts = self.opts.clone().shuffle(true).drop_last(true);
        log::info!(
            "Split {n} chunks into {} training and {val_idx} validation chunks",
            n - val_idx
        );
        Ok(Splits {
            val: Some(self.subset(0, val_idx, val_opts.clone())),
            val_trn: Some(self.subset(val_idx, (2 * val_idx).min(n), val_opts)),
            train: self.subset(val_idx, n, train_opts),
        })
    }

    /// Keep only the kmer channel blocks nearest the center.
    pub fn trim_kmer_context(&mut self, before: usize, after: usize) -> Result<(), DatasetError> {
        let current = self.metadata.kmer_context_bases;
        if before > current.0 || after > current.1 {
            return Err(DatasetError::InvalidContextExpansion {
                what: "kmer context",
                current,
                requested: (before, after),
            });
        }
        let start = (current.0 - before) * ENCODING_LEN;
        let end = (current.0 + after + 1) * ENCODING_LEN;
        self.features = self.features.slice(s![.., start..end, ..]).to_owned();
        self.metadata.kmer_context_bases = (before, after);
        Ok(())
    }

    /// Narrow fixed signal length chunks around their focus position.
    pub fn trim_chunk_context(&mut self, before: usize, after: usize) -> Result<(), DatasetError> {
        if self.metadata.fixed_seq_len_chunks {
            return Err(DatasetError::UnsupportedTrim);
        }
        let current = self.metadata.chunk_context;
        if before > current.0 || after > current.1 {
            return Err(DatasetError::InvalidContextExpansion {
                what: "chunk context",
                current,
                requested: (before, after),
            });
        }
        let start = current.0 - before;
        let end = current.0 + after;
        if end > self.signal.ncols() {
            return Err(DatasetError::CorruptDataset(format!(
                "chunk context {current:?} exceeds signal length {}",
                self.signal.ncols()
            )));
        }
        self.signal = self.signal.slice(s![.., start..end]).to_owned();
        self.features = self.features.slice(s![.., .., start..end]).to_owned();
        self.sig_lens
            .iter_mut()
            .for_each(|l| *l = (*l).min(end).saturating_sub(start));
        self.metadata.chunk_context = (before, after);
        Ok(())
    }

    /// Count of chunks per label, including unlabeled chunks as -1.
    pub fn label_distribution(&self) -> BTreeMap<i64, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.labels.iter() {
            *counts.entry(label).or_default() += 1;
        }
        counts
    }

    pub fn ensure_trainable(&self) -> Result<(), DatasetError> {
        let counts = self.label_distribution();
        if let Some(&unlabeled) = counts.get(&-1) {
            return Err(DatasetError::UnlabeledChunks(unlabeled));
        }
        if counts.len() <= 1 {
            return Err(DatasetError::DegenerateLabelSpace(
                counts.into_keys().collect(),
            ));
        }
        Ok(())
    }
}

pub struct Splits {
    pub train: Dataset,
    pub val: Option<Dataset>,
    pub val_trn: Option<Dataset>,
}

/// Contiguous rows of every buffer.
#[derive(Debug)]
pub struct Batch<'a> {
    pub signal: ArrayView2<'a, f32>,
    pub features: ArrayView3<'a, f32>,
    pub labels: ArrayView1<'a, i64>,
    pub sig_lens: &'a [usize],
    pub read_data: Option<&'a [ReadPos]>,
}

impl<'a> Batch<'a> {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

pub struct Batches<'a> {
    dataset: &'a Dataset,
    next: usize,
    n_batches: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.n_batches {
            return None;
        }
        let ds = self.dataset;
        let start = self.next * ds.opts.batch_size;
        let end = (start + ds.opts.batch_size).min(ds.len());
        self.next += 1;
        Some(Batch {
            signal: ds.signal.slice(s![start..end, ..]),
            features: ds.features.slice(s![start..end, .., ..]),
            labels: ds.labels.slice(s![start..end]),
            sig_lens: &ds.sig_lens[start..end],
            read_data: ds.read_data.as_ref().map(|rd| &rd[start..end]),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.n_batches - self.next;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Batches<'a> {}
