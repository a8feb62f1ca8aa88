use std::fmt;

use fnv::FnvHashMap;
use itertools::Itertools;
use rayon::prelude::*;

use crate::{
    alphabet::LabelConverter,
    chunk::{Chunk, ChunkBounds, KmerContext},
    error::{ChunkError, DatasetError, WindowReason},
    motif::Motif,
    read::Read,
};

const SUCCESS: &str = "success";

/// How the chunk window is placed around a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkWindow {
    /// Fixed number of signal samples before and after the middle of the
    /// focus base, variable number of bases.
    FixedSignal { before: usize, after: usize },
    /// Fixed number of bases before and after the focus base, variable
    /// signal length.
    FixedSequence { before: usize, after: usize },
}

impl Default for ChunkWindow {
    fn default() -> Self {
        ChunkWindow::FixedSignal {
            before: 50,
            after: 50,
        }
    }
}

impl ChunkWindow {
    pub fn new(context: (usize, usize), fixed_seq_len_chunks: bool) -> Self {
        let (before, after) = context;
        if fixed_seq_len_chunks {
            ChunkWindow::FixedSequence { before, after }
        } else {
            ChunkWindow::FixedSignal { before, after }
        }
    }

    pub fn context(&self) -> (usize, usize) {
        match *self {
            ChunkWindow::FixedSignal { before, after }
            | ChunkWindow::FixedSequence { before, after } => (before, after),
        }
    }

    pub fn is_fixed_seq_len(&self) -> bool {
        matches!(self, ChunkWindow::FixedSequence { .. })
    }

    /// Place the window around base `m` of a read with the given map.
    pub(crate) fn bounds(&self, seq_to_sig_map: &[usize], m: usize) -> Result<ChunkBounds, WindowReason> {
        let sig_focus_pos = (seq_to_sig_map[m] + seq_to_sig_map[m + 1]) / 2;
        match *self {
            ChunkWindow::FixedSignal { before, after } => {
                let sig_start = sig_focus_pos
                    .checked_sub(before)
                    .ok_or(WindowReason::SignalStart)?;
                let sig_end = sig_focus_pos + after;
                let read_sig_len = seq_to_sig_map.last().copied().unwrap_or(0);
                if sig_end > read_sig_len {
                    return Err(WindowReason::SignalEnd);
                }
                if sig_start >= sig_end {
                    return Err(WindowReason::EmptySignal);
                }
                let seq_start = seq_to_sig_map.partition_point(|&x| x <= sig_start) - 1;
                let seq_end = seq_to_sig_map.partition_point(|&x| x < sig_end);
                Ok(ChunkBounds {
                    sig_start,
                    sig_end,
                    seq_start,
                    seq_end,
                    sig_focus_pos,
                })
            }
            ChunkWindow::FixedSequence { before, after } => {
                let seq_start = match m.checked_sub(before) {
                    Some(st) if st > 0 => st,
                    _ => return Err(WindowReason::BaseStart),
                };
                let seq_end = m + after + 1;
                if seq_end >= seq_to_sig_map.len() {
                    return Err(WindowReason::BaseEnd);
                }
                Ok(ChunkBounds {
                    sig_start: seq_to_sig_map[seq_start],
                    sig_end: seq_to_sig_map[seq_end],
                    seq_start,
                    seq_end,
                    sig_focus_pos,
                })
            }
        }
    }
}

/// Whether the model predicts modifications of the focus base or the
/// canonical focus base itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallMode {
    #[default]
    Modification,
    /// Focus base is masked so the model never sees it.
    BasePrediction,
}

/// Which positions of a read become chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteSelection {
    /// Every motif hit in the read
    Motif(Motif),
    /// A single known position, checked against the motif
    FocusOffset { motif: Motif, offset: usize },
}

impl SiteSelection {
    pub fn motif(&self) -> &Motif {
        match self {
            SiteSelection::Motif(motif) | SiteSelection::FocusOffset { motif, .. } => motif,
        }
    }

    fn sites(&self, seq: &[u8]) -> Result<Vec<usize>, ChunkError> {
        match self {
            SiteSelection::Motif(motif) => Ok(motif.hits(seq).collect()),
            SiteSelection::FocusOffset { motif, offset } => {
                if *offset >= seq.len() {
                    Err(ChunkError::FocusOffsetPastRead)
                } else if !motif.matches_at(seq, *offset) {
                    Err(ChunkError::MotifMismatch)
                } else {
                    Ok(vec![*offset])
                }
            }
        }
    }
}

/// Count of chunks per rejection reason, successes included. Merging is
/// associative and commutative so per-read counts can be combined in any
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectCounts(FnvHashMap<String, usize>);

impl RejectCounts {
    pub fn add<S: ToString>(&mut self, reason: S) {
        *self.0.entry(reason.to_string()).or_default() += 1;
    }

    pub fn add_success(&mut self) {
        self.add(SUCCESS);
    }

    pub fn merge(mut self, other: RejectCounts) -> Self {
        for (reason, count) in other.0.into_iter() {
            *self.0.entry(reason).or_default() += count;
        }
        self
    }

    pub fn get(&self, reason: &str) -> usize {
        self.0.get(reason).copied().unwrap_or(0)
    }

    pub fn successes(&self) -> usize {
        self.get(SUCCESS)
    }

    pub fn rejections(&self) -> usize {
        self.0
            .iter()
            .filter(|(reason, _)| reason.as_str() != SUCCESS)
            .map(|(_, count)| count)
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(reason, &count)| (reason.as_str(), count))
    }
}

impl fmt::Display for RejectCounts {
    /// One tab separated line per reason, sorted by count.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .0
            .iter()
            .map(|(reason, count)| (count, reason))
            .sorted()
            .map(|(count, reason)| format!("\t{count}\t{reason}"))
            .join("\n");
        write!(f, "{lines}")
    }
}

/// Settings for turning reads into chunks. Window, kmer context and call
/// mode are fixed for a whole dataset.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    window: ChunkWindow,
    kmer_context: KmerContext,
    call_mode: CallMode,
    sites: SiteSelection,
    label_conv: LabelConverter,
    max_chunks: Option<usize>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions::new(ChunkWindow::default(), SiteSelection::Motif(Motif::any_base()))
    }
}

impl ExtractOptions {
    pub fn new(window: ChunkWindow, sites: SiteSelection) -> Self {
        ExtractOptions {
            window,
            kmer_context: KmerContext::default(),
            call_mode: CallMode::default(),
            sites,
            label_conv: LabelConverter::default(),
            max_chunks: None,
        }
    }

    pub fn kmer_context(mut self, kmer_context: KmerContext) -> Self {
        self.kmer_context = kmer_context;
        self
    }

    pub fn call_mode(mut self, call_mode: CallMode) -> Self {
        self.call_mode = call_mode;
        self
    }

    pub fn label_conv(mut self, label_conv: LabelConverter) -> Self {
        self.label_conv = label_conv;
        self
    }

    pub fn max_chunks(mut self, max_chunks: Option<usize>) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn window(&self) -> ChunkWindow {
        self.window
    }

    pub fn get_kmer_context(&self) -> KmerContext {
        self.kmer_context
    }

    pub fn get_call_mode(&self) -> CallMode {
        self.call_mode
    }

    pub fn sites(&self) -> &SiteSelection {
        &self.sites
    }

    /// Extract every chunk from a single read. Failures are counted, never
    /// returned.
    pub fn extract_read(&self, read: &Read) -> (Vec<Chunk>, RejectCounts) {
        let mut chunks = Vec::new();
        let mut counts = RejectCounts::default();
        let sites = match self.sites.sites(read.seq()) {
            Ok(sites) => sites,
            Err(e) => {
                log::debug!("FAILED_READ: {} {e}", read.read_id());
                counts.add(e);
                return (chunks, counts);
            }
        };

        for m_pos in sites {
            match self.extract_site(read, m_pos) {
                Ok(chunk) => {
                    chunks.push(chunk);
                    counts.add_success();
                    if self.max_chunks.map_or(false, |n| chunks.len() >= n) {
                        break;
                    }
                }
                Err(e) => {
                    log::debug!("FAILED_READ: {} base: {m_pos}. ERROR: {e}", read.read_id());
                    counts.add(e);
                }
            }
        }
        (chunks, counts)
    }

    fn extract_site(&self, read: &Read, m_pos: usize) -> Result<Chunk, ChunkError> {
        let bounds = self.window.bounds(read.seq_to_sig_map(), m_pos)?;
        let label = match read.int_seq() {
            None => -1,
            Some(int_seq) => self
                .label_conv
                .convert(int_seq[m_pos])
                .ok_or(ChunkError::IrrelevantLabel)?,
        };
        let mut chunk = Chunk::from_read(read, self.kmer_context, &bounds, label, m_pos)?;
        if self.call_mode == CallMode::BasePrediction {
            chunk.mask_focus_base();
        }
        chunk.check()?;
        Ok(chunk)
    }

    /// Extract chunks from all reads in parallel. Chunks keep read order so
    /// results are reproducible, and at most `max_chunks` are returned.
    pub fn run(&self, reads: &[Read]) -> Result<(Vec<Chunk>, RejectCounts), DatasetError> {
        let (per_read, counts): (Vec<Vec<Chunk>>, Vec<RejectCounts>) = reads
            .par_iter()
            .map(|read| self.extract_read(read))
            .unzip();
        let counts = counts
            .into_par_iter()
            .reduce(RejectCounts::default, RejectCounts::merge);

        let mut chunks: Vec<Chunk> = per_read.into_iter().flatten().collect();
        if let Some(n) = self.max_chunks {
            chunks.truncate(n);
        }

        log::info!("Chunk selection summary:\n{counts}\n");
        if chunks.is_empty() {
            return Err(DatasetError::NoValidChunks);
        }
        Ok((chunks, counts))
    }
}
