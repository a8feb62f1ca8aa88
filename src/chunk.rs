use std::{cell::OnceCell, fmt};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    encode::{encode_chunk, ENCODING_LEN},
    error::{ChunkError, WindowReason},
    read::Read,
};

/// Number of bases before and after each base used when encoding sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KmerContext {
    pub before: usize,
    pub after: usize,
}

impl Default for KmerContext {
    fn default() -> Self {
        KmerContext::new(4, 4)
    }
}

impl KmerContext {
    pub const fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }

    pub const fn kmer_len(&self) -> usize {
        self.before + self.after + 1
    }

    /// Feature rows in an encoded chunk
    pub const fn channels(&self) -> usize {
        ENCODING_LEN * self.kmer_len()
    }

    pub const fn as_tuple(&self) -> (usize, usize) {
        (self.before, self.after)
    }
}

/// Window on a read in both signal and sequence coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkBounds {
    pub(crate) sig_start: usize,
    pub(crate) sig_end: usize,
    pub(crate) seq_start: usize,
    pub(crate) seq_end: usize,
    pub(crate) sig_focus_pos: usize,
}

/// Signal and sequence around a single call site.
#[derive(Clone)]
pub struct Chunk {
    signal: Vec<f32>,
    sequence: Vec<u8>,
    seq_to_sig_map: Vec<usize>,
    before_context_seq: Vec<u8>,
    after_context_seq: Vec<u8>,
    sig_focus_pos: usize,
    seq_focus_pos: usize,
    label: i64,
    read_id: String,
    read_seq_pos: usize,
    seq_nn_input: OnceCell<Array2<f32>>,
}

impl fmt::Debug for Chunk {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Chunk")
            .field("read_id", &self.read_id)
            .field("read_seq_pos", &self.read_seq_pos)
            .field("sequence", &String::from_utf8_lossy(&self.sequence))
            .field("signal_len", &self.signal.len())
            .field("label", &self.label)
            .finish()
    }
}

impl Chunk {
    /// Cut a chunk out of `read` for the window in `bounds`. The map is
    /// clamped to the window edges and moved to start at zero.
    pub(crate) fn from_read(
        read: &Read,
        kmer_context: KmerContext,
        bounds: &ChunkBounds,
        label: i64,
        read_seq_pos: usize,
    ) -> Result<Self, ChunkError> {
        let ChunkBounds {
            sig_start,
            sig_end,
            seq_start,
            seq_end,
            sig_focus_pos,
        } = *bounds;
        if read_seq_pos < seq_start || read_seq_pos >= seq_end || sig_focus_pos < sig_start {
            return Err(WindowReason::FocusOutside.into());
        }

        let mut seq_to_sig_map = read.seq_to_sig_map()[seq_start..=seq_end].to_vec();
        if let Some(first) = seq_to_sig_map.first_mut() {
            *first = sig_start;
        }
        if let Some(last) = seq_to_sig_map.last_mut() {
            *last = sig_end;
        }
        seq_to_sig_map.iter_mut().for_each(|x| *x -= sig_start);

        let seq = read.seq();
        let before_context_seq = seq_start
            .checked_sub(kmer_context.before)
            .map(|st| seq[st..seq_start].to_vec())
            .ok_or(ChunkError::InsufficientContext)?;
        let after_context_seq = seq
            .get(seq_end..seq_end + kmer_context.after)
            .map(|s| s.to_vec())
            .ok_or(ChunkError::InsufficientContext)?;

        Ok(Chunk {
            signal: read.signal()[sig_start..sig_end].to_vec(),
            sequence: seq[seq_start..seq_end].to_vec(),
            seq_to_sig_map,
            before_context_seq,
            after_context_seq,
            sig_focus_pos: sig_focus_pos - sig_start,
            seq_focus_pos: read_seq_pos - seq_start,
            label,
            read_id: read.read_id().to_string(),
            read_seq_pos,
            seq_nn_input: OnceCell::new(),
        })
    }

    /// Hide the called base from the model by replacing it with N.
    pub fn mask_focus_base(&mut self) {
        if self.sequence[self.seq_focus_pos] == b'N' {
            return;
        }
        self.sequence[self.seq_focus_pos] = b'N';
        self.seq_nn_input.take();
    }

    pub fn check(&self) -> Result<(), ChunkError> {
        if self.signal.is_empty() {
            log::debug!(
                "FAILED_CHUNK: no_sig {} {}",
                self.read_id,
                self.read_seq_pos
            );
            return Err(ChunkError::EmptySignal);
        }
        if self.sequence.len() + 1 != self.seq_to_sig_map.len() {
            log::debug!(
                "FAILED_CHUNK: map_len {} {}",
                self.read_id,
                self.read_seq_pos
            );
            return Err(ChunkError::MapLengthMismatch);
        }
        if self.seq_nn_input().ncols() != self.signal.len() {
            log::debug!(
                "FAILED_CHUNK: seq_nn_len {} {}",
                self.read_id,
                self.read_seq_pos
            );
            return Err(ChunkError::FeatureLengthMismatch);
        }
        Ok(())
    }

    /// Encoded sequence, one column per signal sample. Computed on first use.
    pub fn seq_nn_input(&self) -> &Array2<f32> {
        self.seq_nn_input.get_or_init(|| {
            encode_chunk(
                &self.before_context_seq,
                &self.sequence,
                &self.after_context_seq,
                &self.seq_to_sig_map,
            )
        })
    }

    pub fn signal(&self) -> &[f32] {
        &self.signal
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn seq_to_sig_map(&self) -> &[usize] {
        &self.seq_to_sig_map
    }

    pub fn before_context_seq(&self) -> &[u8] {
        &self.before_context_seq
    }

    pub fn after_context_seq(&self) -> &[u8] {
        &self.after_context_seq
    }

    /// Sequence with context bases on both sides
    pub fn seq_w_context(&self) -> Vec<u8> {
        [
            self.before_context_seq.as_slice(),
            &self.sequence,
            &self.after_context_seq,
        ]
        .concat()
    }

    pub fn kmer_context(&self) -> KmerContext {
        KmerContext::new(self.before_context_seq.len(), self.after_context_seq.len())
    }

    /// Signal samples assigned to each base
    pub fn base_sig_lens(&self) -> Vec<usize> {
        self.seq_to_sig_map.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn sig_focus_pos(&self) -> usize {
        self.sig_focus_pos
    }

    pub fn seq_focus_pos(&self) -> usize {
        self.seq_focus_pos
    }

    pub fn label(&self) -> i64 {
        self.label
    }

    pub fn read_id(&self) -> &str {
        self.read_id.as_ref()
    }

    pub fn read_seq_pos(&self) -> usize {
        self.read_seq_pos
    }

    pub fn sig_len(&self) -> usize {
        self.signal.len()
    }

    pub fn seq_len(&self) -> usize {
        self.sequence.len()
    }
}

#[cfg(test)]
mod test {
    use ndarray::s;

    use super::*;

    fn uniform_read(seq: &str, samples_per_base: usize) -> Read {
        let n = seq.len() * samples_per_base;
        let signal = (0..n).map(|x| x as f32).collect();
        let map = (0..=seq.len()).map(|i| i * samples_per_base).collect();
        Read::try_new("read", signal, seq, map, None).unwrap()
    }

    fn bounds(sig: (usize, usize), seq: (usize, usize), focus: usize) -> ChunkBounds {
        ChunkBounds {
            sig_start: sig.0,
            sig_end: sig.1,
            seq_start: seq.0,
            seq_end: seq.1,
            sig_focus_pos: focus,
        }
    }

    #[test]
    fn test_from_read_clamps_map() {
        let read = uniform_read("ACGTACGTAC", 10);
        let chunk = Chunk::from_read(
            &read,
            KmerContext::new(1, 1),
            &bounds((12, 37), (1, 4), 25),
            -1,
            2,
        )
        .unwrap();
        assert_eq!(chunk.sequence(), b"CGT");
        assert_eq!(chunk.seq_to_sig_map(), &[0, 8, 18, 25]);
        assert_eq!(chunk.before_context_seq(), b"A");
        assert_eq!(chunk.after_context_seq(), b"A");
        assert_eq!(chunk.signal()[0], 12.0);
        assert_eq!(chunk.sig_len(), 25);
        assert_eq!(chunk.sig_focus_pos(), 13);
        assert_eq!(chunk.seq_focus_pos(), 1);
        assert_eq!(chunk.base_sig_lens(), vec![8, 10, 7]);
        assert!(chunk.check().is_ok());
    }

    #[test]
    fn test_from_read_context_truncated() {
        let read = uniform_read("ACGTACGTAC", 10);
        let res = Chunk::from_read(
            &read,
            KmerContext::new(2, 1),
            &bounds((10, 20), (1, 2), 15),
            -1,
            1,
        );
        assert_eq!(res.unwrap_err(), ChunkError::InsufficientContext);

        let res = Chunk::from_read(
            &read,
            KmerContext::new(1, 2),
            &bounds((80, 90), (8, 9), 85),
            -1,
            8,
        );
        assert_eq!(res.unwrap_err(), ChunkError::InsufficientContext);
    }

    #[test]
    fn test_focus_outside() {
        let read = uniform_read("ACGTACGTAC", 10);
        let res = Chunk::from_read(
            &read,
            KmerContext::new(1, 1),
            &bounds((20, 30), (2, 3), 25),
            -1,
            5,
        );
        assert_eq!(
            res.unwrap_err(),
            ChunkError::InvalidWindow(WindowReason::FocusOutside)
        );
    }

    #[test]
    fn test_encoding_cached_and_deterministic() {
        let read = uniform_read("ACGTACGTAC", 4);
        let chunk = Chunk::from_read(
            &read,
            KmerContext::new(2, 2),
            &bounds((8, 24), (2, 6), 18),
            -1,
            4,
        )
        .unwrap();
        let first = chunk.seq_nn_input();
        assert_eq!(first.dim(), (20, 16));
        assert!(std::ptr::eq(first, chunk.seq_nn_input()));
        let copy = chunk.clone();
        assert_eq!(copy.seq_nn_input(), chunk.seq_nn_input());
    }

    #[test]
    fn test_mask_focus_base() {
        let read = uniform_read("ACGTACGTAC", 4);
        let mut chunk = Chunk::from_read(
            &read,
            KmerContext::new(1, 1),
            &bounds((8, 24), (2, 6), 18),
            -1,
            4,
        )
        .unwrap();
        let before = chunk.seq_nn_input().clone();
        chunk.mask_focus_base();
        assert_eq!(chunk.sequence(), b"GTNC");
        let after = chunk.seq_nn_input().clone();
        assert_ne!(before, after);

        // Center block only changes where the focus base has signal
        let changed: Vec<usize> = (0..after.ncols())
            .filter(|&col| {
                before.slice(s![4..8, col]) != after.slice(s![4..8, col])
            })
            .collect();
        assert_eq!(changed, vec![8, 9, 10, 11]);

        // Changes to any block stay within the focus base and its neighbours
        let changed: Vec<usize> = (0..after.ncols())
            .filter(|&col| before.column(col) != after.column(col))
            .collect();
        assert_eq!(changed, (4..16).collect::<Vec<_>>());

        // Masking twice is a no-op
        chunk.mask_focus_base();
        assert_eq!(chunk.seq_nn_input(), &after);
    }

    #[test]
    fn test_check_empty_signal() {
        let read = uniform_read("ACGTACGTAC", 4);
        let chunk = Chunk::from_read(
            &read,
            KmerContext::new(1, 1),
            &bounds((8, 8), (2, 3), 8),
            -1,
            2,
        )
        .unwrap();
        assert_eq!(chunk.check(), Err(ChunkError::EmptySignal));
    }
}
