//! One-hot k-mer encoding of chunk sequence, expanded so that every signal
//! sample gets the encoding of the base it was assigned to.
//!
//! For a kmer context of `before` and `after` bases there are
//! `K = before + after + 1` blocks of four channels (A, C, G, T). Block `k`
//! at a base holds the base `k - before` positions away from it, so the
//! block at `before` is the base itself. Ambiguous bases encode as zeros.
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::chunk::KmerContext;

/// Channels per base
pub const ENCODING_LEN: usize = 4;

fn base_channel(base: u8) -> Option<usize> {
    match base {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Encodes `seq_len` bases of `seq_w_context`, which must hold
/// `seq_len + kmer_len - 1` bases, into a `(4 * kmer_len, seq_len)` matrix.
pub fn encode_kmers(seq_w_context: &[u8], seq_len: usize, kmer_len: usize) -> Array2<f32> {
    let mut enc = Array2::zeros((ENCODING_LEN * kmer_len, seq_len));
    for offset in 0..kmer_len {
        for (i, &base) in seq_w_context[offset..offset + seq_len].iter().enumerate() {
            if let Some(c) = base_channel(base) {
                enc[[offset * ENCODING_LEN + c, i]] = 1.0;
            }
        }
    }
    enc
}

/// Repeats column `i` once per signal sample assigned to base `i`.
pub fn expand_by_dwell(enc: ArrayView2<f32>, seq_to_sig_map: &[usize]) -> Array2<f32> {
    let origin = seq_to_sig_map.first().copied().unwrap_or(0);
    let sig_len = seq_to_sig_map.last().copied().unwrap_or(0) - origin;
    let mut expanded = Array2::zeros((enc.nrows(), sig_len));
    for (i, bounds) in seq_to_sig_map.windows(2).enumerate() {
        let (st, en) = (bounds[0] - origin, bounds[1] - origin);
        expanded
            .slice_mut(s![.., st..en])
            .assign(&enc.column(i).insert_axis(Axis(1)));
    }
    expanded
}

/// Per signal sample encoding of a chunk, shape `(4 * K, signal length)`.
pub fn encode_chunk(
    before_context_seq: &[u8],
    sequence: &[u8],
    after_context_seq: &[u8],
    seq_to_sig_map: &[usize],
) -> Array2<f32> {
    let kmer_len = before_context_seq.len() + after_context_seq.len() + 1;
    let seq_w_context = [before_context_seq, sequence, after_context_seq].concat();
    let enc = encode_kmers(&seq_w_context, sequence.len(), kmer_len);
    expand_by_dwell(enc.view(), seq_to_sig_map)
}

/// Encode a padded batch at once.
///
/// Row `i` of `seqs` holds the sequence with its context, and only the first
/// `seq_lens[i] + K - 1` entries are read. Row `i` of `seq_maps` holds that
/// sequence's map, of which the first `seq_lens[i] + 1` entries are used.
/// Output is `(n, 4 * K, max signal length)` with zeros past the end of each
/// row's own signal.
pub fn encode_kmer_batch(
    kmer_context: KmerContext,
    seqs: ArrayView2<u8>,
    seq_maps: ArrayView2<usize>,
    seq_lens: &[usize],
) -> Array3<f32> {
    let kmer_len = kmer_context.kmer_len();
    let sig_len = |row: usize, seq_len: usize| seq_maps[[row, seq_len]] - seq_maps[[row, 0]];
    let max_sig_len = seq_lens
        .iter()
        .enumerate()
        .map(|(row, &seq_len)| sig_len(row, seq_len))
        .max()
        .unwrap_or(0);

    let mut batch = Array3::zeros((seq_lens.len(), kmer_context.channels(), max_sig_len));
    for (row, &seq_len) in seq_lens.iter().enumerate() {
        let seq: Vec<u8> = seqs
            .row(row)
            .iter()
            .take(seq_len + kmer_len - 1)
            .copied()
            .collect();
        let map: Vec<usize> = seq_maps.row(row).iter().take(seq_len + 1).copied().collect();
        let enc = expand_by_dwell(encode_kmers(&seq, seq_len, kmer_len).view(), &map);
        batch
            .slice_mut(s![row, .., ..enc.ncols()])
            .assign(&enc);
    }
    batch
}

#[cfg(test)]
mod test {
    use ndarray::{array, Array2};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_single_base() {
        let enc = encode_chunk(b"", b"C", b"", &[0, 3]);
        assert_eq!(
            enc,
            array![
                [0.0, 0.0, 0.0],
                [1.0, 1.0, 1.0],
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0]
            ]
        );
    }

    #[test]
    fn test_ambiguous_base_is_zero() {
        let enc = encode_chunk(b"", b"N", b"", &[0, 2]);
        assert_eq!(enc, Array2::<f32>::zeros((4, 2)));
    }

    #[test]
    fn test_kmer_blocks() {
        // Blocks hold the base before, the base itself and the base after
        let enc = encode_chunk(b"A", b"CG", b"T", &[0, 1, 3]);
        assert_eq!(enc.dim(), (12, 3));
        let expected = array![
            // before block: A then C
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            // center block: C then G
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0],
            [0.0, 0.0, 0.0],
            // after block: G then T
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 1.0],
        ];
        assert_eq!(enc, expected);
    }

    #[test]
    fn test_zero_dwell_base() {
        // A base with no signal contributes no columns
        let enc = encode_chunk(b"", b"ACG", b"", &[0, 2, 2, 3]);
        assert_eq!(enc.ncols(), 3);
        assert_eq!(enc.column(2)[2], 1.0);
        assert_eq!(enc.row(1).sum(), 0.0);
    }

    #[test]
    fn test_offset_map() {
        let origin = encode_chunk(b"A", b"CG", b"T", &[0, 1, 3]);
        let shifted = encode_chunk(b"A", b"CG", b"T", &[10, 11, 13]);
        assert_eq!(origin, shifted);
    }

    #[test]
    fn test_batch_matches_single() {
        let kmer_context = KmerContext::new(1, 1);
        let first = encode_chunk(b"A", b"CG", b"T", &[0, 1, 3]);
        let second = encode_chunk(b"G", b"TACA", b"C", &[0, 2, 3, 5, 6]);

        let seqs = array![
            [b'A', b'C', b'G', b'T', b'N', b'N'],
            [b'G', b'T', b'A', b'C', b'A', b'C']
        ];
        let maps = array![[0, 1, 3, 0, 0], [0, 2, 3, 5, 6]];
        let batch = encode_kmer_batch(kmer_context, seqs.view(), maps.view(), &[2, 4]);

        assert_eq!(batch.dim(), (2, 12, 6));
        assert_eq!(batch.slice(s![0, .., ..3]), first);
        assert_eq!(batch.slice(s![0, .., 3..]), Array2::<f32>::zeros((12, 3)));
        assert_eq!(batch.slice(s![1, .., ..]), second);
    }

    #[test]
    fn test_batch_empty() {
        let seqs = Array2::<u8>::zeros((0, 3));
        let maps = Array2::<usize>::zeros((0, 2));
        let batch = encode_kmer_batch(KmerContext::new(1, 1), seqs.view(), maps.view(), &[]);
        assert_eq!(batch.dim(), (0, 12, 0));
    }
}
