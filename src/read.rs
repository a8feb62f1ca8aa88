use std::fmt;

use thiserror::Error;

use crate::alphabet::Alphabet;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReadError {
    #[error("Sequence to signal map is empty")]
    EmptyMap,
    #[error("Sequence to signal map has length {map_len}, expected {expected}")]
    MapLength { map_len: usize, expected: usize },
    #[error("Sequence to signal map decreases at base {0}")]
    MapNotMonotonic(usize),
    #[error("Sequence to signal map spans {first}..{last}, expected 0..{sig_len}")]
    MapBounds {
        first: usize,
        last: usize,
        sig_len: usize,
    },
    #[error("Integer sequence has length {int_len}, sequence has length {seq_len}")]
    IntSeqLength { int_len: usize, seq_len: usize },
    #[error("Integer code {0} is not in the alphabet")]
    UnknownCode(u8),
    #[error("Mapped signal region {start}..{end} is outside of signal with length {sig_len}")]
    MappedRegion {
        start: usize,
        end: usize,
        sig_len: usize,
    },
}

/// Normalized signal for a single read along with its canonical sequence and
/// the signal position where each base starts.
#[derive(Clone, PartialEq)]
pub struct Read {
    read_id: String,
    signal: Vec<f32>,
    seq: Vec<u8>,
    seq_to_sig_map: Vec<usize>,
    int_seq: Option<Vec<u8>>,
}

impl fmt::Debug for Read {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.debug_struct("Read")
            .field("read_id", &self.read_id)
            .field("seq", &String::from_utf8_lossy(&self.seq))
            .field("signal_len", &self.signal.len())
            .field("labeled", &self.int_seq.is_some())
            .finish()
    }
}

impl Read {
    /// Map must have one more entry than the sequence, never decrease, start
    /// at zero and end at the signal length.
    pub fn try_new<S, Q>(
        read_id: S,
        signal: Vec<f32>,
        seq: Q,
        seq_to_sig_map: Vec<usize>,
        int_seq: Option<Vec<u8>>,
    ) -> Result<Self, ReadError>
    where
        S: Into<String>,
        Q: Into<Vec<u8>>,
    {
        let seq = seq.into();
        let (&first, &last) = seq_to_sig_map
            .first()
            .zip(seq_to_sig_map.last())
            .ok_or(ReadError::EmptyMap)?;
        if seq_to_sig_map.len() != seq.len() + 1 {
            return Err(ReadError::MapLength {
                map_len: seq_to_sig_map.len(),
                expected: seq.len() + 1,
            });
        }
        if let Some(pos) = seq_to_sig_map.windows(2).position(|w| w[1] < w[0]) {
            return Err(ReadError::MapNotMonotonic(pos));
        }
        if first != 0 || last != signal.len() {
            return Err(ReadError::MapBounds {
                first,
                last,
                sig_len: signal.len(),
            });
        }
        if let Some(int_seq) = &int_seq {
            if int_seq.len() != seq.len() {
                return Err(ReadError::IntSeqLength {
                    int_len: int_seq.len(),
                    seq_len: seq.len(),
                });
            }
        }
        Ok(Read {
            read_id: read_id.into(),
            signal,
            seq,
            seq_to_sig_map,
            int_seq,
        })
    }

    /// Build from mapped signal reader output. The canonical sequence comes
    /// from collapsing the integer coded reference, and only the mapped
    /// region of the signal is kept with the map moved to start at zero.
    pub fn from_mapped<S: Into<String>>(
        read_id: S,
        signal: &[f32],
        int_seq: Vec<u8>,
        ref_to_signal: &[u64],
        alphabet: &Alphabet,
        labeled: bool,
    ) -> Result<Self, ReadError> {
        let seq = int_seq
            .iter()
            .map(|&code| alphabet.collapse(code).ok_or(ReadError::UnknownCode(code)))
            .collect::<Result<Vec<u8>, _>>()?;
        if let Some(pos) = ref_to_signal.windows(2).position(|w| w[1] < w[0]) {
            return Err(ReadError::MapNotMonotonic(pos));
        }
        let (&start, &end) = ref_to_signal
            .first()
            .zip(ref_to_signal.last())
            .ok_or(ReadError::EmptyMap)?;
        let (start, end) = (start as usize, end as usize);
        if start > end || end > signal.len() {
            return Err(ReadError::MappedRegion {
                start,
                end,
                sig_len: signal.len(),
            });
        }
        let seq_to_sig_map = ref_to_signal
            .iter()
            .map(|&x| x as usize - start)
            .collect();
        let int_seq = if labeled { Some(int_seq) } else { None };
        Read::try_new(
            read_id,
            signal[start..end].to_vec(),
            seq,
            seq_to_sig_map,
            int_seq,
        )
    }

    pub fn read_id(&self) -> &str {
        self.read_id.as_ref()
    }

    pub fn signal(&self) -> &[f32] {
        &self.signal
    }

    pub fn seq(&self) -> &[u8] {
        &self.seq
    }

    pub fn seq_to_sig_map(&self) -> &[usize] {
        &self.seq_to_sig_map
    }

    /// Integer coded reference, None for reads without labels
    pub fn int_seq(&self) -> Option<&[u8]> {
        self.int_seq.as_deref()
    }

    pub fn seq_len(&self) -> usize {
        self.seq.len()
    }

    pub fn sig_len(&self) -> usize {
        self.signal.len()
    }
}
