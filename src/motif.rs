use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MotifError {
    #[error("Invalid format, should be in the form [pos]:[motif]")]
    InvalidFormat,
    #[error("Invalid base, should only be ACGT or IUPAC codes, uppercase only")]
    InvalidBase,
    #[error("Position should be within the length of the motif given.")]
    PositionOutsideofMotif,
    #[error("Position is one-based.")]
    PositionOneBased,
    #[error("Position must be positive integer")]
    PositionParseFailed,
    #[error("Additional parts not expected. Invalid format")]
    UnexpectedAdditionalFormat,
}

const IUPAC: &[u8] = b"ACGTNRYSWKMBDHV";

fn valid_motif_bases(motif: &str) -> bool {
    !motif.is_empty() && motif.bytes().all(|b| IUPAC.contains(&b))
}

/// Whether `base` from a read is allowed by the pattern symbol `code`. An
/// ambiguous base in the read never matches.
fn code_matches(code: u8, base: u8) -> bool {
    match code {
        b'N' => matches!(base, b'A' | b'C' | b'G' | b'T'),
        b'A' | b'C' | b'G' | b'T' => code == base,
        b'R' => matches!(base, b'A' | b'G'),
        b'Y' => matches!(base, b'C' | b'T'),
        b'S' => matches!(base, b'C' | b'G'),
        b'W' => matches!(base, b'A' | b'T'),
        b'K' => matches!(base, b'G' | b'T'),
        b'M' => matches!(base, b'A' | b'C'),
        b'B' => matches!(base, b'C' | b'G' | b'T'),
        b'D' => matches!(base, b'A' | b'G' | b'T'),
        b'H' => matches!(base, b'A' | b'C' | b'T'),
        b'V' => matches!(base, b'A' | b'C' | b'G'),
        _ => false,
    }
}

/// Sequence pattern plus the zero-based offset of the base being called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motif {
    motif: String,
    focus_pos: usize,
}

impl Motif {
    pub fn new<S>(motif: S, focus_pos: usize) -> Result<Self, MotifError>
    where
        S: Into<String>,
    {
        let motif = motif.into();
        if !valid_motif_bases(&motif) {
            Err(MotifError::InvalidBase)
        } else if focus_pos >= motif.len() {
            Err(MotifError::PositionOutsideofMotif)
        } else {
            Ok(Self { motif, focus_pos })
        }
    }

    /// Single wildcard base, every position with enough flanking context is a
    /// call site.
    pub fn any_base() -> Self {
        Self {
            motif: "N".to_string(),
            focus_pos: 0,
        }
    }

    /// Parse from `[pos]:[motif]` where pos is one-based, ie "2:CG" calls the
    /// G in CG.
    pub fn parse_from_str<T>(string: T) -> Result<Self, MotifError>
    where
        T: AsRef<str>,
    {
        let string = string.as_ref();
        let mut iter = string.split(':');
        let pos = iter
            .next()
            .ok_or(MotifError::InvalidFormat)?
            .parse::<usize>()
            .map_err(|_| MotifError::PositionParseFailed)?;
        let motif = iter.next().ok_or(MotifError::InvalidFormat)?;
        if !valid_motif_bases(motif) {
            Err(MotifError::InvalidBase)
        } else if pos == 0 {
            Err(MotifError::PositionOneBased)
        } else if pos > motif.len() {
            Err(MotifError::PositionOutsideofMotif)
        } else if iter.next().is_some() {
            Err(MotifError::UnexpectedAdditionalFormat)
        } else {
            Motif::new(motif, pos - 1)
        }
    }

    pub fn motif(&self) -> &str {
        self.motif.as_ref()
    }

    pub fn len_motif(&self) -> usize {
        self.motif.len()
    }

    pub fn focus_pos(&self) -> usize {
        self.focus_pos
    }

    pub fn bases_after_focus(&self) -> usize {
        self.len_motif() - self.focus_pos - 1
    }

    /// Pattern symbol at the call site
    pub fn focus_base(&self) -> u8 {
        self.motif.as_bytes()[self.focus_pos]
    }

    /// Every symbol is N, so any base can be called.
    pub fn any_context(&self) -> bool {
        self.motif.bytes().all(|b| b == b'N')
    }

    pub fn to_tuple(&self) -> (String, usize) {
        (self.motif.clone(), self.focus_pos)
    }

    fn matches_window(&self, window: &[u8]) -> bool {
        window.len() == self.len_motif()
            && self
                .motif
                .bytes()
                .zip(window.iter())
                .all(|(code, &base)| code_matches(code, base))
    }

    /// Check that the motif matches `seq` when its focus base is placed at
    /// `focus`.
    pub fn matches_at(&self, seq: &[u8], focus: usize) -> bool {
        let Some(start) = focus.checked_sub(self.focus_pos) else {
            return false;
        };
        seq.get(start..start + self.len_motif())
            .map(|window| self.matches_window(window))
            .unwrap_or(false)
    }

    /// Lazily iterate over focus positions of motif hits in `seq`. Call again
    /// to restart from the beginning.
    pub fn hits<'a>(&'a self, seq: &'a [u8]) -> MotifHits<'a> {
        let next = if self.any_context() { self.focus_pos } else { 0 };
        MotifHits {
            motif: self,
            seq,
            next,
        }
    }
}

impl FromStr for Motif {
    type Err = MotifError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Motif::parse_from_str(s)
    }
}

/// Focus positions of non-overlapping motif matches, scanned left to right.
pub struct MotifHits<'a> {
    motif: &'a Motif,
    seq: &'a [u8],
    next: usize,
}

impl<'a> Iterator for MotifHits<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.motif.any_context() {
            let end = self
                .seq
                .len()
                .saturating_sub(self.motif.bases_after_focus());
            if self.next < end {
                self.next += 1;
                return Some(self.next - 1);
            }
            return None;
        }

        let len = self.motif.len_motif();
        while self.next + len <= self.seq.len() {
            let start = self.next;
            if self.motif.matches_window(&self.seq[start..start + len]) {
                self.next = start + len;
                return Some(start + self.motif.focus_pos);
            }
            self.next += 1;
        }
        None
    }
}
