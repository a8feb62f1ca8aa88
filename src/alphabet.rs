use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motif::Motif;

/// Canonical bases, in the order used for one-hot encoding and base
/// prediction labels.
pub const CANONICAL_BASES: &[u8; 4] = b"ACGT";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AlphabetError {
    #[error("Alphabet {alphabet} and collapse alphabet {collapse} must be the same length")]
    LengthMismatch { alphabet: String, collapse: String },
    #[error("Collapse alphabet may only contain canonical bases, found {0}")]
    NonCanonicalCollapse(char),
    #[error("Symbol {0} appears more than once in the alphabet")]
    DuplicateSymbol(char),
    #[error("Expected {expected} modified base long names, found {found}")]
    LongNameCount { expected: usize, found: usize },
    #[error("Modified base {0} not found in alphabet")]
    MissingModBase(char),
    #[error("Modified base {base} is a {collapses_to} modification, motif focus base is {focus}")]
    ModBaseFocusMismatch {
        base: char,
        collapses_to: char,
        focus: char,
    },
    #[error("Motif focus base {0} must be a canonical base")]
    NonCanonicalFocus(char),
    #[error("Base prediction requires a canonical alphabet, found {0}")]
    NonCanonicalAlphabet(String),
}

/// Extended alphabet of a mapped signal file. Position `i` in `alphabet` is
/// integer code `i`, and `collapse_alphabet[i]` is its canonical base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alphabet {
    alphabet: Vec<u8>,
    collapse_alphabet: Vec<u8>,
    mod_long_names: Vec<String>,
}

impl Default for Alphabet {
    fn default() -> Self {
        Alphabet {
            alphabet: CANONICAL_BASES.to_vec(),
            collapse_alphabet: CANONICAL_BASES.to_vec(),
            mod_long_names: Vec::new(),
        }
    }
}

impl Alphabet {
    pub fn try_new<S: AsRef<str>>(
        alphabet: S,
        collapse_alphabet: S,
        mod_long_names: Vec<String>,
    ) -> Result<Self, AlphabetError> {
        let (alphabet, collapse) = (alphabet.as_ref(), collapse_alphabet.as_ref());
        if alphabet.len() != collapse.len() {
            return Err(AlphabetError::LengthMismatch {
                alphabet: alphabet.to_string(),
                collapse: collapse.to_string(),
            });
        }
        if let Some(b) = collapse.bytes().find(|b| !CANONICAL_BASES.contains(b)) {
            return Err(AlphabetError::NonCanonicalCollapse(b as char));
        }
        for (i, b) in alphabet.bytes().enumerate() {
            if alphabet.bytes().skip(i + 1).any(|o| o == b) {
                return Err(AlphabetError::DuplicateSymbol(b as char));
            }
        }
        let alphabet = Alphabet {
            alphabet: alphabet.as_bytes().to_vec(),
            collapse_alphabet: collapse.as_bytes().to_vec(),
            mod_long_names,
        };
        let n_mods = alphabet.mod_bases().len();
        if !alphabet.mod_long_names.is_empty() && alphabet.mod_long_names.len() != n_mods {
            return Err(AlphabetError::LongNameCount {
                expected: n_mods,
                found: alphabet.mod_long_names.len(),
            });
        }
        Ok(alphabet)
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn collapse_alphabet(&self) -> &[u8] {
        &self.collapse_alphabet
    }

    pub fn len(&self) -> usize {
        self.alphabet.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alphabet.is_empty()
    }

    /// True when the alphabet holds only ACGT, in order.
    pub fn is_canonical(&self) -> bool {
        self.alphabet == CANONICAL_BASES
    }

    /// Canonical base for an integer code.
    pub fn collapse(&self, code: u8) -> Option<u8> {
        self.collapse_alphabet.get(code as usize).copied()
    }

    pub fn code_of(&self, symbol: u8) -> Option<usize> {
        self.alphabet.iter().position(|&b| b == symbol)
    }

    /// Symbols that do not collapse to themselves.
    pub fn mod_bases(&self) -> Vec<u8> {
        self.alphabet
            .iter()
            .zip(self.collapse_alphabet.iter())
            .filter(|(a, c)| a != c)
            .map(|(&a, _)| a)
            .collect()
    }

    pub fn mod_long_names(&self) -> &[String] {
        &self.mod_long_names
    }

    /// Long name for a modified base symbol, if names were given.
    pub fn long_name(&self, mod_base: u8) -> Option<&str> {
        let idx = self.mod_bases().iter().position(|&b| b == mod_base)?;
        self.mod_long_names.get(idx).map(|s| s.as_str())
    }
}

/// Total mapping from integer alphabet codes to class labels. Codes that are
/// not a training target map to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConverter {
    table: Vec<Option<i64>>,
}

impl LabelConverter {
    /// Build from a raw lookup table, negative entries are not training
    /// targets.
    pub fn from_raw(table: &[i64]) -> Self {
        let table = table
            .iter()
            .map(|&label| if label < 0 { None } else { Some(label) })
            .collect();
        LabelConverter { table }
    }

    /// Labels each code by the index of its canonical base in ACGT, used for
    /// base prediction.
    pub fn canonical(alphabet: &Alphabet) -> Self {
        let table = alphabet
            .collapse_alphabet()
            .iter()
            .map(|b| {
                CANONICAL_BASES
                    .iter()
                    .position(|c| c == b)
                    .map(|i| i as i64)
            })
            .collect();
        LabelConverter { table }
    }

    /// Canonical motif focus base is label 0 and the i-th entry of
    /// `mod_bases` is label i + 1. Every modified base must be a
    /// modification of the focus base.
    pub fn for_mods(
        alphabet: &Alphabet,
        mod_bases: &[u8],
        motif: &Motif,
    ) -> Result<Self, AlphabetError> {
        let focus = motif.focus_base();
        if !CANONICAL_BASES.contains(&focus) {
            return Err(AlphabetError::NonCanonicalFocus(focus as char));
        }
        for &mod_base in mod_bases {
            let code = alphabet
                .code_of(mod_base)
                .ok_or(AlphabetError::MissingModBase(mod_base as char))?;
            let collapses_to = alphabet.collapse_alphabet()[code];
            if collapses_to != focus || mod_base == collapses_to {
                return Err(AlphabetError::ModBaseFocusMismatch {
                    base: mod_base as char,
                    collapses_to: collapses_to as char,
                    focus: focus as char,
                });
            }
        }
        let table = alphabet
            .alphabet()
            .iter()
            .map(|&symbol| {
                if symbol == focus {
                    Some(0)
                } else {
                    mod_bases
                        .iter()
                        .position(|&m| m == symbol)
                        .map(|i| i as i64 + 1)
                }
            })
            .collect();
        Ok(LabelConverter { table })
    }

    pub fn convert(&self, code: u8) -> Option<i64> {
        self.table.get(code as usize).copied().flatten()
    }

    /// Number of distinct labels the converter can produce.
    pub fn num_labels(&self) -> usize {
        let mut labels: Vec<i64> = self.table.iter().flatten().copied().collect();
        labels.sort_unstable();
        labels.dedup();
        labels.len()
    }
}
