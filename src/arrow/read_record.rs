use arrow2::datatypes::{Field, Schema};
use arrow2_convert::{field::ArrowField, ArrowDeserialize, ArrowField, ArrowSerialize};

use crate::{
    alphabet::Alphabet,
    read::{Read, ReadError},
};

/// A single read from a mapped signal file. `ref_to_signal` holds the
/// signal position of each reference base plus the end of the last one, in
/// raw signal coordinates.
#[derive(Debug, Clone, PartialEq, Default, ArrowField, ArrowSerialize, ArrowDeserialize)]
pub struct ReadRecord {
    pub read_id: String,
    pub signal: Vec<f32>,
    pub int_seq: Vec<u8>,
    pub ref_to_signal: Vec<u64>,
    pub labeled: bool,
}

impl ReadRecord {
    pub fn new(
        read_id: String,
        signal: Vec<f32>,
        int_seq: Vec<u8>,
        ref_to_signal: Vec<u64>,
        labeled: bool,
    ) -> Self {
        Self {
            read_id,
            signal,
            int_seq,
            ref_to_signal,
            labeled,
        }
    }

    /// Schema used for outputing into Arrow file
    pub fn schema() -> Schema {
        let data_type = Self::data_type();
        Schema::from(vec![Field::new("read", data_type, false)])
    }

    pub fn into_read(self, alphabet: &Alphabet) -> Result<Read, ReadError> {
        Read::from_mapped(
            self.read_id,
            &self.signal,
            self.int_seq,
            &self.ref_to_signal,
            alphabet,
            self.labeled,
        )
    }
}
