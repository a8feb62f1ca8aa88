use thiserror::Error;

/// Why a chunk window could not be placed on a read.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowReason {
    #[error("Invalid signal start")]
    SignalStart,
    #[error("Invalid signal end")]
    SignalEnd,
    #[error("Empty signal")]
    EmptySignal,
    #[error("Invalid base start")]
    BaseStart,
    #[error("Invalid base end")]
    BaseEnd,
    #[error("Focus base outside of chunk")]
    FocusOutside,
}

/// Reasons a single chunk is rejected. These are counted, never fatal, and
/// the message doubles as the key in the rejection summary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    #[error("No signal for chunk")]
    EmptySignal,
    #[error("Invalid encoded sig length")]
    FeatureLengthMismatch,
    #[error("Invalid sig to seq map length")]
    MapLengthMismatch,
    #[error("Invalid context seq extracted")]
    InsufficientContext,
    #[error("{0}")]
    InvalidWindow(WindowReason),
    #[error("Focus position motif mismatch")]
    MotifMismatch,
    #[error("Focus offset past read seq")]
    FocusOffsetPastRead,
    #[error("Label not in training targets")]
    IrrelevantLabel,
}

impl From<WindowReason> for ChunkError {
    fn from(reason: WindowReason) -> Self {
        ChunkError::InvalidWindow(reason)
    }
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("No valid chunks extracted")]
    NoValidChunks,
    #[error("Too few chunks to extract validation proportion ({available} < {required})")]
    InsufficientValidationData { available: usize, required: usize },
    #[error("Validation proportion must be a number less than 1, found {0}")]
    InvalidValidationProportion(f64),
    #[error(
        "One or fewer output labels found ({0:?}). Ensure the focus position and modified bases are specified correctly"
    )]
    DegenerateLabelSpace(Vec<i64>),
    #[error("{0} chunks have no label and cannot be used for training")]
    UnlabeledChunks(usize),
    #[error("Cannot expand {what} from {current:?} to {requested:?}")]
    InvalidContextExpansion {
        what: &'static str,
        current: (usize, usize),
        requested: (usize, usize),
    },
    #[error("Chunk context can only be trimmed for fixed signal length chunks")]
    UnsupportedTrim,
    #[error("Invalid dataset: {0}")]
    CorruptDataset(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pickle(#[from] serde_pickle::Error),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}
