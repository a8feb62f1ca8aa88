pub mod alphabet;
pub mod arrow;
pub mod chunk;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod extract;
pub mod infer;
pub mod motif;
pub mod read;
pub mod utils;

pub use alphabet::{Alphabet, LabelConverter};
pub use chunk::{Chunk, KmerContext};
pub use dataset::{BatchOptions, Dataset, DatasetMetadata, Splits};
pub use extract::{CallMode, ChunkWindow, ExtractOptions, RejectCounts, SiteSelection};
pub use motif::Motif;
pub use read::Read;
