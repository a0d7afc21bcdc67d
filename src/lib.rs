//! emocorpus - heterogeneous emotion-recognition corpus handling
//!
//! Ingests feature and label data from several incompatible storage
//! formats, normalises them into one in-memory model (fixed-length or
//! variable-length per-instance feature arrays plus integer-encoded
//! labels), and exposes the speaker, speaker-group, corpus, and sex
//! groupings needed for leakage-safe cross-validation splits.

pub mod annotations;
pub mod arrays;
pub mod backend;
pub mod corpus;
pub mod dataset;
pub mod error;
pub mod normalise;

pub use arrays::Features;
pub use corpus::{CorpusInfo, CorpusRegistry, SpeakerExtractor};
pub use dataset::{CombinedDataset, Dataset, LabelledDataset};
pub use error::{DatasetError, Result};
pub use normalise::{MinMaxScaler, NormScheme, Normaliser, StandardScaler};
