use std::path::PathBuf;

use thiserror::Error;

use crate::normalise::NormScheme;

/// Convenient alias for results returned by dataset modules.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Errors raised while reading, constructing, or mutating datasets.
///
/// All construction-time errors are fatal: no partially built dataset is
/// ever returned.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("unsupported dataset format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("dataset at {path:?} is missing required metadata field '{field}'")]
    MissingMetadata { path: PathBuf, field: &'static str },

    #[error("corpus '{0}' is not present in the corpus registry")]
    UnknownCorpus(String),

    #[error("label '{label}' is not in the declared taxonomy of corpus '{corpus}'")]
    UnknownClass { label: String, corpus: String },

    #[error("speaker '{speaker}' of instance '{name}' is not declared for corpus '{corpus}'")]
    UnknownSpeaker {
        speaker: String,
        name: String,
        corpus: String,
    },

    #[error("invalid slice vector: {0}")]
    InvalidSlices(String),

    #[error("operation requires sequence data, but features are one vector per instance")]
    NoTimeAxis,

    #[error("framing requires single-channel signal instances, found {0} feature columns")]
    NotSignalData(usize),

    #[error("scheme {0:?} is only valid for combined datasets")]
    InvalidScheme(NormScheme),

    #[error("datasets cannot be combined: {0}")]
    Incompatible(String),

    #[error("failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

impl DatasetError {
    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
