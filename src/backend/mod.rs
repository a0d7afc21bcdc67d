//! Storage backends: format-specific readers producing one common record.
//!
//! Format selection happens here and only here, by file extension. The
//! rest of the crate never inspects paths to decide how data is shaped.

pub mod audio;
pub mod container;
pub mod tabular;

use std::path::Path;

use crate::arrays::Features;
use crate::error::{DatasetError, Result};

/// The canonical output of every backend.
#[derive(Debug, Clone)]
pub struct BackendData {
    /// Corpus identifier carried by the source.
    pub corpus: String,
    /// Unique instance names, one per instance.
    pub names: Vec<String>,
    /// Feature data, aligned with `names`.
    pub features: Features,
    /// Nominal labels aligned with `names`, when the source carries any.
    pub labels: Option<Vec<String>>,
    /// Names of the feature dimensions.
    pub feature_names: Vec<String>,
}

/// Reads a dataset file, dispatching on its extension.
///
/// `.json` is the self-describing container format, `.txt` a raw-audio
/// manifest, `.arff` the attribute-relation text format.
pub fn read(path: impl AsRef<Path>) -> Result<BackendData> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => container::read(path),
        Some("txt") => audio::read(path),
        Some("arff") => tabular::read(path),
        _ => Err(DatasetError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Derives an instance name from a file path (the stem, without extension).
pub(crate) fn name_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
