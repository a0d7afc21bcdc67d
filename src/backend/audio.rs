//! Raw-audio manifest backend.
//!
//! The manifest is a text file with one audio path per line; relative
//! paths resolve against the manifest's own directory. Every decoded clip
//! becomes one ragged instance of shape `(samples, channels)`, so the
//! corpus name is taken from the directory holding the manifest. A sibling
//! `labels.csv` restricts the dataset to labelled clips, sorted by name.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::debug;

use super::{name_stem, BackendData};
use crate::annotations;
use crate::arrays::Features;
use crate::error::{DatasetError, Result};

const LABEL_FILE: &str = "labels.csv";

/// Reads a manifest of audio clips into the common backend record.
pub fn read(path: impl AsRef<Path>) -> Result<BackendData> {
    let path = path.as_ref();
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let clip_paths = read_manifest(path, &parent)?;
    let mut names = Vec::with_capacity(clip_paths.len());
    let mut clips = Vec::with_capacity(clip_paths.len());
    for clip_path in &clip_paths {
        names.push(name_stem(clip_path));
        clips.push(decode_wav(clip_path)?);
    }

    let corpus = parent
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DatasetError::MissingMetadata {
            path: path.to_path_buf(),
            field: "corpus directory",
        })?;

    let label_file = parent.join(LABEL_FILE);
    let labels = if label_file.exists() {
        let annotations = annotations::parse_classification(&label_file)?;

        // Keep only annotated clips, sorted by name, re-slicing the
        // decoded audio together with the names.
        let mut keep: Vec<(String, Array2<f32>)> = names
            .into_iter()
            .zip(clips)
            .filter(|(name, _)| annotations.contains_key(name))
            .collect();
        keep.sort_by(|a, b| a.0.cmp(&b.0));

        names = keep.iter().map(|(name, _)| name.clone()).collect();
        clips = keep.into_iter().map(|(_, clip)| clip).collect();
        Some(
            names
                .iter()
                .map(|name| annotations[name].clone())
                .collect(),
        )
    } else {
        None
    };

    debug!(%corpus, instances = names.len(), "read raw audio dataset");
    Ok(BackendData {
        corpus,
        names,
        features: Features::Ragged(clips),
        labels,
        feature_names: vec!["pcm".to_string()],
    })
}

fn read_manifest(path: &Path, parent: &Path) -> Result<Vec<PathBuf>> {
    let contents = std::fs::read_to_string(path)?;
    let mut paths = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let clip = PathBuf::from(line);
        paths.push(if clip.is_absolute() {
            clip
        } else {
            parent.join(clip)
        });
    }
    if paths.is_empty() {
        return Err(DatasetError::parse(path, "manifest lists no audio files"));
    }
    Ok(paths)
}

/// Decodes a WAV file to a `(samples, channels)` matrix of f32 in [-1, 1].
fn decode_wav(path: &Path) -> Result<Array2<f32>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let frames = samples.len() / channels;
    Ok(Array2::from_shape_vec((frames, channels), samples)?)
}
