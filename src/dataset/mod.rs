//! Dataset layers: plain, labelled, and combined.

mod combined;
mod labelled;

pub use combined::CombinedDataset;
pub use labelled::LabelledDataset;

use std::fmt::{Display, Formatter};
use std::path::Path;

use tracing::{info, warn};

use crate::arrays::Features;
use crate::backend::{self, BackendData};
use crate::corpus::CorpusRegistry;
use crate::error::{DatasetError, Result};
use crate::normalise::{self, NormScheme, Normaliser};

/// One corpus worth of instances with their speaker metadata.
///
/// Every per-instance array (`names`, `x`, `speaker_indices`,
/// `speaker_group_indices`) has the same length, and index i refers to the
/// same instance in each of them. Mutations preserve this alignment.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub(crate) corpus: String,
    pub(crate) names: Vec<String>,
    pub(crate) feature_names: Vec<String>,
    pub(crate) x: Features,
    pub(crate) speakers: Vec<String>,
    pub(crate) speaker_indices: Vec<usize>,
    pub(crate) speaker_counts: Vec<usize>,
    pub(crate) male_speakers: Vec<String>,
    pub(crate) female_speakers: Vec<String>,
    pub(crate) speaker_groups: Vec<Vec<String>>,
    pub(crate) speaker_group_indices: Vec<usize>,
}

impl Dataset {
    /// Reads a dataset file and derives its speaker metadata from the
    /// registry entry matching the file's corpus name.
    pub fn load(path: impl AsRef<Path>, registry: &CorpusRegistry) -> Result<Self> {
        let data = backend::read(path)?;
        Self::from_backend(data, registry)
    }

    /// Builds a dataset from an already-read backend record.
    pub fn from_backend(data: BackendData, registry: &CorpusRegistry) -> Result<Self> {
        let (dataset, _labels) = Self::build(data, registry)?;
        Ok(dataset)
    }

    /// Shared construction path; hands back the backend labels so the
    /// labelled layer can encode them.
    pub(crate) fn build(
        data: BackendData,
        registry: &CorpusRegistry,
    ) -> Result<(Self, Option<Vec<String>>)> {
        let BackendData {
            corpus,
            names,
            features: x,
            labels,
            feature_names,
        } = data;
        let info = registry.get(&corpus)?;

        let mut speaker_indices = Vec::with_capacity(names.len());
        for name in &names {
            let speaker = info.speaker_extractor.extract(name);
            let index = info
                .speakers
                .iter()
                .position(|s| s == speaker)
                .ok_or_else(|| DatasetError::UnknownSpeaker {
                    speaker: speaker.to_string(),
                    name: name.clone(),
                    corpus: corpus.clone(),
                })?;
            speaker_indices.push(index);
        }

        let speaker_counts = bincount(&speaker_indices, info.speakers.len());
        if speaker_counts.iter().any(|&c| c == 0) {
            warn!(%corpus, "some speakers have no corresponding instances");
        }

        let speaker_groups = info.effective_speaker_groups();
        let mut group_of_speaker = Vec::with_capacity(info.speakers.len());
        for speaker in &info.speakers {
            let group = speaker_groups
                .iter()
                .position(|g| g.contains(speaker))
                .ok_or_else(|| DatasetError::UnknownSpeaker {
                    speaker: speaker.clone(),
                    name: "<speaker group>".into(),
                    corpus: corpus.clone(),
                })?;
            group_of_speaker.push(group);
        }
        let speaker_group_indices = speaker_indices
            .iter()
            .map(|&s| group_of_speaker[s])
            .collect();

        let dataset = Dataset {
            corpus,
            names,
            feature_names,
            x,
            speakers: info.speakers.clone(),
            speaker_indices,
            speaker_counts,
            male_speakers: info.male_speakers.clone(),
            female_speakers: info.female_speakers.clone(),
            speaker_groups,
            speaker_group_indices,
        };
        Ok((dataset, labels))
    }

    /// Fits a transform over the requested grouping and applies it to `x`
    /// in place. Instance count and order never change.
    pub fn normalise(&mut self, normaliser: &mut dyn Normaliser, scheme: NormScheme) -> Result<()> {
        if scheme == NormScheme::Corpus {
            return Err(DatasetError::InvalidScheme(scheme));
        }
        info!(
            scheme = scheme.as_str(),
            normaliser = normaliser.name(),
            "normalising dataset"
        );
        match scheme {
            NormScheme::Speaker => {
                for speaker in 0..self.speakers.len() {
                    if self.speaker_counts[speaker] == 0 {
                        continue;
                    }
                    let indices = indices_where(&self.speaker_indices, speaker);
                    normalise::normalise_subset(&mut self.x, &indices, normaliser)?;
                }
                Ok(())
            }
            _ => normalise::normalise_all(&mut self.x, normaliser),
        }
    }

    /// Pads every sequence to the next multiple of `pad`.
    pub fn pad_arrays(&mut self, pad: usize) -> Result<()> {
        info!(pad, "padding sequence lengths to the next multiple");
        self.x.pad_time(pad)
    }

    /// Truncates every sequence to at most `length` rows.
    pub fn clip_arrays(&mut self, length: usize) -> Result<()> {
        info!(length, "clipping sequences to maximum length");
        self.x.clip_time(length)
    }

    /// Re-derives overlapping frames from raw signal instances.
    pub fn frame_arrays(
        &mut self,
        frame_size: usize,
        frame_shift: usize,
        num_frames: Option<usize>,
    ) -> Result<()> {
        info!(frame_size, frame_shift, "framing raw signals");
        self.x.frame_signal(frame_size, frame_shift, num_frames)?;
        self.feature_names = (1..=frame_size).map(|i| format!("sample_{i}")).collect();
        Ok(())
    }

    /// Swaps the time and feature axes of every instance.
    pub fn transpose_time(&mut self) -> Result<()> {
        info!("transposing time and feature axes");
        self.x.transpose_time()?;
        Ok(())
    }

    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_instances(&self) -> usize {
        self.names.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn x(&self) -> &Features {
        &self.x
    }

    pub fn speakers(&self) -> &[String] {
        &self.speakers
    }

    /// Index into `speakers` for each instance.
    pub fn speaker_indices(&self) -> &[usize] {
        &self.speaker_indices
    }

    /// Instance count per speaker; always `speakers().len()` entries.
    pub fn speaker_counts(&self) -> &[usize] {
        &self.speaker_counts
    }

    pub fn speaker_groups(&self) -> &[Vec<String>] {
        &self.speaker_groups
    }

    /// Index into `speaker_groups` for each instance.
    pub fn speaker_group_indices(&self) -> &[usize] {
        &self.speaker_group_indices
    }

    pub fn male_speakers(&self) -> &[String] {
        &self.male_speakers
    }

    pub fn female_speakers(&self) -> &[String] {
        &self.female_speakers
    }

    /// Instances spoken by a declared male speaker. Derived on demand so
    /// filtering mutations can never leave it stale.
    pub fn male_indices(&self) -> Vec<usize> {
        self.sex_indices(&self.male_speakers)
    }

    /// Instances spoken by a declared female speaker.
    pub fn female_indices(&self) -> Vec<usize> {
        self.sex_indices(&self.female_speakers)
    }

    fn sex_indices(&self, subset: &[String]) -> Vec<usize> {
        if self.male_speakers.is_empty() || self.female_speakers.is_empty() {
            return Vec::new();
        }
        let members: Vec<usize> = self
            .speakers
            .iter()
            .enumerate()
            .filter(|&(_, s)| subset.contains(s))
            .map(|(i, _)| i)
            .collect();
        self.speaker_indices
            .iter()
            .enumerate()
            .filter(|&(_, s)| members.contains(s))
            .map(|(i, _)| i)
            .collect()
    }

    /// Drops all instances except those at `keep`, re-slicing every
    /// per-instance array together.
    pub(crate) fn retain_instances(&mut self, keep: &[usize]) {
        let x = self.x.select(keep);
        let names = keep.iter().map(|&i| self.names[i].clone()).collect();
        let speaker_indices: Vec<usize> = keep.iter().map(|&i| self.speaker_indices[i]).collect();
        let speaker_group_indices = keep
            .iter()
            .map(|&i| self.speaker_group_indices[i])
            .collect();

        self.speaker_counts = bincount(&speaker_indices, self.speakers.len());
        self.x = x;
        self.names = names;
        self.speaker_indices = speaker_indices;
        self.speaker_group_indices = speaker_group_indices;
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Corpus: {}", self.corpus)?;
        writeln!(f, "{} instances", self.n_instances())?;
        writeln!(f, "{} features", self.n_features())?;
        writeln!(f, "{} speakers:", self.speakers.len())?;
        writeln!(f, "\t{}", histogram(&self.speakers, &self.speaker_counts))?;
        if let Some(lengths) = self.x.sequence_lengths() {
            let min = lengths.iter().min().copied().unwrap_or(0);
            let max = lengths.iter().max().copied().unwrap_or(0);
            let mean = lengths.iter().sum::<usize>() as f64 / lengths.len().max(1) as f64;
            writeln!(f, "Sequences:")?;
            writeln!(f, "min length: {min}")?;
            writeln!(f, "mean length: {mean:.1}")?;
            writeln!(f, "max length: {max}")?;
        }
        Ok(())
    }
}

pub(crate) fn bincount(indices: &[usize], len: usize) -> Vec<usize> {
    let mut counts = vec![0; len];
    for &i in indices {
        counts[i] += 1;
    }
    counts
}

pub(crate) fn indices_where(haystack: &[usize], wanted: usize) -> Vec<usize> {
    haystack
        .iter()
        .enumerate()
        .filter(|(_, &v)| v == wanted)
        .map(|(i, _)| i)
        .collect()
}

pub(crate) fn histogram(keys: &[impl AsRef<str>], counts: &[usize]) -> String {
    let entries: Vec<String> = keys
        .iter()
        .zip(counts)
        .map(|(k, c)| format!("{}: {}", k.as_ref(), c))
        .collect();
    format!("{{{}}}", entries.join(", "))
}
