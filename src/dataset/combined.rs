//! Merging several labelled corpora into one dataset.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use ndarray::{concatenate, Axis};
use tracing::info;

use super::{bincount, histogram, indices_where, Dataset, LabelledDataset};
use crate::arrays::Features;
use crate::error::{DatasetError, Result};
use crate::normalise::{self, NormScheme, Normaliser};

/// Several labelled corpora merged into one index space.
///
/// Construction copies the source arrays; the sources and the combined
/// dataset never alias, so mutating one after the merge cannot affect the
/// other. Speakers and speaker groups are namespaced with their corpus
/// name to keep identifiers unique across sources.
#[derive(Debug, Clone)]
pub struct CombinedDataset {
    inner: LabelledDataset,
    corpora: Vec<String>,
    corpus_indices: Vec<usize>,
    corpus_counts: Vec<usize>,
}

impl CombinedDataset {
    /// Merges `datasets` in order. `keep_labels`, when given, restricts
    /// the result to instances of those classes and fixes the combined
    /// taxonomy to exactly that (sorted) list; otherwise the taxonomy is
    /// the sorted union of the source taxonomies.
    pub fn new(datasets: &[LabelledDataset], keep_labels: Option<&[String]>) -> Result<Self> {
        if datasets.is_empty() {
            return Err(DatasetError::Incompatible("no source datasets".into()));
        }
        let corpora: Vec<String> = datasets.iter().map(|d| d.corpus().to_string()).collect();
        info!(corpora = ?corpora, "combining datasets");

        let prefixed = |corpus: &str, s: &str| format!("{corpus}_{s}");

        let mut names = Vec::new();
        let mut corpus_indices = Vec::new();
        let mut speakers = Vec::new();
        let mut speaker_indices = Vec::new();
        let mut speaker_groups: Vec<Vec<String>> = Vec::new();
        let mut speaker_group_indices = Vec::new();
        let mut male_speakers = Vec::new();
        let mut female_speakers = Vec::new();
        let mut labels: Vec<String> = Vec::new();

        for (source, d) in datasets.iter().enumerate() {
            let corpus = d.corpus();
            names.extend(d.names().iter().map(|n| prefixed(corpus, n)));
            corpus_indices.extend(std::iter::repeat(source).take(d.n_instances()));

            let speaker_offset = speakers.len();
            speaker_indices.extend(d.speaker_indices().iter().map(|&i| i + speaker_offset));
            speakers.extend(d.speakers().iter().map(|s| prefixed(corpus, s)));

            let group_offset = speaker_groups.len();
            speaker_group_indices.extend(
                d.speaker_group_indices()
                    .iter()
                    .map(|&i| i + group_offset),
            );
            speaker_groups.extend(
                d.speaker_groups()
                    .iter()
                    .map(|g| g.iter().map(|s| prefixed(corpus, s)).collect()),
            );

            male_speakers.extend(d.base().male_speakers().iter().map(|s| prefixed(corpus, s)));
            female_speakers.extend(
                d.base()
                    .female_speakers()
                    .iter()
                    .map(|s| prefixed(corpus, s)),
            );

            labels.extend(d.y().iter().map(|&v| d.classes()[v].clone()));
        }

        let mut x = merge_features(datasets)?;

        let classes: Vec<String> = match keep_labels {
            Some(keep) => {
                let mut keep: Vec<String> = keep.to_vec();
                keep.sort();
                keep.dedup();
                keep
            }
            None => {
                let mut all: Vec<String> = datasets
                    .iter()
                    .flat_map(|d| d.classes().iter().cloned())
                    .collect();
                all.sort();
                all.dedup();
                all
            }
        };

        if keep_labels.is_some() {
            let keep_idx: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|&(_, l)| classes.contains(l))
                .map(|(i, _)| i)
                .collect();
            x = x.select(&keep_idx);
            names = keep_idx.iter().map(|&i| names[i].clone()).collect();
            corpus_indices = keep_idx.iter().map(|&i| corpus_indices[i]).collect();
            speaker_indices = keep_idx.iter().map(|&i| speaker_indices[i]).collect();
            speaker_group_indices = keep_idx
                .iter()
                .map(|&i| speaker_group_indices[i])
                .collect();
            labels = keep_idx.iter().map(|&i| labels[i].clone()).collect();
        }

        let mut y = Vec::with_capacity(labels.len());
        for label in &labels {
            let index = classes.iter().position(|c| c == label).ok_or_else(|| {
                DatasetError::UnknownClass {
                    label: label.clone(),
                    corpus: "combined".into(),
                }
            })?;
            y.push(index);
        }

        let speaker_counts = bincount(&speaker_indices, speakers.len());
        let class_counts = bincount(&y, classes.len());
        let corpus_counts = bincount(&corpus_indices, corpora.len());

        let base = Dataset {
            corpus: "combined".into(),
            names,
            feature_names: datasets[0].base().feature_names().to_vec(),
            x,
            speakers,
            speaker_indices,
            speaker_counts,
            male_speakers,
            female_speakers,
            speaker_groups,
            speaker_group_indices,
        };
        Ok(Self {
            inner: LabelledDataset {
                base,
                classes,
                y,
                class_counts,
                label_sets: HashMap::new(),
            },
            corpora,
            corpus_indices,
            corpus_counts,
        })
    }

    /// The source corpus names, in merge order.
    pub fn corpora(&self) -> &[String] {
        &self.corpora
    }

    /// Index into `corpora` for each instance.
    pub fn corpus_indices(&self) -> &[usize] {
        &self.corpus_indices
    }

    /// Instance count per source corpus.
    pub fn corpus_counts(&self) -> &[usize] {
        &self.corpus_counts
    }

    pub fn corpus_to_index(&self, corpus: &str) -> Option<usize> {
        self.corpora.iter().position(|c| c == corpus)
    }

    /// Splits the instance index space into one corpus and its
    /// complement, for leave-one-corpus-out evaluation.
    pub fn get_corpus_split(&self, corpus: &str) -> Result<(Vec<usize>, Vec<usize>)> {
        let index = self
            .corpus_to_index(corpus)
            .ok_or_else(|| DatasetError::UnknownCorpus(corpus.into()))?;
        let inside = indices_where(&self.corpus_indices, index);
        let outside = self
            .corpus_indices
            .iter()
            .enumerate()
            .filter(|(_, &c)| c != index)
            .map(|(i, _)| i)
            .collect();
        Ok((inside, outside))
    }

    /// Like [`LabelledDataset::normalise`], with one extra scheme: per
    /// source corpus.
    pub fn normalise(&mut self, normaliser: &mut dyn Normaliser, scheme: NormScheme) -> Result<()> {
        if scheme != NormScheme::Corpus {
            return self.inner.normalise(normaliser, scheme);
        }
        info!(
            scheme = scheme.as_str(),
            normaliser = normaliser.name(),
            "normalising combined dataset"
        );
        for corpus in 0..self.corpora.len() {
            let indices = indices_where(&self.corpus_indices, corpus);
            normalise::normalise_subset(&mut self.inner.base.x, &indices, normaliser)?;
        }
        Ok(())
    }

    pub fn binarise(&mut self, pos_valence: &[String], pos_arousal: &[String]) {
        self.inner.binarise(pos_valence, pos_arousal)
    }

    pub fn pad_arrays(&mut self, pad: usize) -> Result<()> {
        self.inner.pad_arrays(pad)
    }

    pub fn clip_arrays(&mut self, length: usize) -> Result<()> {
        self.inner.clip_arrays(length)
    }

    pub fn frame_arrays(
        &mut self,
        frame_size: usize,
        frame_shift: usize,
        num_frames: Option<usize>,
    ) -> Result<()> {
        self.inner.frame_arrays(frame_size, frame_shift, num_frames)
    }

    pub fn transpose_time(&mut self) -> Result<()> {
        self.inner.transpose_time()
    }

    pub fn classes(&self) -> &[String] {
        self.inner.classes()
    }

    pub fn y(&self) -> &[usize] {
        self.inner.y()
    }

    pub fn class_counts(&self) -> &[usize] {
        self.inner.class_counts()
    }

    pub fn x(&self) -> &Features {
        self.inner.x()
    }

    pub fn names(&self) -> &[String] {
        self.inner.names()
    }

    pub fn n_instances(&self) -> usize {
        self.inner.n_instances()
    }

    pub fn speakers(&self) -> &[String] {
        self.inner.speakers()
    }

    pub fn speaker_indices(&self) -> &[usize] {
        self.inner.speaker_indices()
    }

    pub fn speaker_group_indices(&self) -> &[usize] {
        self.inner.speaker_group_indices()
    }

    pub fn label_sets(&self) -> &HashMap<String, Vec<u8>> {
        self.inner.label_sets()
    }
}

/// Concatenates source feature arrays, preserving a rectangular layout
/// when every source shares it and falling back to ragged otherwise.
fn merge_features(datasets: &[LabelledDataset]) -> Result<Features> {
    let n_features = datasets[0].n_features();
    if let Some(odd) = datasets.iter().find(|d| d.n_features() != n_features) {
        return Err(DatasetError::Incompatible(format!(
            "corpus '{}' has {} features, expected {}",
            odd.corpus(),
            odd.n_features(),
            n_features
        )));
    }

    let all_vectors = datasets
        .iter()
        .all(|d| matches!(d.x(), Features::Vectors(_)));
    if all_vectors {
        let views: Vec<_> = datasets
            .iter()
            .filter_map(|d| match d.x() {
                Features::Vectors(x) => Some(x.view()),
                _ => None,
            })
            .collect();
        return Ok(Features::Vectors(concatenate(Axis(0), &views)?));
    }

    if datasets.iter().any(|d| !d.x().is_sequence()) {
        return Err(DatasetError::Incompatible(
            "cannot merge vector data with sequence data".into(),
        ));
    }

    let tensors: Vec<_> = datasets
        .iter()
        .filter_map(|d| match d.x() {
            Features::Sequences(x) => Some(x),
            _ => None,
        })
        .collect();
    if tensors.len() == datasets.len() {
        let t0 = tensors[0].len_of(Axis(1));
        if tensors.iter().all(|t| t.len_of(Axis(1)) == t0) {
            let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();
            return Ok(Features::Sequences(concatenate(Axis(0), &views)?));
        }
    }

    let mut ragged = Vec::new();
    for d in datasets {
        for i in 0..d.n_instances() {
            ragged.push(d.x().instance(i));
        }
    }
    Ok(Features::Ragged(ragged))
}

impl Display for CombinedDataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)?;
        writeln!(f, "{} corpora:", self.corpora.len())?;
        writeln!(f, "\t{}", histogram(&self.corpora, &self.corpus_counts))?;
        Ok(())
    }
}
