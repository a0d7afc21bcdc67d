//! Datasets carrying a discrete label per instance.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::path::Path;

use tracing::info;

use super::{bincount, histogram, Dataset};
use crate::arrays::Features;
use crate::backend::{self, BackendData};
use crate::corpus::CorpusRegistry;
use crate::error::{DatasetError, Result};
use crate::normalise::{NormScheme, Normaliser};

/// A [`Dataset`] plus an integer-encoded label per instance.
///
/// `classes` is the ordered taxonomy; `y[i]` always indexes into it and
/// `class_counts` always has one entry per class.
#[derive(Debug, Clone)]
pub struct LabelledDataset {
    pub(crate) base: Dataset,
    pub(crate) classes: Vec<String>,
    pub(crate) y: Vec<usize>,
    pub(crate) class_counts: Vec<usize>,
    pub(crate) label_sets: HashMap<String, Vec<u8>>,
}

impl LabelledDataset {
    /// Reads a labelled dataset file; the backend must supply labels.
    pub fn load(path: impl AsRef<Path>, registry: &CorpusRegistry) -> Result<Self> {
        let path = path.as_ref();
        let data = backend::read(path)?;
        if data.labels.is_none() {
            return Err(DatasetError::MissingMetadata {
                path: path.to_path_buf(),
                field: "labels",
            });
        }
        Self::from_backend(data, registry)
    }

    /// Builds a labelled dataset from an already-read backend record.
    pub fn from_backend(data: BackendData, registry: &CorpusRegistry) -> Result<Self> {
        let corpus = data.corpus.clone();
        let info = registry.get(&corpus)?;
        let classes = info.classes.clone();

        let (base, labels) = Dataset::build(data, registry)?;
        let labels = labels.ok_or_else(|| DatasetError::MissingMetadata {
            path: corpus.clone().into(),
            field: "labels",
        })?;

        let info = registry.get(&corpus)?;
        let mut y = Vec::with_capacity(labels.len());
        for label in &labels {
            let class = info.class_name(label);
            let index = classes
                .iter()
                .position(|c| c == class)
                .ok_or_else(|| DatasetError::UnknownClass {
                    label: label.clone(),
                    corpus: corpus.clone(),
                })?;
            y.push(index);
        }

        let class_counts = bincount(&y, classes.len());
        Ok(Self {
            base,
            classes,
            y,
            class_counts,
            label_sets: HashMap::new(),
        })
    }

    /// Builds one binary indicator vector per class, plus `arousal` and
    /// `valence` vectors when both positive-class lists are non-empty.
    pub fn binarise(&mut self, pos_valence: &[String], pos_arousal: &[String]) {
        for (index, class) in self.classes.iter().enumerate() {
            let indicator = self.y.iter().map(|&v| u8::from(v == index)).collect();
            self.label_sets.insert(class.clone(), indicator);
        }

        if !pos_valence.is_empty() && !pos_arousal.is_empty() {
            info!("binarising arousal and valence");
            let arousal_map: Vec<u8> = self
                .classes
                .iter()
                .map(|c| u8::from(pos_arousal.contains(c)))
                .collect();
            let valence_map: Vec<u8> = self
                .classes
                .iter()
                .map(|c| u8::from(pos_valence.contains(c)))
                .collect();
            self.label_sets.insert(
                "arousal".into(),
                self.y.iter().map(|&v| arousal_map[v]).collect(),
            );
            self.label_sets.insert(
                "valence".into(),
                self.y.iter().map(|&v| valence_map[v]).collect(),
            );
        }
    }

    /// Renames and merges classes. Classes absent from the mapping keep
    /// their name; the result is deduplicated and sorted. No instance is
    /// added or removed.
    pub fn map_classes(&mut self, mapping: &HashMap<String, String>) {
        info!(renames = mapping.len(), "mapping class names");
        let renamed = |class: &String| mapping.get(class).unwrap_or(class).clone();

        let mut new_classes: Vec<String> = self.classes.iter().map(renamed).collect();
        new_classes.sort();
        new_classes.dedup();

        let old_to_new: Vec<usize> = self
            .classes
            .iter()
            .map(|c| {
                let target = renamed(c);
                new_classes.iter().position(|n| *n == target).unwrap_or(0)
            })
            .collect();
        for value in &mut self.y {
            *value = old_to_new[*value];
        }
        self.classes = new_classes;
        self.class_counts = bincount(&self.y, self.classes.len());
        self.label_sets.clear();
    }

    /// Removes every instance whose class is not in `keep`, re-slicing
    /// all per-instance arrays together. The class list becomes the
    /// sorted intersection of `keep` and the current classes.
    pub fn remove_classes<S: AsRef<str>>(&mut self, keep: &[S]) {
        let keep: HashSet<&str> = keep.iter().map(AsRef::as_ref).collect();
        info!(kept = keep.len(), "removing instances of dropped classes");

        let old_names: Vec<String> = self.y.iter().map(|&v| self.classes[v].clone()).collect();
        let keep_idx: Vec<usize> = old_names
            .iter()
            .enumerate()
            .filter(|(_, name)| keep.contains(name.as_str()))
            .map(|(i, _)| i)
            .collect();

        self.base.retain_instances(&keep_idx);

        let mut classes: Vec<String> = self
            .classes
            .iter()
            .filter(|c| keep.contains(c.as_str()))
            .cloned()
            .collect();
        classes.sort();

        self.y = keep_idx
            .iter()
            .map(|&i| {
                let name = &old_names[i];
                classes
                    .iter()
                    .position(|c| c == name)
                    .unwrap_or(0)
            })
            .collect();
        self.classes = classes;
        self.class_counts = bincount(&self.y, self.classes.len());
        self.label_sets.clear();
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Class index per instance.
    pub fn y(&self) -> &[usize] {
        &self.y
    }

    /// Instance count per class; always `n_classes()` entries.
    pub fn class_counts(&self) -> &[usize] {
        &self.class_counts
    }

    /// Binary label vectors built by [`binarise`](Self::binarise), keyed
    /// by class name plus `arousal` / `valence`.
    pub fn label_sets(&self) -> &HashMap<String, Vec<u8>> {
        &self.label_sets
    }

    /// Index of a class name within the taxonomy.
    pub fn class_to_index(&self, class: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == class)
    }

    pub fn base(&self) -> &Dataset {
        &self.base
    }

    // Delegations to the unlabelled layer.

    pub fn normalise(&mut self, normaliser: &mut dyn Normaliser, scheme: NormScheme) -> Result<()> {
        self.base.normalise(normaliser, scheme)
    }

    pub fn pad_arrays(&mut self, pad: usize) -> Result<()> {
        self.base.pad_arrays(pad)
    }

    pub fn clip_arrays(&mut self, length: usize) -> Result<()> {
        self.base.clip_arrays(length)
    }

    pub fn frame_arrays(
        &mut self,
        frame_size: usize,
        frame_shift: usize,
        num_frames: Option<usize>,
    ) -> Result<()> {
        self.base.frame_arrays(frame_size, frame_shift, num_frames)
    }

    pub fn transpose_time(&mut self) -> Result<()> {
        self.base.transpose_time()
    }

    pub fn corpus(&self) -> &str {
        self.base.corpus()
    }

    pub fn names(&self) -> &[String] {
        self.base.names()
    }

    pub fn n_instances(&self) -> usize {
        self.base.n_instances()
    }

    pub fn n_features(&self) -> usize {
        self.base.n_features()
    }

    pub fn x(&self) -> &Features {
        self.base.x()
    }

    pub fn speakers(&self) -> &[String] {
        self.base.speakers()
    }

    pub fn speaker_indices(&self) -> &[usize] {
        self.base.speaker_indices()
    }

    pub fn speaker_counts(&self) -> &[usize] {
        self.base.speaker_counts()
    }

    pub fn speaker_group_indices(&self) -> &[usize] {
        self.base.speaker_group_indices()
    }

    pub fn speaker_groups(&self) -> &[Vec<String>] {
        self.base.speaker_groups()
    }
}

impl Display for LabelledDataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.base.fmt(f)?;
        writeln!(f, "{} classes:", self.n_classes())?;
        writeln!(f, "\t{}", histogram(&self.classes, &self.class_counts))?;
        Ok(())
    }
}
