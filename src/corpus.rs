//! Corpus metadata: speakers, speaker groups, and label taxonomies.
//!
//! A dataset file carries only a corpus name; everything about that corpus
//! (its speakers, how to read a speaker out of an instance name, its label
//! taxonomy) comes from a [`CorpusRegistry`] supplied alongside.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DatasetError, Result};

/// How to derive a speaker identifier from an instance name.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeakerExtractor {
    /// The first `chars` characters of the name.
    Prefix { chars: usize },
    /// Field `index` after splitting the name on `separator`.
    Field { separator: String, index: usize },
    /// The whole instance name is the speaker identifier.
    FullName,
}

impl SpeakerExtractor {
    pub fn extract<'a>(&self, name: &'a str) -> &'a str {
        match self {
            SpeakerExtractor::Prefix { chars } => {
                let end = name
                    .char_indices()
                    .nth(*chars)
                    .map(|(i, _)| i)
                    .unwrap_or(name.len());
                &name[..end]
            }
            SpeakerExtractor::Field { separator, index } => name
                .split(separator.as_str())
                .nth(*index)
                .unwrap_or(name),
            SpeakerExtractor::FullName => name,
        }
    }
}

impl Default for SpeakerExtractor {
    fn default() -> Self {
        SpeakerExtractor::FullName
    }
}

/// Static description of one corpus.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusInfo {
    /// Ordered list of speaker identifiers.
    pub speakers: Vec<String>,
    /// Male speaker subset; empty when sex metadata is unknown.
    #[serde(default)]
    pub male_speakers: Vec<String>,
    /// Female speaker subset; empty when sex metadata is unknown.
    #[serde(default)]
    pub female_speakers: Vec<String>,
    /// Partition of `speakers` used for group-aware cross-validation.
    /// Defaults to one singleton group per speaker.
    #[serde(default)]
    pub speaker_groups: Vec<Vec<String>>,
    /// Ordered class taxonomy for labelled data.
    pub classes: Vec<String>,
    /// Raw-label renames applied before taxonomy lookup.
    #[serde(default)]
    pub label_map: HashMap<String, String>,
    /// How instance names map to speakers.
    #[serde(default)]
    pub speaker_extractor: SpeakerExtractor,
}

impl CorpusInfo {
    /// Resolves a raw backend label to its class name.
    pub fn class_name<'a>(&'a self, label: &'a str) -> &'a str {
        self.label_map.get(label).map(String::as_str).unwrap_or(label)
    }

    /// Speaker groups, falling back to one singleton group per speaker.
    pub fn effective_speaker_groups(&self) -> Vec<Vec<String>> {
        if self.speaker_groups.is_empty() {
            self.speakers.iter().map(|s| vec![s.clone()]).collect()
        } else {
            self.speaker_groups.clone()
        }
    }

    fn validate(&self, corpus: &str) -> Result<()> {
        let known = |s: &String| self.speakers.contains(s);
        for group in &self.speaker_groups {
            if let Some(stranger) = group.iter().find(|&s| !known(s)) {
                return Err(DatasetError::UnknownSpeaker {
                    speaker: stranger.clone(),
                    name: "<speaker group>".into(),
                    corpus: corpus.into(),
                });
            }
        }
        if !self.speaker_groups.is_empty() {
            for speaker in &self.speakers {
                let memberships = self
                    .speaker_groups
                    .iter()
                    .filter(|g| g.contains(speaker))
                    .count();
                if memberships != 1 {
                    return Err(DatasetError::parse(
                        corpus,
                        format!(
                            "speaker '{speaker}' appears in {memberships} speaker groups, expected 1"
                        ),
                    ));
                }
            }
        }
        for subset in [&self.male_speakers, &self.female_speakers] {
            if let Some(stranger) = subset.iter().find(|&s| !known(s)) {
                return Err(DatasetError::UnknownSpeaker {
                    speaker: stranger.clone(),
                    name: "<sex subset>".into(),
                    corpus: corpus.into(),
                });
            }
        }
        if self
            .male_speakers
            .iter()
            .any(|s| self.female_speakers.contains(s))
        {
            return Err(DatasetError::parse(
                corpus,
                "male and female speaker subsets overlap",
            ));
        }
        Ok(())
    }
}

/// Lookup from lower-cased corpus name to its metadata.
#[derive(Debug, Clone, Default)]
pub struct CorpusRegistry {
    corpora: HashMap<String, CorpusInfo>,
}

impl CorpusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry from a JSON file mapping corpus names to their
    /// metadata blocks.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let corpora: HashMap<String, CorpusInfo> = serde_json::from_reader(reader)?;
        let mut registry = Self::new();
        for (name, info) in corpora {
            registry.insert(name, info)?;
        }
        Ok(registry)
    }

    /// Registers a corpus, validating its metadata first.
    pub fn insert(&mut self, name: impl Into<String>, info: CorpusInfo) -> Result<()> {
        let name = name.into().to_lowercase();
        info.validate(&name)?;
        self.corpora.insert(name, info);
        Ok(())
    }

    /// Looks up a corpus by case-insensitive name.
    pub fn get(&self, name: &str) -> Result<&CorpusInfo> {
        self.corpora
            .get(&name.to_lowercase())
            .ok_or_else(|| DatasetError::UnknownCorpus(name.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_info() -> CorpusInfo {
        CorpusInfo {
            speakers: vec!["03".into(), "08".into()],
            male_speakers: vec!["03".into()],
            female_speakers: vec!["08".into()],
            speaker_groups: vec![vec!["03".into()], vec!["08".into()]],
            classes: vec!["anger".into(), "happiness".into()],
            label_map: HashMap::from([("W".into(), "anger".into())]),
            speaker_extractor: SpeakerExtractor::Prefix { chars: 2 },
        }
    }

    #[test]
    fn extractors_pull_speaker_from_name() {
        let prefix = SpeakerExtractor::Prefix { chars: 2 };
        assert_eq!(prefix.extract("03a01Fa"), "03");

        let field = SpeakerExtractor::Field {
            separator: "_".into(),
            index: 1,
        };
        assert_eq!(field.extract("Ses01_F023_neu"), "F023");

        assert_eq!(SpeakerExtractor::FullName.extract("jenny"), "jenny");
    }

    #[test]
    fn registry_lookup_is_case_insensitive() {
        let mut registry = CorpusRegistry::new();
        registry.insert("EmoDB", demo_info()).unwrap();
        assert!(registry.get("emodb").is_ok());
        assert!(registry.get("EMODB").is_ok());
        assert!(matches!(
            registry.get("iemocap"),
            Err(DatasetError::UnknownCorpus(_))
        ));
    }

    #[test]
    fn registry_rejects_undeclared_group_members() {
        let mut info = demo_info();
        info.speaker_groups.push(vec!["99".into()]);
        let mut registry = CorpusRegistry::new();
        assert!(matches!(
            registry.insert("emodb", info),
            Err(DatasetError::UnknownSpeaker { .. })
        ));
    }

    #[test]
    fn registry_rejects_overlapping_sex_subsets() {
        let mut info = demo_info();
        info.female_speakers.push("03".into());
        let mut registry = CorpusRegistry::new();
        assert!(registry.insert("emodb", info).is_err());
    }

    #[test]
    fn label_map_renames_raw_labels() {
        let info = demo_info();
        assert_eq!(info.class_name("W"), "anger");
        assert_eq!(info.class_name("happiness"), "happiness");
    }

    #[test]
    fn info_deserialises_from_json() {
        let raw = r#"{
            "speakers": ["03", "08"],
            "classes": ["anger", "happiness"],
            "speaker_extractor": {"kind": "prefix", "chars": 2}
        }"#;
        let info: CorpusInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(info.speakers.len(), 2);
        assert!(info.speaker_groups.is_empty());
        assert_eq!(info.effective_speaker_groups().len(), 2);
        assert_eq!(
            info.speaker_extractor,
            SpeakerExtractor::Prefix { chars: 2 }
        );
    }
}
