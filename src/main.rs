use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use emocorpus::{CombinedDataset, CorpusRegistry, LabelledDataset, NormScheme, StandardScaler};

/// emocorpus - emotion-recognition corpus inspection tool
///
/// Loads one or more dataset files, applies the requested mutations, and
/// prints a summary of each. Multiple inputs are additionally merged into
/// a combined dataset with per-corpus split sizes.
#[derive(Parser, Debug)]
#[command(name = "emocorpus")]
#[command(version)]
#[command(about = "Emotion-recognition corpus inspection tool", long_about = None)]
struct Args {
    /// Dataset files (.json container, .txt audio manifest, .arff tabular)
    #[arg(value_name = "DATASET", required = true)]
    datasets: Vec<PathBuf>,

    /// Corpus metadata registry (JSON)
    #[arg(long, value_name = "PATH")]
    corpora: PathBuf,

    /// Normalisation scheme to apply (all, speaker, or corpus)
    #[arg(long, value_name = "SCHEME")]
    scheme: Option<NormScheme>,

    /// Pad sequence lengths to the next multiple of this value
    #[arg(long, value_name = "N")]
    pad: Option<usize>,

    /// Clip sequences to this maximum length
    #[arg(long, value_name = "N")]
    clip: Option<usize>,

    /// Keep only instances of these classes (repeatable)
    #[arg(long, value_name = "CLASS")]
    keep: Vec<String>,

    /// Rename classes, e.g. --map-class excitement=happiness (repeatable)
    #[arg(long, value_name = "OLD=NEW")]
    map_class: Vec<String>,
}

impl Args {
    /// Validate CLI arguments
    fn validate(&self) -> Result<()> {
        for dataset in &self.datasets {
            if !dataset.is_file() {
                anyhow::bail!("Dataset file does not exist: {:?}", dataset);
            }
        }

        if !self.corpora.is_file() {
            anyhow::bail!("Corpus registry does not exist: {:?}", self.corpora);
        }

        if matches!(self.scheme, Some(NormScheme::Corpus)) && self.datasets.len() < 2 {
            anyhow::bail!("The corpus scheme needs at least two datasets");
        }

        Ok(())
    }

    fn class_mapping(&self) -> Result<HashMap<String, String>> {
        let mut mapping = HashMap::new();
        for raw in &self.map_class {
            let (old, new) = raw
                .split_once('=')
                .with_context(|| format!("Invalid class mapping '{raw}', expected OLD=NEW"))?;
            mapping.insert(old.to_string(), new.to_string());
        }
        Ok(mapping)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    args.validate()
        .context("Failed to validate command-line arguments")?;

    let registry = CorpusRegistry::from_path(&args.corpora)
        .with_context(|| format!("Failed to load corpus registry {:?}", args.corpora))?;
    let mapping = args.class_mapping()?;

    let mut datasets = Vec::with_capacity(args.datasets.len());
    for path in &args.datasets {
        let mut dataset = LabelledDataset::load(path, &registry)
            .with_context(|| format!("Failed to load dataset {:?}", path))?;

        if !mapping.is_empty() {
            dataset.map_classes(&mapping);
        }
        if !args.keep.is_empty() {
            dataset.remove_classes(&args.keep);
        }
        if let Some(pad) = args.pad {
            dataset
                .pad_arrays(pad)
                .with_context(|| format!("Failed to pad {:?}", path))?;
        }
        if let Some(clip) = args.clip {
            dataset
                .clip_arrays(clip)
                .with_context(|| format!("Failed to clip {:?}", path))?;
        }
        if let Some(scheme) = args.scheme.filter(|s| *s != NormScheme::Corpus) {
            let mut scaler = StandardScaler::new();
            dataset
                .normalise(&mut scaler, scheme)
                .with_context(|| format!("Failed to normalise {:?}", path))?;
        }

        println!("{dataset}");
        datasets.push(dataset);
    }

    if datasets.len() > 1 {
        let keep = (!args.keep.is_empty()).then_some(args.keep.as_slice());
        let mut combined =
            CombinedDataset::new(&datasets, keep).context("Failed to combine datasets")?;

        if matches!(args.scheme, Some(NormScheme::Corpus)) {
            let mut scaler = StandardScaler::new();
            combined
                .normalise(&mut scaler, NormScheme::Corpus)
                .context("Failed to normalise combined dataset")?;
        }

        println!("{combined}");
        for corpus in combined.corpora().to_vec() {
            let (inside, outside) = combined
                .get_corpus_split(&corpus)
                .with_context(|| format!("Failed to split out corpus {corpus}"))?;
            println!(
                "split {corpus}: {} held out, {} remaining",
                inside.len(),
                outside.len()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_args() -> Args {
        Args {
            datasets: vec![PathBuf::from("a.json")],
            corpora: PathBuf::from("corpora.json"),
            scheme: None,
            pad: None,
            clip: None,
            keep: vec![],
            map_class: vec![],
        }
    }

    #[test]
    fn class_mapping_parses_pairs() {
        let mut args = demo_args();
        args.map_class = vec!["excitement=happiness".into()];
        let mapping = args.class_mapping().unwrap();
        assert_eq!(mapping["excitement"], "happiness");
    }

    #[test]
    fn class_mapping_rejects_missing_separator() {
        let mut args = demo_args();
        args.map_class = vec!["excitement".into()];
        assert!(args.class_mapping().is_err());
    }
}
