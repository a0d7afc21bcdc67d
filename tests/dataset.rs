use std::collections::HashMap;
use std::path::PathBuf;

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use tempfile::TempDir;

use emocorpus::backend::container::{self, Annotations};
use emocorpus::{
    CorpusInfo, CorpusRegistry, DatasetError, Features, LabelledDataset, NormScheme,
    SpeakerExtractor, StandardScaler,
};

fn demo_registry() -> CorpusRegistry {
    let info = CorpusInfo {
        speakers: vec!["01".into(), "02".into()],
        male_speakers: vec!["01".into()],
        female_speakers: vec!["02".into()],
        speaker_groups: vec![vec!["01".into()], vec!["02".into()]],
        classes: vec!["anger".into(), "happiness".into(), "sadness".into()],
        label_map: HashMap::from([("hap".into(), "happiness".into())]),
        speaker_extractor: SpeakerExtractor::Prefix { chars: 2 },
    };
    let mut registry = CorpusRegistry::new();
    registry.insert("alpha", info).unwrap();
    registry
}

/// Writes a vector-per-instance container: one feature row per name.
fn write_vectors(dir: &TempDir, features: Array2<f32>, names: &[&str], labels: &[&str]) -> PathBuf {
    let path = dir.path().join("alpha.json");
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
    let slices = vec![1; names.len()];
    container::write(
        &path,
        "alpha",
        &names,
        &features,
        &slices,
        Annotations::Classification(labels),
    )
    .unwrap();
    path
}

/// Writes a ragged container from per-instance row counts.
fn write_ragged(
    dir: &TempDir,
    flat: Array2<f32>,
    slices: &[usize],
    names: &[&str],
    labels: &[&str],
) -> PathBuf {
    let path = dir.path().join("alpha.json");
    let names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
    container::write(
        &path,
        "alpha",
        &names,
        &flat,
        slices,
        Annotations::Classification(labels),
    )
    .unwrap();
    path
}

#[test]
fn loading_derives_speaker_metadata() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(
        &dir,
        array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        &["01_a", "01_b", "02_a"],
        &["anger", "hap", "sadness"],
    );

    let dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();
    assert_eq!(dataset.corpus(), "alpha");
    assert_eq!(dataset.n_instances(), 3);
    assert_eq!(dataset.n_features(), 2);
    assert_eq!(dataset.speaker_indices(), &[0, 0, 1]);
    assert_eq!(dataset.speaker_counts(), &[2, 1]);
    assert_eq!(dataset.speaker_group_indices(), &[0, 0, 1]);
    // The raw "hap" label goes through the corpus label map.
    assert_eq!(dataset.y(), &[0, 1, 2]);
    assert_eq!(dataset.class_counts(), &[1, 1, 1]);
    assert_eq!(dataset.base().male_indices(), vec![0, 1]);
    assert_eq!(dataset.base().female_indices(), vec![2]);
}

#[test]
fn unknown_corpus_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("beta.json");
    let names = vec!["01_a".to_string()];
    container::write(
        &path,
        "beta",
        &names,
        &array![[1.0]],
        &[1],
        Annotations::Classification(vec!["anger".into()]),
    )
    .unwrap();

    assert!(matches!(
        LabelledDataset::load(&path, &demo_registry()),
        Err(DatasetError::UnknownCorpus(_))
    ));
}

#[test]
fn label_outside_taxonomy_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(&dir, array![[1.0]], &["01_a"], &["boredom"]);

    assert!(matches!(
        LabelledDataset::load(&path, &demo_registry()),
        Err(DatasetError::UnknownClass { .. })
    ));
}

#[test]
fn regression_containers_cannot_be_labelled() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("alpha.json");
    let names = vec!["01_a".to_string()];
    container::write(
        &path,
        "alpha",
        &names,
        &array![[1.0]],
        &[1],
        Annotations::Regression(vec![("valence".into(), vec![0.5])]),
    )
    .unwrap();

    assert!(matches!(
        LabelledDataset::load(&path, &demo_registry()),
        Err(DatasetError::MissingMetadata { field: "labels", .. })
    ));
}

#[test]
fn remove_classes_keeps_arrays_aligned() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(
        &dir,
        array![[1.0], [2.0], [3.0], [4.0]],
        &["01_a", "01_b", "02_a", "02_b"],
        &["anger", "happiness", "sadness", "anger"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    dataset.remove_classes(&["sadness", "anger"]);

    assert_eq!(dataset.classes(), &["anger", "sadness"]);
    assert_eq!(dataset.n_instances(), 3);
    assert_eq!(dataset.names().len(), 3);
    assert_eq!(dataset.y().len(), 3);
    assert_eq!(dataset.speaker_indices().len(), 3);
    assert_eq!(dataset.speaker_group_indices().len(), 3);
    assert_eq!(dataset.x().n_instances(), 3);

    assert_eq!(dataset.names(), &["01_a", "02_a", "02_b"]);
    assert_eq!(dataset.y(), &[0, 1, 0]);
    assert_eq!(dataset.class_counts(), &[2, 1]);
    assert_eq!(dataset.speaker_counts(), &[1, 2]);
    match dataset.x() {
        Features::Vectors(x) => assert_eq!(x.column(0).to_vec(), vec![1.0, 3.0, 4.0]),
        other => panic!("expected vector layout, got {other:?}"),
    }
}

#[test]
fn empty_mapping_only_resorts_classes() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(
        &dir,
        array![[1.0], [2.0], [3.0]],
        &["01_a", "01_b", "02_a"],
        &["anger", "happiness", "sadness"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();
    let before_classes = dataset.classes().to_vec();
    let before_y = dataset.y().to_vec();

    dataset.map_classes(&HashMap::new());

    // Classes were already sorted, so nothing may change.
    assert_eq!(dataset.classes(), &before_classes[..]);
    assert_eq!(dataset.y(), &before_y[..]);
}

#[test]
fn mapping_merges_and_resorts_classes() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(
        &dir,
        array![[1.0], [2.0], [3.0]],
        &["01_a", "01_b", "02_a"],
        &["anger", "happiness", "sadness"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    let mapping = HashMap::from([("happiness".to_string(), "positive".to_string())]);
    dataset.map_classes(&mapping);

    assert_eq!(dataset.classes(), &["anger", "positive", "sadness"]);
    assert_eq!(dataset.y(), &[0, 1, 2]);
    assert_eq!(dataset.n_instances(), 3);
    assert_eq!(dataset.class_counts(), &[1, 1, 1]);
}

#[test]
fn binarise_builds_class_and_dimension_indicators() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(
        &dir,
        array![[1.0], [2.0], [3.0]],
        &["01_a", "01_b", "02_a"],
        &["anger", "happiness", "sadness"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    dataset.binarise(&["happiness".to_string()], &["anger".to_string(), "happiness".to_string()]);

    let sets = dataset.label_sets();
    assert_eq!(sets["anger"], vec![1, 0, 0]);
    assert_eq!(sets["happiness"], vec![0, 1, 0]);
    assert_eq!(sets["sadness"], vec![0, 0, 1]);
    assert_eq!(sets["arousal"], vec![1, 1, 0]);
    assert_eq!(sets["valence"], vec![0, 1, 0]);
}

#[test]
fn speaker_scheme_normalises_within_each_speaker() {
    let dir = TempDir::new().unwrap();
    // Speaker 01 contributes two ragged instances (5 rows pooled),
    // speaker 02 one instance of 2 rows.
    let flat = array![
        [1.0],
        [2.0],
        [3.0],
        [4.0],
        [5.0],
        [100.0],
        [200.0]
    ];
    let path = write_ragged(
        &dir,
        flat,
        &[2, 3, 2],
        &["01_a", "01_b", "02_a"],
        &["anger", "happiness", "sadness"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    let mut scaler = StandardScaler::new();
    dataset.normalise(&mut scaler, NormScheme::Speaker).unwrap();

    let arrays = match dataset.x() {
        Features::Ragged(arrays) => arrays,
        other => panic!("expected ragged layout, got {other:?}"),
    };
    assert_eq!(arrays[0].nrows(), 2);
    assert_eq!(arrays[1].nrows(), 3);

    for group in [&arrays[0..2], &arrays[2..3]] {
        let pooled: Vec<f32> = group.iter().flat_map(|a| a.iter().copied()).collect();
        let mean: f32 = pooled.iter().sum::<f32>() / pooled.len() as f32;
        let var: f32 =
            pooled.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / pooled.len() as f32;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-4);
        assert_abs_diff_eq!(var, 1.0, epsilon = 1e-3);
    }
}

#[test]
fn normalise_all_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(
        &dir,
        array![[1.0, 10.0], [2.0, 20.0], [6.0, 60.0]],
        &["01_a", "01_b", "02_a"],
        &["anger", "happiness", "sadness"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    let mut scaler = StandardScaler::new();
    dataset.normalise(&mut scaler, NormScheme::All).unwrap();
    let once = match dataset.x() {
        Features::Vectors(x) => x.clone(),
        other => panic!("expected vector layout, got {other:?}"),
    };

    dataset.normalise(&mut scaler, NormScheme::All).unwrap();
    let twice = match dataset.x() {
        Features::Vectors(x) => x.clone(),
        other => panic!("expected vector layout, got {other:?}"),
    };

    for (a, b) in once.iter().zip(twice.iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-4);
    }
}

#[test]
fn corpus_scheme_is_rejected_for_single_datasets() {
    let dir = TempDir::new().unwrap();
    let path = write_vectors(&dir, array![[1.0]], &["01_a"], &["anger"]);
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    let mut scaler = StandardScaler::new();
    assert!(matches!(
        dataset.normalise(&mut scaler, NormScheme::Corpus),
        Err(DatasetError::InvalidScheme(NormScheme::Corpus))
    ));
}

#[test]
fn sequence_mutations_preserve_instance_count() {
    let dir = TempDir::new().unwrap();
    let flat = Array2::from_shape_fn((7, 2), |(i, j)| (i * 2 + j) as f32);
    let path = write_ragged(
        &dir,
        flat,
        &[2, 3, 2],
        &["01_a", "01_b", "02_a"],
        &["anger", "happiness", "sadness"],
    );
    let mut dataset = LabelledDataset::load(&path, &demo_registry()).unwrap();

    dataset.pad_arrays(4).unwrap();
    assert_eq!(dataset.x().sequence_lengths().unwrap(), vec![4, 4, 4]);

    dataset.clip_arrays(2).unwrap();
    assert_eq!(dataset.x().sequence_lengths().unwrap(), vec![2, 2, 2]);

    dataset.transpose_time().unwrap();
    assert_eq!(dataset.n_instances(), 3);
    assert_eq!(dataset.x().n_features(), 2);
}
