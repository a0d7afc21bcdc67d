use assert_cmd::Command;
use ndarray::array;
use predicates::prelude::*;
use tempfile::TempDir;

use emocorpus::backend::container::{self, Annotations};

fn write_fixtures(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let registry = serde_json::json!({
        "alpha": {
            "speakers": ["01", "02"],
            "classes": ["anger", "happiness", "sadness"],
            "speaker_extractor": {"kind": "prefix", "chars": 2}
        }
    });
    let registry_path = dir.path().join("corpora.json");
    std::fs::write(&registry_path, registry.to_string()).unwrap();

    let dataset_path = dir.path().join("alpha.json");
    let names: Vec<String> = ["01_a", "01_b", "02_a"].iter().map(|s| s.to_string()).collect();
    container::write(
        &dataset_path,
        "alpha",
        &names,
        &array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]],
        &[1, 1, 1],
        Annotations::Classification(vec![
            "anger".into(),
            "happiness".into(),
            "sadness".into(),
        ]),
    )
    .unwrap();

    (dataset_path, registry_path)
}

#[test]
fn prints_a_dataset_summary() {
    let dir = TempDir::new().unwrap();
    let (dataset, registry) = write_fixtures(&dir);

    Command::cargo_bin("emocorpus")
        .unwrap()
        .arg(&dataset)
        .arg("--corpora")
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::contains("Corpus: alpha"))
        .stdout(predicate::str::contains("3 instances"))
        .stdout(predicate::str::contains("3 classes"));
}

#[test]
fn rejects_missing_registry() {
    let dir = TempDir::new().unwrap();
    let (dataset, _) = write_fixtures(&dir);

    Command::cargo_bin("emocorpus")
        .unwrap()
        .arg(&dataset)
        .arg("--corpora")
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corpus registry does not exist"));
}

#[test]
fn filters_classes_before_summarising() {
    let dir = TempDir::new().unwrap();
    let (dataset, registry) = write_fixtures(&dir);

    Command::cargo_bin("emocorpus")
        .unwrap()
        .arg(&dataset)
        .arg("--corpora")
        .arg(&registry)
        .arg("--keep")
        .arg("anger")
        .arg("--keep")
        .arg("sadness")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 instances"))
        .stdout(predicate::str::contains("2 classes"));
}
