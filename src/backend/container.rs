//! Self-describing dataset container (JSON).
//!
//! One file carries the corpus name, instance filenames, the flat
//! concatenated feature buffer with its per-instance slice lengths, and
//! annotations. Which annotation variables exist is declared in the
//! `annotation_vars` field, so a reader never has to guess whether the
//! file holds classification labels or named regression targets.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{name_stem, BackendData};
use crate::annotations;
use crate::arrays::reshape_from_slices;
use crate::error::{DatasetError, Result};

const LABEL_VAR: &str = "label_nominal";

#[derive(Debug, Serialize, Deserialize)]
struct ContainerFile {
    #[serde(default)]
    corpus: Option<String>,
    filenames: Vec<String>,
    slices: Vec<usize>,
    /// Flat row-major feature buffer, `sum(slices)` rows.
    features: Vec<Vec<f32>>,
    /// Self-description of the feature buffer's axes.
    feature_dims: Vec<String>,
    /// Names of the annotation variables present in this file.
    annotation_vars: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label_nominal: Option<Vec<String>>,
    /// Named regression targets, one value per instance.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<String, Vec<f32>>,
}

/// Reads a container file into the common backend record.
pub fn read(path: impl AsRef<Path>) -> Result<BackendData> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let file: ContainerFile = serde_json::from_reader(reader)?;

    let corpus = match file.corpus {
        Some(c) if !c.is_empty() => c,
        _ => {
            return Err(DatasetError::MissingMetadata {
                path: path.to_path_buf(),
                field: "corpus",
            })
        }
    };

    let names: Vec<String> = file
        .filenames
        .iter()
        .map(|f| name_stem(Path::new(f)))
        .collect();
    if names.len() != file.slices.len() {
        return Err(DatasetError::parse(
            path,
            format!(
                "{} filenames but {} slice lengths",
                names.len(),
                file.slices.len()
            ),
        ));
    }

    let flat = rows_to_array(path, &file.features)?;
    let n_features = flat.ncols();
    let features = reshape_from_slices(flat, &file.slices)?;

    let labels = if file.annotation_vars.iter().any(|v| v == LABEL_VAR) {
        let labels = file.label_nominal.ok_or_else(|| {
            DatasetError::parse(path, "annotation_vars declares label_nominal but it is absent")
        })?;
        if labels.len() != names.len() {
            return Err(DatasetError::parse(
                path,
                format!("{} labels for {} instances", labels.len(), names.len()),
            ));
        }
        Some(labels)
    } else {
        None
    };

    debug!(
        %corpus,
        instances = names.len(),
        features = n_features,
        "read container dataset"
    );
    Ok(BackendData {
        corpus,
        names,
        features,
        labels,
        feature_names: (1..=n_features).map(|i| format!("feature_{i}")).collect(),
    })
}

fn rows_to_array(path: &Path, rows: &[Vec<f32>]) -> Result<Array2<f32>> {
    let n_rows = rows.len();
    let n_cols = rows.first().map(Vec::len).unwrap_or(0);
    if let Some(bad) = rows.iter().position(|r| r.len() != n_cols) {
        return Err(DatasetError::parse(
            path,
            format!("feature row {bad} has {} values, expected {n_cols}", rows[bad].len()),
        ));
    }
    let flat: Vec<f32> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((n_rows, n_cols), flat)?)
}

/// Annotation payload for [`write`].
#[derive(Debug, Clone)]
pub enum Annotations {
    /// One nominal label per instance.
    Classification(Vec<String>),
    /// Named regression targets, each one value per instance.
    Regression(Vec<(String, Vec<f32>)>),
    /// No annotations; every instance is written as `"unknown"`.
    Unlabelled,
}

impl Annotations {
    /// Builds classification annotations for `names` from an annotation CSV.
    pub fn classification_from_csv(path: impl AsRef<Path>, names: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let map = annotations::parse_classification(path)?;
        let labels = names
            .iter()
            .map(|n| {
                map.get(n).cloned().ok_or_else(|| {
                    DatasetError::parse(path, format!("no annotation for instance '{n}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Annotations::Classification(labels))
    }

    /// Builds regression annotations for `names` from an annotation CSV.
    pub fn regression_from_csv(path: impl AsRef<Path>, names: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let map = annotations::parse_regression(path)?;
        let mut targets: Vec<String> = map
            .values()
            .next()
            .map(|v| v.keys().cloned().collect())
            .unwrap_or_default();
        targets.sort();

        let mut columns = Vec::with_capacity(targets.len());
        for target in targets {
            let values = names
                .iter()
                .map(|n| {
                    map.get(n).and_then(|v| v.get(&target)).copied().ok_or_else(|| {
                        DatasetError::parse(
                            path,
                            format!("no '{target}' annotation for instance '{n}'"),
                        )
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            columns.push((target, values));
        }
        Ok(Annotations::Regression(columns))
    }
}

/// Writes a container file from a flat feature buffer and slice lengths.
pub fn write(
    path: impl AsRef<Path>,
    corpus: &str,
    names: &[String],
    features: &Array2<f32>,
    slices: &[usize],
    annotations: Annotations,
) -> Result<()> {
    let path = path.as_ref();
    if names.len() != slices.len() {
        return Err(DatasetError::InvalidSlices(format!(
            "{} names but {} slice lengths",
            names.len(),
            slices.len()
        )));
    }
    let total: usize = slices.iter().sum();
    if total != features.nrows() {
        return Err(DatasetError::InvalidSlices(format!(
            "slice lengths sum to {} but buffer has {} rows",
            total,
            features.nrows()
        )));
    }

    let (annotation_vars, label_nominal, regression) = match annotations {
        Annotations::Classification(labels) => {
            if labels.len() != names.len() {
                return Err(DatasetError::parse(
                    path,
                    format!("{} labels for {} instances", labels.len(), names.len()),
                ));
            }
            (vec![LABEL_VAR.to_string()], Some(labels), BTreeMap::new())
        }
        Annotations::Regression(columns) => {
            let mut vars = Vec::with_capacity(columns.len());
            let mut map = BTreeMap::new();
            for (target, values) in columns {
                if values.len() != names.len() {
                    return Err(DatasetError::parse(
                        path,
                        format!(
                            "{} values for target '{target}' but {} instances",
                            values.len(),
                            names.len()
                        ),
                    ));
                }
                vars.push(target.clone());
                map.insert(target, values);
            }
            (vars, None, map)
        }
        Annotations::Unlabelled => (
            vec![LABEL_VAR.to_string()],
            Some(vec!["unknown".to_string(); names.len()]),
            BTreeMap::new(),
        ),
    };

    let file = ContainerFile {
        corpus: Some(corpus.to_string()),
        filenames: names.to_vec(),
        slices: slices.to_vec(),
        features: features.outer_iter().map(|row| row.to_vec()).collect(),
        feature_dims: vec!["concat".into(), "features".into()],
        annotation_vars,
        label_nominal,
        annotations: regression,
    };
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, &file)?;
    Ok(())
}
