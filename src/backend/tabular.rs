//! Attribute-relation text backend.
//!
//! Records are `(key, f_1..f_n, label)` rows under a `@data` section; the
//! `@relation` name identifies the corpus and `@attribute` lines name the
//! columns. Consecutive rows sharing a key are the frames of one ragged
//! sequence. The binary-encoded variant of this format is decoded by an
//! external codec and is not handled here.

use std::path::Path;

use ndarray::Array2;
use tracing::debug;

use super::BackendData;
use crate::arrays::reshape_from_slices;
use crate::error::{DatasetError, Result};

/// Reads an attribute-relation text file into the common backend record.
pub fn read(path: impl AsRef<Path>) -> Result<BackendData> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)?;
    parse(path, &contents)
}

fn parse(path: &Path, contents: &str) -> Result<BackendData> {
    let mut corpus: Option<String> = None;
    let mut attributes: Vec<String> = Vec::new();
    let mut in_data = false;

    let mut names: Vec<String> = Vec::new();
    let mut slices: Vec<usize> = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut rows: Vec<f32> = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('%') {
            continue;
        }

        if !in_data {
            let lower = line.to_lowercase();
            if let Some(rest) = lower.strip_prefix("@relation") {
                let offset = line.len() - rest.len();
                corpus = Some(unquote(line[offset..].trim()).to_string());
            } else if lower.starts_with("@attribute") {
                let name = line
                    .split_whitespace()
                    .nth(1)
                    .map(unquote)
                    .ok_or_else(|| {
                        DatasetError::parse(path, format!("line {}: attribute has no name", idx + 1))
                    })?;
                attributes.push(name.to_string());
            } else if lower.starts_with("@data") {
                if attributes.len() < 3 {
                    return Err(DatasetError::parse(
                        path,
                        "need at least a key, one feature, and a label attribute",
                    ));
                }
                in_data = true;
            }
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(|f| unquote(f.trim())).collect();
        if fields.len() != attributes.len() {
            return Err(DatasetError::parse(
                path,
                format!(
                    "line {}: {} fields for {} attributes",
                    idx + 1,
                    fields.len(),
                    attributes.len()
                ),
            ));
        }

        let key = fields[0];
        let label = fields[fields.len() - 1];
        let continues_current = names.last().map(|n| n == key).unwrap_or(false);
        if continues_current {
            if let Some(count) = slices.last_mut() {
                *count += 1;
            }
            if labels.last().map(String::as_str) != Some(label) {
                return Err(DatasetError::parse(
                    path,
                    format!("line {}: instance '{key}' changes label mid-sequence", idx + 1),
                ));
            }
        } else {
            if names.iter().any(|n| n == key) {
                return Err(DatasetError::parse(
                    path,
                    format!(
                        "line {}: rows of instance '{key}' are not consecutive",
                        idx + 1
                    ),
                ));
            }
            names.push(key.to_string());
            slices.push(1);
            labels.push(label.to_string());
        }

        for raw in &fields[1..fields.len() - 1] {
            let value: f32 = raw.parse().map_err(|_| {
                DatasetError::parse(
                    path,
                    format!("line {}: feature value '{raw}' is not numeric", idx + 1),
                )
            })?;
            rows.push(value);
        }
    }

    let corpus = corpus
        .filter(|c| !c.is_empty())
        .ok_or_else(|| DatasetError::MissingMetadata {
            path: path.to_path_buf(),
            field: "relation",
        })?;
    if names.is_empty() {
        return Err(DatasetError::parse(path, "no data rows"));
    }

    let n_features = attributes.len() - 2;
    let n_rows = rows.len() / n_features;
    let flat = Array2::from_shape_vec((n_rows, n_features), rows)?;
    let features = reshape_from_slices(flat, &slices)?;

    debug!(%corpus, instances = names.len(), "read tabular dataset");
    Ok(BackendData {
        corpus,
        names,
        features,
        labels: Some(labels),
        feature_names: attributes[1..attributes.len() - 1].to_vec(),
    })
}

fn unquote(field: &str) -> &str {
    let field = field
        .strip_prefix('\'')
        .and_then(|f| f.strip_suffix('\''))
        .unwrap_or(field);
    field
        .strip_prefix('"')
        .and_then(|f| f.strip_suffix('"'))
        .unwrap_or(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::Features;

    const FRAMED: &str = "\
% per-frame features
@relation demo
@attribute name string
@attribute f1 numeric
@attribute f2 numeric
@attribute emotion {anger,sadness}
@data
'clip_01',1.0,2.0,anger
'clip_01',3.0,4.0,anger
'clip_02',5.0,6.0,sadness
";

    #[test]
    fn repeated_keys_become_ragged_sequences() {
        let data = parse(Path::new("demo.arff"), FRAMED).unwrap();
        assert_eq!(data.corpus, "demo");
        assert_eq!(data.names, vec!["clip_01", "clip_02"]);
        assert_eq!(data.feature_names, vec!["f1", "f2"]);
        assert_eq!(
            data.labels.as_deref(),
            Some(&["anger".to_string(), "sadness".to_string()][..])
        );
        match data.features {
            Features::Ragged(arrays) => {
                assert_eq!(arrays[0].nrows(), 2);
                assert_eq!(arrays[0][[1, 1]], 4.0);
                assert_eq!(arrays[1].nrows(), 1);
            }
            other => panic!("expected ragged layout, got {other:?}"),
        }
    }

    #[test]
    fn unique_keys_stay_one_vector_per_instance() {
        let raw = "\
@relation demo
@attribute name string
@attribute f1 numeric
@attribute emotion {anger,sadness}
@data
'clip_01',1.0,anger
'clip_02',2.0,sadness
";
        let data = parse(Path::new("demo.arff"), raw).unwrap();
        assert!(matches!(data.features, Features::Vectors(_)));
    }

    #[test]
    fn missing_relation_is_fatal() {
        let raw = "\
@attribute name string
@attribute f1 numeric
@attribute emotion {anger}
@data
'clip_01',1.0,anger
";
        assert!(matches!(
            parse(Path::new("demo.arff"), raw),
            Err(DatasetError::MissingMetadata { field: "relation", .. })
        ));
    }

    #[test]
    fn label_changes_mid_sequence_are_rejected() {
        let raw = "\
@relation demo
@attribute name string
@attribute f1 numeric
@attribute emotion {anger,sadness}
@data
'clip_01',1.0,anger
'clip_01',2.0,sadness
";
        assert!(matches!(
            parse(Path::new("demo.arff"), raw),
            Err(DatasetError::Parse { .. })
        ));
    }

    #[test]
    fn interleaved_instances_are_rejected() {
        let raw = "\
@relation demo
@attribute name string
@attribute f1 numeric
@attribute emotion {anger,sadness}
@data
'clip_01',1.0,anger
'clip_02',2.0,sadness
'clip_01',3.0,anger
";
        assert!(matches!(
            parse(Path::new("demo.arff"), raw),
            Err(DatasetError::Parse { .. })
        ));
    }
}
