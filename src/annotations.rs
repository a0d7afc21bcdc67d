//! Annotation file parsing.
//!
//! Annotation CSVs are `name,value,...` tables with a header row. For
//! classification the first value column holds the label; for regression
//! every value column is a named numeric target.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{DatasetError, Result};

/// Reads a `name -> label` map from a classification annotation CSV.
pub fn parse_classification(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut annotations = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let name = record
            .get(0)
            .ok_or_else(|| DatasetError::parse(path, "annotation row has no name column"))?;
        let label = record
            .get(1)
            .ok_or_else(|| DatasetError::parse(path, "annotation row has no label column"))?;
        annotations.insert(name.to_string(), label.to_string());
    }
    Ok(annotations)
}

/// Reads a `name -> {target -> value}` map from a regression annotation CSV.
///
/// Target names come from the header row; every column after the first
/// must parse as a float.
pub fn parse_regression(path: impl AsRef<Path>) -> Result<HashMap<String, HashMap<String, f32>>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let targets: Vec<String> = reader
        .headers()?
        .iter()
        .skip(1)
        .map(|h| h.to_string())
        .collect();

    let mut annotations = HashMap::new();
    for record in reader.records() {
        let record = record?;
        let name = record
            .get(0)
            .ok_or_else(|| DatasetError::parse(path, "annotation row has no name column"))?;
        let mut values = HashMap::with_capacity(targets.len());
        for (target, raw) in targets.iter().zip(record.iter().skip(1)) {
            let value: f32 = raw.parse().map_err(|_| {
                DatasetError::parse(
                    path,
                    format!("value '{raw}' for target '{target}' is not numeric"),
                )
            })?;
            values.insert(target.clone(), value);
        }
        annotations.insert(name.to_string(), values);
    }
    Ok(annotations)
}
