//! Feature normalisation transforms and grouping schemes.

use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::arrays::{flatten, unflatten, Features};
use crate::error::Result;

const EPSILON: f32 = 1e-8;

/// Which instance grouping a transform is fit over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormScheme {
    /// One transform fit on the pooled features of the whole dataset.
    All,
    /// An independent transform per speaker.
    Speaker,
    /// An independent transform per source corpus (combined datasets only).
    Corpus,
}

impl NormScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormScheme::All => "all",
            NormScheme::Speaker => "speaker",
            NormScheme::Corpus => "corpus",
        }
    }
}

impl FromStr for NormScheme {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(NormScheme::All),
            "speaker" => Ok(NormScheme::Speaker),
            "corpus" => Ok(NormScheme::Corpus),
            other => Err(format!(
                "unknown normalisation scheme '{other}' (expected all, speaker, or corpus)"
            )),
        }
    }
}

/// A feature transform fit on a pooled 2-D buffer of rows.
///
/// `fit_transform` refits from scratch on every call; the per-speaker and
/// per-corpus schemes rely on this to give each group its own statistics.
pub trait Normaliser {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    fn fit(&mut self, x: &ArrayView2<f32>);

    fn transform(&self, x: &ArrayView2<f32>) -> Array2<f32>;

    fn fit_transform(&mut self, x: &ArrayView2<f32>) -> Array2<f32> {
        self.fit(x);
        self.transform(x)
    }
}

/// Centres each feature column to zero mean and scales to unit variance.
#[derive(Debug, Default)]
pub struct StandardScaler {
    means: Option<Array1<f32>>,
    stds: Option<Array1<f32>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Normaliser for StandardScaler {
    fn name(&self) -> &'static str {
        "StandardScaler"
    }

    fn fit(&mut self, x: &ArrayView2<f32>) {
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let stds = x
            .var_axis(Axis(0), 0.0)
            .mapv(|v| v.sqrt().max(EPSILON));
        self.means = Some(means);
        self.stds = Some(stds);
    }

    fn transform(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        match (&self.means, &self.stds) {
            (Some(means), Some(stds)) => (x - means) / stds,
            _ => x.to_owned(),
        }
    }
}

/// Scales each feature column into [0, 1] by its observed range.
#[derive(Debug, Default)]
pub struct MinMaxScaler {
    mins: Option<Array1<f32>>,
    ranges: Option<Array1<f32>>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Normaliser for MinMaxScaler {
    fn name(&self) -> &'static str {
        "MinMaxScaler"
    }

    fn fit(&mut self, x: &ArrayView2<f32>) {
        let mins = x.fold_axis(Axis(0), f32::INFINITY, |acc, &v| acc.min(v));
        let maxs = x.fold_axis(Axis(0), f32::NEG_INFINITY, |acc, &v| acc.max(v));
        let ranges = (&maxs - &mins).mapv(|r| r.max(EPSILON));
        self.mins = Some(mins);
        self.ranges = Some(ranges);
    }

    fn transform(&self, x: &ArrayView2<f32>) -> Array2<f32> {
        match (&self.mins, &self.ranges) {
            (Some(mins), Some(ranges)) => (x - mins) / ranges,
            _ => x.to_owned(),
        }
    }
}

/// Fits one transform on the pooled buffer of the whole dataset and
/// applies it in place, preserving per-instance structure.
pub(crate) fn normalise_all(features: &mut Features, normaliser: &mut dyn Normaliser) -> Result<()> {
    match features {
        Features::Vectors(x) => {
            *x = normaliser.fit_transform(&x.view());
        }
        Features::Sequences(x) => {
            let (n, t, f) = x.dim();
            let flat = x.to_owned().into_shape((n * t, f))?;
            let transformed = normaliser.fit_transform(&flat.view());
            *x = transformed.into_shape((n, t, f))?;
        }
        Features::Ragged(arrays) => {
            let (flat, slices) = flatten(arrays)?;
            let transformed = normaliser.fit_transform(&flat.view());
            *arrays = unflatten(&transformed, &slices)?;
        }
    }
    Ok(())
}

/// Fits one transform on the pooled buffer of the instances at `indices`
/// and writes the transformed data back in place.
pub(crate) fn normalise_subset(
    features: &mut Features,
    indices: &[usize],
    normaliser: &mut dyn Normaliser,
) -> Result<()> {
    if indices.is_empty() {
        return Ok(());
    }
    match features {
        Features::Vectors(x) => {
            let subset = x.select(Axis(0), indices);
            let transformed = normaliser.fit_transform(&subset.view());
            for (k, &i) in indices.iter().enumerate() {
                x.row_mut(i).assign(&transformed.row(k));
            }
        }
        Features::Sequences(x) => {
            let (_, t, f) = x.dim();
            let subset = x.select(Axis(0), indices);
            let flat = subset.into_shape((indices.len() * t, f))?;
            let transformed = normaliser.fit_transform(&flat.view());
            let stacked = transformed.into_shape((indices.len(), t, f))?;
            for (k, &i) in indices.iter().enumerate() {
                x.index_axis_mut(Axis(0), i)
                    .assign(&stacked.index_axis(Axis(0), k));
            }
        }
        Features::Ragged(arrays) => {
            let subset: Vec<Array2<f32>> = indices.iter().map(|&i| arrays[i].clone()).collect();
            let (flat, slices) = flatten(&subset)?;
            let transformed = normaliser.fit_transform(&flat.view());
            let restored = unflatten(&transformed, &slices)?;
            for (k, &i) in indices.iter().enumerate() {
                arrays[i] = restored[k].clone();
            }
        }
    }
    Ok(())
}
