//! Feature array representations and reshaping.
//!
//! Every dataset stores its per-instance features as one of three layouts:
//! a matrix of fixed-length vectors, a stacked tensor of equal-length
//! sequences, or a ragged list of variable-length sequences. The layout is
//! carried explicitly in [`Features`] so that operations never have to
//! sniff shapes or dtypes to find out what they are working on.

use ndarray::{concatenate, s, Array2, Array3, Axis};

use crate::error::{DatasetError, Result};

/// Per-instance feature data in one of three layouts.
///
/// The instance axis always comes first: index i in a `Features` value
/// refers to the same instance as index i in the owning dataset's `names`.
#[derive(Debug, Clone, PartialEq)]
pub enum Features {
    /// One fixed-length feature vector per instance, shape `(N, F)`.
    Vectors(Array2<f32>),
    /// Equal-length sequences stacked into a tensor, shape `(N, T, F)`.
    Sequences(Array3<f32>),
    /// Variable-length sequences, each of shape `(T_i, F)`.
    Ragged(Vec<Array2<f32>>),
}

/// Row-concatenates variable-length sequences into one flat buffer.
///
/// Returns the flat `(sum T_i, F)` buffer and the per-instance row counts
/// needed to reverse the operation with [`unflatten`].
pub fn flatten(arrays: &[Array2<f32>]) -> Result<(Array2<f32>, Vec<usize>)> {
    let slices: Vec<usize> = arrays.iter().map(|a| a.nrows()).collect();
    let views: Vec<_> = arrays.iter().map(|a| a.view()).collect();
    let flat = concatenate(Axis(0), &views)?;
    Ok((flat, slices))
}

/// Splits a flat buffer back into per-instance sequences.
///
/// Exact inverse of [`flatten`]: the i-th output has `slices[i]` rows.
pub fn unflatten(flat: &Array2<f32>, slices: &[usize]) -> Result<Vec<Array2<f32>>> {
    let total: usize = slices.iter().sum();
    if total != flat.nrows() {
        return Err(DatasetError::InvalidSlices(format!(
            "slice lengths sum to {} but buffer has {} rows",
            total,
            flat.nrows()
        )));
    }
    let mut arrays = Vec::with_capacity(slices.len());
    let mut offset = 0;
    for &len in slices {
        arrays.push(flat.slice(s![offset..offset + len, ..]).to_owned());
        offset += len;
    }
    Ok(arrays)
}

/// Classifies a flat feature buffer plus per-instance lengths into the
/// appropriate [`Features`] layout.
///
/// Three cases, in order: if the buffer has exactly one row per slice
/// entry, the data is already one vector per instance; if every slice has
/// the same length, the buffer reinterprets as a `(N, T, F)` tensor;
/// otherwise the buffer is split into ragged sequences.
pub fn reshape_from_slices(x: Array2<f32>, slices: &[usize]) -> Result<Features> {
    if slices.is_empty() {
        return Err(DatasetError::InvalidSlices("empty slice vector".into()));
    }
    if let Some(pos) = slices.iter().position(|&s| s == 0) {
        return Err(DatasetError::InvalidSlices(format!(
            "instance {pos} has a zero-length sequence"
        )));
    }

    if x.nrows() == slices.len() {
        return Ok(Features::Vectors(x));
    }

    let total: usize = slices.iter().sum();
    if total != x.nrows() {
        return Err(DatasetError::InvalidSlices(format!(
            "slice lengths sum to {} but buffer has {} rows",
            total,
            x.nrows()
        )));
    }

    let first = slices[0];
    if slices.iter().all(|&s| s == first) {
        let (n, f) = (slices.len(), x.ncols());
        let stacked = x.into_shape((n, first, f))?;
        return Ok(Features::Sequences(stacked));
    }

    Ok(Features::Ragged(unflatten(&x, slices)?))
}

/// Stacks ragged sequences back into the tightest layout: a tensor when
/// every sequence has the same length, ragged otherwise.
fn classify_ragged(arrays: Vec<Array2<f32>>) -> Result<Features> {
    let first = arrays.first().map(|a| a.nrows()).unwrap_or(0);
    if !arrays.is_empty() && arrays.iter().all(|a| a.nrows() == first) {
        let (flat, slices) = flatten(&arrays)?;
        return reshape_from_slices(flat, &slices);
    }
    Ok(Features::Ragged(arrays))
}

impl Features {
    /// Number of instances.
    pub fn n_instances(&self) -> usize {
        match self {
            Features::Vectors(x) => x.nrows(),
            Features::Sequences(x) => x.len_of(Axis(0)),
            Features::Ragged(x) => x.len(),
        }
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        match self {
            Features::Vectors(x) => x.ncols(),
            Features::Sequences(x) => x.len_of(Axis(2)),
            Features::Ragged(x) => x.first().map(|a| a.ncols()).unwrap_or(0),
        }
    }

    /// Whether the data has a time axis (sequences, ragged or stacked).
    pub fn is_sequence(&self) -> bool {
        !matches!(self, Features::Vectors(_))
    }

    /// Per-instance sequence lengths. `None` for vector data.
    pub fn sequence_lengths(&self) -> Option<Vec<usize>> {
        match self {
            Features::Vectors(_) => None,
            Features::Sequences(x) => {
                Some(vec![x.len_of(Axis(1)); x.len_of(Axis(0))])
            }
            Features::Ragged(x) => Some(x.iter().map(|a| a.nrows()).collect()),
        }
    }

    /// The i-th instance as an owned `(T_i, F)` matrix. Vector instances
    /// come back as a single-row matrix.
    pub fn instance(&self, i: usize) -> Array2<f32> {
        match self {
            Features::Vectors(x) => x.row(i).insert_axis(Axis(0)).to_owned(),
            Features::Sequences(x) => x.index_axis(Axis(0), i).to_owned(),
            Features::Ragged(x) => x[i].clone(),
        }
    }

    /// Copies out the instances at `indices`, preserving the layout.
    pub fn select(&self, indices: &[usize]) -> Features {
        match self {
            Features::Vectors(x) => Features::Vectors(x.select(Axis(0), indices)),
            Features::Sequences(x) => Features::Sequences(x.select(Axis(0), indices)),
            Features::Ragged(x) => {
                Features::Ragged(indices.iter().map(|&i| x[i].clone()).collect())
            }
        }
    }

    /// Pads every instance's time axis with zero rows up to the next
    /// multiple of `pad` at or above its current length.
    pub fn pad_time(&mut self, pad: usize) -> Result<()> {
        let padded_len = |t: usize| ((t + pad - 1) / pad) * pad;
        match self {
            Features::Vectors(_) => return Err(DatasetError::NoTimeAxis),
            Features::Sequences(x) => {
                let (n, t, f) = x.dim();
                let new_t = padded_len(t);
                if new_t != t {
                    let mut padded = Array3::zeros((n, new_t, f));
                    padded.slice_mut(s![.., ..t, ..]).assign(x);
                    *x = padded;
                }
            }
            Features::Ragged(arrays) => {
                for a in arrays.iter_mut() {
                    let (t, f) = a.dim();
                    let new_t = padded_len(t);
                    if new_t != t {
                        let mut padded = Array2::zeros((new_t, f));
                        padded.slice_mut(s![..t, ..]).assign(a);
                        *a = padded;
                    }
                }
            }
        }
        Ok(())
    }

    /// Truncates every instance's time axis to at most `length` rows.
    pub fn clip_time(&mut self, length: usize) -> Result<()> {
        match self {
            Features::Vectors(_) => return Err(DatasetError::NoTimeAxis),
            Features::Sequences(x) => {
                if x.len_of(Axis(1)) > length {
                    *x = x.slice(s![.., ..length, ..]).to_owned();
                }
            }
            Features::Ragged(arrays) => {
                for a in arrays.iter_mut() {
                    if a.nrows() > length {
                        *a = a.slice(s![..length, ..]).to_owned();
                    }
                }
            }
        }
        Ok(())
    }

    /// Swaps the time and feature axes of every instance.
    pub fn transpose_time(&mut self) -> Result<()> {
        match self {
            Features::Vectors(_) => return Err(DatasetError::NoTimeAxis),
            Features::Sequences(x) => {
                let transposed = x.clone().permuted_axes([0, 2, 1]);
                *x = transposed.as_standard_layout().to_owned();
            }
            Features::Ragged(arrays) => {
                for a in arrays.iter_mut() {
                    *a = a.t().as_standard_layout().to_owned();
                }
            }
        }
        Ok(())
    }

    /// Re-derives overlapping windows from raw single-channel signals.
    ///
    /// Each instance `(T_i, 1)` becomes `(n_frames_i, frame_size)` where
    /// window j starts at `j * frame_shift`; the final partial window is
    /// zero-padded. `num_frames` caps the windows taken per instance. The
    /// result collapses back to a stacked tensor when every instance
    /// yields the same number of frames.
    pub fn frame_signal(
        &mut self,
        frame_size: usize,
        frame_shift: usize,
        num_frames: Option<usize>,
    ) -> Result<()> {
        if frame_size == 0 || frame_shift == 0 {
            return Err(DatasetError::InvalidSlices(
                "frame size and shift must be positive".into(),
            ));
        }
        if !self.is_sequence() {
            return Err(DatasetError::NoTimeAxis);
        }
        let cols = self.n_features();
        if cols != 1 {
            return Err(DatasetError::NotSignalData(cols));
        }

        let n = self.n_instances();
        let mut framed = Vec::with_capacity(n);
        for i in 0..n {
            let signal = self.instance(i);
            framed.push(frame_instance(&signal, frame_size, frame_shift, num_frames));
        }
        *self = classify_ragged(framed)?;
        Ok(())
    }
}

fn frame_instance(
    signal: &Array2<f32>,
    frame_size: usize,
    frame_shift: usize,
    num_frames: Option<usize>,
) -> Array2<f32> {
    let samples: Vec<f32> = signal.column(0).to_vec();
    let len = samples.len();

    let mut count = if len <= frame_size {
        1
    } else {
        1 + (len - frame_size + frame_shift - 1) / frame_shift
    };
    if let Some(max) = num_frames {
        count = count.min(max.max(1));
    }

    let mut frames = Array2::zeros((count, frame_size));
    for j in 0..count {
        let start = j * frame_shift;
        let end = (start + frame_size).min(len);
        if start >= len {
            break;
        }
        for (k, &v) in samples[start..end].iter().enumerate() {
            frames[[j, k]] = v;
        }
    }
    frames
}
