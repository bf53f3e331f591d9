use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// A fixed-length face embedding produced by a face recognizer.
///
/// Serialized transparently as a plain JSON array so gallery and cache
/// artifacts stay readable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Encoding(Vec<f64>);

impl Encoding {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_ndarray(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(&self.0[..])
    }

    /// Euclidean distance to `other`.
    ///
    /// Encodings of different lengths never match, so the distance is infinite.
    pub fn distance(&self, other: &Encoding) -> f64 {
        if self.len() != other.len() {
            return f64::INFINITY;
        }
        let diff = &self.as_ndarray() - &other.as_ndarray();
        diff.dot(&diff).sqrt()
    }
}

impl From<Vec<f32>> for Encoding {
    fn from(values: Vec<f32>) -> Self {
        Self(values.into_iter().map(f64::from).collect())
    }
}

/// Minimum distance from `candidate` to any of `references`.
///
/// Returns infinity when there are no references.
pub fn min_distance(references: &[Encoding], candidate: &Encoding) -> f64 {
    references
        .iter()
        .map(|r| r.distance(candidate))
        .fold(f64::INFINITY, f64::min)
}
