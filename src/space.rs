//! Distance spaces over fixed-dimension vectors.
//!
//! A [`Space`] pairs a dimension with a [`Metric`]. All metrics follow the
//! convention that a smaller value means closer, which the graph relies on for
//! candidate ordering and neighbor pruning.
//!
//! - `Euclidean`: squared L2 distance.
//! - `InnerProduct`: negative inner product.
//! - `Custom`: a caller-supplied function, e.g. an edit distance over encoded tokens.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{HnswkitError, Result};
use crate::util::simd;

/// Caller-supplied distance function for the custom metric.
pub type DistanceFn = Arc<dyn Fn(&[f32], &[f32]) -> f32 + Send + Sync>;

/// Serializable tag identifying a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceKind {
    /// Squared Euclidean distance
    #[default]
    Euclidean,
    /// Negative inner product
    InnerProduct,
    /// Caller-supplied distance function
    Custom,
}

impl DistanceKind {
    /// Get the name of this distance kind.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceKind::Euclidean => "euclidean",
            DistanceKind::InnerProduct => "inner_product",
            DistanceKind::Custom => "custom",
        }
    }

    /// Parse a distance kind from a string.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "euclidean" | "euc" | "l2" => Ok(DistanceKind::Euclidean),
            "inner_product" | "inner" | "ip" => Ok(DistanceKind::InnerProduct),
            "custom" | "edition" => Ok(DistanceKind::Custom),
            _ => Err(HnswkitError::param(format!("Unknown distance type: {s}"))),
        }
    }

    /// Stable one-byte tag used by the model file.
    pub(crate) fn tag(&self) -> u8 {
        match self {
            DistanceKind::Euclidean => 0,
            DistanceKind::InnerProduct => 1,
            DistanceKind::Custom => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(DistanceKind::Euclidean),
            1 => Ok(DistanceKind::InnerProduct),
            2 => Ok(DistanceKind::Custom),
            other => Err(HnswkitError::corrupt(format!("unknown distance tag {other}"))),
        }
    }
}

impl fmt::Display for DistanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A distance metric with its data.
#[derive(Clone)]
pub enum Metric {
    Euclidean,
    InnerProduct,
    Custom(DistanceFn),
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Euclidean => f.write_str("Euclidean"),
            Metric::InnerProduct => f.write_str("InnerProduct"),
            Metric::Custom(_) => f.write_str("Custom(<fn>)"),
        }
    }
}

impl Metric {
    /// The serializable tag for this metric.
    pub fn kind(&self) -> DistanceKind {
        match self {
            Metric::Euclidean => DistanceKind::Euclidean,
            Metric::InnerProduct => DistanceKind::InnerProduct,
            Metric::Custom(_) => DistanceKind::Custom,
        }
    }
}

/// A metric bound to a vector dimension. Read-only once constructed.
#[derive(Debug, Clone)]
pub struct Space {
    dimension: usize,
    metric: Metric,
}

impl Space {
    /// Create a space for `kind`. `Custom` requires `custom_fn`; it is ignored otherwise.
    pub fn new(kind: DistanceKind, dimension: usize, custom_fn: Option<DistanceFn>) -> Result<Self> {
        if dimension == 0 {
            return Err(HnswkitError::param("dimension must be > 0"));
        }
        let metric = match kind {
            DistanceKind::Euclidean => Metric::Euclidean,
            DistanceKind::InnerProduct => Metric::InnerProduct,
            DistanceKind::Custom => Metric::Custom(custom_fn.ok_or_else(|| {
                HnswkitError::param("custom distance requires a distance function")
            })?),
        };
        Ok(Self { dimension, metric })
    }

    /// Convenience constructor for the squared Euclidean space.
    pub fn euclidean(dimension: usize) -> Result<Self> {
        Self::new(DistanceKind::Euclidean, dimension, None)
    }

    /// Convenience constructor for the negative inner product space.
    pub fn inner_product(dimension: usize) -> Result<Self> {
        Self::new(DistanceKind::InnerProduct, dimension, None)
    }

    /// Vector dimension of this space.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The metric of this space.
    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    /// The serializable tag of this space's metric.
    pub fn kind(&self) -> DistanceKind {
        self.metric.kind()
    }

    /// Distance between two vectors of this space's dimension.
    #[inline]
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match &self.metric {
            Metric::Euclidean => simd::squared_euclidean(a, b),
            Metric::InnerProduct => -simd::dot(a, b),
            Metric::Custom(func) => func(a, b),
        }
    }

    /// Validate that `vector` belongs to this space.
    pub fn validate(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(HnswkitError::param(format!(
                "Vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        if !vector.iter().all(|x| x.is_finite()) {
            return Err(HnswkitError::param(
                "Vector contains NaN or infinite values",
            ));
        }
        Ok(())
    }
}

/// Normalize `vector` to unit length in place. Zero vectors are left untouched.
pub fn normalize(vector: &mut [f32]) {
    let norm = simd::norm(vector);
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
