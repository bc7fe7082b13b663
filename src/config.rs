//! Session and training configuration.
//!
//! Both structs are plain serde types with defaults, builder-style setters and a
//! `validate` step that rejects bad values before any work starts.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{HnswkitError, Result};
use crate::space::DistanceKind;

/// File suffix of persisted models.
pub const MODEL_SUFFIX: &str = ".hnsw";

/// Append [`MODEL_SUFFIX`] to `path` unless it already ends with it.
pub fn with_model_suffix(path: &Path) -> PathBuf {
    let raw = path.as_os_str().to_string_lossy();
    if raw.ends_with(MODEL_SUFFIX) {
        path.to_path_buf()
    } else {
        PathBuf::from(format!("{raw}{MODEL_SUFFIX}"))
    }
}

/// Operating mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Build a model from training data.
    #[default]
    Train,
    /// Serve searches and inserts against a saved model.
    Process,
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Process => "process",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration passed to `Session::init`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: Mode,
    pub distance: DistanceKind,
    pub dimension: usize,
    /// Where the model is written (train) or read from (process).
    pub model_path: PathBuf,
    /// Number of word results kept in the result cache.
    pub cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Train,
            distance: DistanceKind::Euclidean,
            dimension: 0,
            model_path: PathBuf::from("model.hnsw"),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn new(mode: Mode, dimension: usize, model_path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            dimension,
            model_path: model_path.into(),
            ..Default::default()
        }
    }

    pub fn with_distance(mut self, distance: DistanceKind) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_cache_capacity(mut self, cache_capacity: usize) -> Self {
        self.cache_capacity = cache_capacity;
        self
    }

    /// Model path with the model suffix applied.
    pub fn resolved_model_path(&self) -> PathBuf {
        with_model_suffix(&self.model_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(HnswkitError::param("dimension must be > 0"));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(HnswkitError::param("model path must not be empty"));
        }
        if self.cache_capacity == 0 {
            return Err(HnswkitError::param("cache capacity must be > 0"));
        }
        Ok(())
    }
}

/// Configuration of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Line-delimited JSON training records.
    pub data_path: PathBuf,
    /// Maximum number of records accepted from the data file.
    pub max_data_size: usize,
    /// Normalize vectors to unit length before insertion.
    pub normalize: bool,
    /// Capacity of the built index.
    pub max_index_size: usize,
    /// Precision target in `[0, 1]`.
    pub precision: f32,
    /// k of the approximate search in the precision check.
    pub fast_rank: usize,
    /// k of the exhaustive search in the precision check.
    pub real_rank: usize,
    /// Parameter growth step between epochs.
    pub step: usize,
    /// Maximum number of build-and-measure rounds.
    pub max_epoch: usize,
    /// Log progress every `show_span` inserted records.
    pub show_span: usize,
    /// Level generation seed.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::new(),
            max_data_size: 10_000,
            normalize: false,
            max_index_size: 10_000,
            precision: 0.95,
            fast_rank: 5,
            real_rank: 5,
            step: 1,
            max_epoch: 3,
            show_span: 1000,
            seed: 42,
        }
    }
}

impl TrainConfig {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: data_path.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            HnswkitError::path(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config: TrainConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn with_max_data_size(mut self, max_data_size: usize) -> Self {
        self.max_data_size = max_data_size;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_max_index_size(mut self, max_index_size: usize) -> Self {
        self.max_index_size = max_index_size;
        self
    }

    pub fn with_precision(mut self, precision: f32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_ranks(mut self, fast_rank: usize, real_rank: usize) -> Self {
        self.fast_rank = fast_rank;
        self.real_rank = real_rank;
        self
    }

    pub fn with_step(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    pub fn with_max_epoch(mut self, max_epoch: usize) -> Self {
        self.max_epoch = max_epoch;
        self
    }

    pub fn with_show_span(mut self, show_span: usize) -> Self {
        self.show_span = show_span;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_path.as_os_str().is_empty() {
            return Err(HnswkitError::param("data path must not be empty"));
        }
        if self.max_data_size == 0 {
            return Err(HnswkitError::param("max_data_size must be > 0"));
        }
        if self.max_index_size == 0 {
            return Err(HnswkitError::param("max_index_size must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.precision) {
            return Err(HnswkitError::param(format!(
                "precision must be within [0, 1], got {}",
                self.precision
            )));
        }
        if self.fast_rank == 0 || self.real_rank == 0 {
            return Err(HnswkitError::param("fast_rank and real_rank must be > 0"));
        }
        if self.step == 0 {
            return Err(HnswkitError::param("step must be > 0"));
        }
        if self.max_epoch == 0 {
            return Err(HnswkitError::param("max_epoch must be > 0"));
        }
        Ok(())
    }
}
