//! Adaptive training: build, measure, and rebuild until a precision target is met.
//!
//! Each epoch builds a fresh index from the training records, saves it, and
//! measures precision by comparing the farthest distance of an approximate top-k
//! search against that of an exhaustive scan for a sample of the records. When the
//! measured precision falls short, graph parameters grow in proportion to the
//! shortfall and the index is rebuilt from scratch.
//!
//! Precision here compares only the worst distance of each top-k list, not full
//! result-set overlap. It is a coarse proxy for recall and can disagree with an
//! overlap-based measure.

use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::TrainConfig;
use crate::data::{self, TrainRecord};
use crate::error::{Result, StatusCode};
use crate::hnsw::{HnswConfig, HnswIndex};
use crate::space::Space;

/// Maximum number of records sampled by the precision check.
pub const PRECISION_SAMPLES: usize = 1000;

/// Absolute tolerance under which two farthest distances count as equal.
pub const PRECISION_TOLERANCE: f32 = 1e-5;

/// Shortfall covered by one unit of parameter growth.
const SHORTFALL_UNIT: f32 = 0.05;

/// Graph parameters tuned between epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainParams {
    pub neighbors: usize,
    pub ef_search: usize,
    pub ef_construction: usize,
    pub step: usize,
}

impl TrainParams {
    pub fn new(step: usize) -> Self {
        Self {
            neighbors: 16,
            ef_search: 64,
            ef_construction: 128,
            step,
        }
    }

    /// Grow every parameter by an amount increasing with `shortfall`.
    pub fn update(&mut self, shortfall: f32) {
        let times = ((shortfall / SHORTFALL_UNIT).ceil() as usize).max(1);
        let grow = self.step * times;
        self.neighbors += grow;
        self.ef_search += 4 * grow;
        self.ef_construction += 4 * grow;
    }

    /// Index configuration for these parameters.
    pub fn hnsw_config(&self, max_elements: usize, normalize: bool, seed: u64) -> HnswConfig {
        HnswConfig::new(max_elements)
            .with_m(self.neighbors)
            .with_ef_construction(self.ef_construction)
            .with_ef_search(self.ef_search)
            .with_normalize(normalize)
            .with_seed(seed)
    }
}

/// Outcome of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainStatus {
    /// The precision target was reached.
    Ok,
    /// Epochs ran out first; the last index was kept.
    Warning,
}

impl TrainStatus {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TrainStatus::Ok => StatusCode::Ok,
            TrainStatus::Warning => StatusCode::Warning,
        }
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    pub status: TrainStatus,
    /// Precision measured in the last epoch.
    pub precision: f32,
    pub target: f32,
    /// Number of epochs run.
    pub epochs: usize,
    /// Parameters of the kept index.
    pub params: TrainParams,
    pub records: usize,
    pub elapsed: Duration,
}

impl TrainReport {
    pub fn is_ok(&self) -> bool {
        self.status == TrainStatus::Ok
    }
}

/// Run training for `config` over `space`, saving every epoch's index to `model_path`.
///
/// Returns the kept index along with the report. Reaching the epoch limit is not an
/// error: the report carries [`TrainStatus::Warning`].
pub fn train(space: &Space, config: &TrainConfig, model_path: &Path) -> Result<(HnswIndex, TrainReport)> {
    config.validate()?;
    let started = Instant::now();

    tracing::info!(path = %config.data_path.display(), "Loading training data");
    let records = data::load_records(
        &config.data_path,
        space.dimension(),
        config.max_data_size,
        config.normalize,
    )?;

    let mut params = TrainParams::new(config.step);
    let mut epoch = 0;
    loop {
        epoch += 1;
        tracing::info!(
            epoch,
            max_epoch = config.max_epoch,
            neighbors = params.neighbors,
            ef_search = params.ef_search,
            ef_construction = params.ef_construction,
            "Starting training epoch"
        );

        let index = build_index(space, &records, &params, config)?;
        index.save(model_path)?;
        tracing::info!(path = %model_path.display(), nodes = index.len(), "Saved model checkpoint");

        let precision = measure_precision(&index, &records, config.fast_rank, config.real_rank);
        let report = |status| TrainReport {
            status,
            precision,
            target: config.precision,
            epochs: epoch,
            params,
            records: records.len(),
            elapsed: started.elapsed(),
        };

        if precision >= config.precision {
            tracing::info!(precision, epoch, "Training reached precision target");
            return Ok((index, report(TrainStatus::Ok)));
        }

        let shortfall = config.precision - precision;
        if epoch >= config.max_epoch {
            tracing::warn!(
                precision,
                target = config.precision,
                "Training finished without reaching precision target"
            );
            return Ok((index, report(TrainStatus::Warning)));
        }

        tracing::warn!(precision, shortfall, "Precision below target, retraining");
        params.update(shortfall);
    }
}

/// Build a fresh index and insert every record through the overwrite path.
pub fn build_index(
    space: &Space,
    records: &[TrainRecord],
    params: &TrainParams,
    config: &TrainConfig,
) -> Result<HnswIndex> {
    let hnsw_config = params.hnsw_config(config.max_index_size, config.normalize, config.seed);
    let mut index = HnswIndex::new(space.clone(), hnsw_config)?;

    let show_span = config.show_span.max(1);
    for (i, record) in records.iter().enumerate() {
        index.upsert(&record.vector, &record.index)?;
        if (i + 1) % show_span == 0 {
            tracing::info!(inserted = i + 1, total = records.len(), "Training progress");
        }
    }
    Ok(index)
}

/// Fraction of sampled records whose approximate and exact farthest distances agree.
pub fn measure_precision(
    index: &HnswIndex,
    records: &[TrainRecord],
    fast_rank: usize,
    real_rank: usize,
) -> f32 {
    let sample = &records[..records.len().min(PRECISION_SAMPLES)];
    if sample.is_empty() {
        return 0.0;
    }

    let suitable = sample
        .par_iter()
        .filter(|record| {
            let fast = index.search_knn(&record.vector, fast_rank);
            let real = index.force_loop(&record.vector, real_rank);
            match (fast.peek(), real.peek()) {
                (Some(f), Some(r)) => (f.distance - r.distance).abs() < PRECISION_TOLERANCE,
                _ => false,
            }
        })
        .count();

    let precision = suitable as f32 / sample.len() as f32;
    tracing::debug!(suitable, sampled = sample.len(), precision, "Measured precision");
    precision
}
