//! Training record source and search result payloads.
//!
//! Training data is line-delimited JSON: each non-blank line is an object with a
//! single member mapping the external index (a word) to its vector.
//!
//! ```text
//! {"water": [0.1, 0.2, 0.3, 0.4]}
//! {"ocean": [0.2, 0.1, 0.3, 0.5]}
//! ```
//!
//! Search results are reported as a JSON payload whose `details` are ordered
//! closest first. Note the wire names: `label` carries the external word and
//! `index` the numeric graph label.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HnswkitError, Result};
use crate::space::{self, DistanceKind};

/// Version string stamped into result payloads.
pub const PAYLOAD_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One training vector with its external index.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRecord {
    pub index: String,
    pub vector: Vec<f32>,
}

/// Parse one record line. `line_no` is 1-based and only used in error messages.
pub fn parse_record(line: &str, line_no: usize, dimension: usize) -> Result<TrainRecord> {
    let object: BTreeMap<String, Vec<f32>> = serde_json::from_str(line)
        .map_err(|e| HnswkitError::param(format!("line {line_no}: malformed record: {e}")))?;
    if object.len() != 1 {
        return Err(HnswkitError::param(format!(
            "line {line_no}: expected exactly one member, found {}",
            object.len()
        )));
    }
    let Some((index, vector)) = object.into_iter().next() else {
        return Err(HnswkitError::param(format!("line {line_no}: empty record")));
    };
    if vector.len() != dimension {
        return Err(HnswkitError::param(format!(
            "line {line_no}: vector of '{index}' has dimension {}, expected {dimension}",
            vector.len()
        )));
    }
    if !vector.iter().all(|x| x.is_finite()) {
        return Err(HnswkitError::param(format!(
            "line {line_no}: vector of '{index}' contains non-finite values"
        )));
    }
    Ok(TrainRecord { index, vector })
}

/// Load every record from `path`, normalizing vectors when `normalize` is set.
///
/// More than `max_data_size` records, or no records at all, is a parameter error.
pub fn load_records(
    path: &Path,
    dimension: usize,
    max_data_size: usize,
    normalize: bool,
) -> Result<Vec<TrainRecord>> {
    let file = File::open(path).map_err(|e| {
        HnswkitError::path(format!("cannot open data file {}: {e}", path.display()))
    })?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| HnswkitError::param(format!("line {}: {e}", i + 1)))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if records.len() >= max_data_size {
            return Err(HnswkitError::param(format!(
                "data file {} holds more than {max_data_size} records",
                path.display()
            )));
        }
        let mut record = parse_record(trimmed, i + 1, dimension)?;
        if normalize {
            space::normalize(&mut record.vector);
        }
        records.push(record);
    }

    if records.is_empty() {
        return Err(HnswkitError::param(format!(
            "data file {} holds no records",
            path.display()
        )));
    }
    tracing::info!(path = %path.display(), records = records.len(), "Loaded training data");
    Ok(records)
}

/// Which search path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    AnnSearch,
    ForceLoop,
}

/// One hit in a result payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDetail {
    /// External word of the hit.
    pub label: String,
    /// Numeric graph label of the hit.
    pub index: u32,
    pub distance: f32,
    /// Stored vector of the hit.
    pub node: Vec<f32>,
}

/// Serialized search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPayload {
    pub version: String,
    pub size: usize,
    pub distance_type: DistanceKind,
    pub search_type: SearchPath,
    pub details: Vec<ResultDetail>,
}

impl SearchPayload {
    pub fn new(distance_type: DistanceKind, search_type: SearchPath, details: Vec<ResultDetail>) -> Self {
        Self {
            version: PAYLOAD_VERSION.to_string(),
            size: details.len(),
            distance_type,
            search_type,
            details,
        }
    }
}

/// A completed search: the payload plus its JSON encoding.
#[derive(Debug, Clone)]
pub struct SearchResult {
    payload: SearchPayload,
    json: String,
}

impl SearchResult {
    pub fn new(payload: SearchPayload) -> Result<Self> {
        let json = serde_json::to_string(&payload)?;
        Ok(Self { payload, json })
    }

    pub fn payload(&self) -> &SearchPayload {
        &self.payload
    }

    /// JSON encoding of the payload.
    pub fn json(&self) -> &str {
        &self.json
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.payload.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.details.is_empty()
    }

    /// Words of the hits, closest first.
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.payload.details.iter().map(|d| d.label.as_str())
    }

    /// Distances of the hits, closest first.
    pub fn distances(&self) -> impl Iterator<Item = f32> + '_ {
        self.payload.details.iter().map(|d| d.distance)
    }
}
