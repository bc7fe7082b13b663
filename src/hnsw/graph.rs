//! HNSW graph structure and configuration.

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{HnswkitError, Result};
use crate::space::{DistanceKind, Space};

/// Hard cap on the level a node can be assigned.
pub const MAX_LEVEL: usize = 16;

/// Configuration for HNSW index construction and search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of connections per node in layers above 0.
    pub m: usize,
    /// Maximum number of connections per node in layer 0 (typically 2 * m).
    pub m_max0: usize,
    /// Size of the candidate set during construction.
    pub ef_construction: usize,
    /// Size of the candidate set during search.
    pub ef_search: usize,
    /// Maximum number of nodes the index accepts.
    pub max_elements: usize,
    /// Whether stored vectors were normalized to unit length.
    pub normalize: bool,
    /// Seed for level generation.
    pub seed: u64,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            m_max0: 32,
            ef_construction: 200,
            ef_search: 50,
            max_elements: 10_000,
            normalize: false,
            seed: 42,
        }
    }
}

impl HnswConfig {
    /// Create a configuration bounded to `max_elements` nodes.
    pub fn new(max_elements: usize) -> Self {
        Self {
            max_elements,
            ..Default::default()
        }
    }

    /// Set the M parameter; layer 0 gets twice as many connections.
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self.m_max0 = m * 2;
        self
    }

    /// Set the ef_construction parameter.
    pub fn with_ef_construction(mut self, ef_construction: usize) -> Self {
        self.ef_construction = ef_construction;
        self
    }

    /// Set the ef_search parameter.
    pub fn with_ef_search(mut self, ef_search: usize) -> Self {
        self.ef_search = ef_search;
        self
    }

    /// Set the normalization flag.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set the level generation seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_elements == 0 {
            return Err(HnswkitError::param("max_elements must be > 0"));
        }
        // Labels and persisted sizes are u32.
        let limit = u32::MAX as usize;
        if self.max_elements > limit {
            return Err(HnswkitError::param(format!("max_elements must be <= {limit}")));
        }
        if self.m_max0 > limit || self.ef_construction > limit || self.ef_search > limit {
            return Err(HnswkitError::param(format!(
                "m_max0, ef_construction and ef_search must be <= {limit}"
            )));
        }
        if self.m < 2 {
            return Err(HnswkitError::param("M must be >= 2"));
        }
        if self.m_max0 < self.m {
            return Err(HnswkitError::param("m_max0 must be >= M"));
        }
        if self.ef_construction < self.m {
            return Err(HnswkitError::param("ef_construction must be >= M"));
        }
        if self.ef_search == 0 {
            return Err(HnswkitError::param("ef_search must be > 0"));
        }
        Ok(())
    }
}

/// A stored graph entry. Its label is its position in the arena.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) index: String,
    pub(crate) vector: Vec<f32>,
    pub(crate) level: usize,
    /// neighbors[layer] holds the labels linked at that layer.
    pub(crate) neighbors: Vec<Vec<u32>>,
}

impl Node {
    pub(crate) fn new(index: String, vector: Vec<f32>, level: usize) -> Self {
        Self {
            index,
            vector,
            level,
            neighbors: vec![Vec::new(); level + 1],
        }
    }
}

/// Summary statistics of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub len: usize,
    pub max_elements: usize,
    pub dimension: usize,
    pub distance: DistanceKind,
    pub m: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
    pub normalize: bool,
    pub max_level: usize,
    /// Mean number of layer-0 neighbors per node.
    pub avg_degree: f32,
}

/// HNSW index implementation for approximate nearest neighbor search.
pub struct HnswIndex {
    pub(crate) config: HnswConfig,
    pub(crate) space: Space,
    pub(crate) nodes: Vec<Node>,
    pub(crate) lookup: AHashMap<String, u32>,
    pub(crate) entry_point: Option<u32>,
    pub(crate) max_level: usize,
    level_mult: f64,
    rng: StdRng,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HnswIndex")
            .field("config", &self.config)
            .field("space", &self.space)
            .field("len", &self.nodes.len())
            .field("entry_point", &self.entry_point)
            .field("max_level", &self.max_level)
            .finish()
    }
}

impl HnswIndex {
    /// Create an empty index over `space`.
    pub fn new(space: Space, config: HnswConfig) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            level_mult: 1.0 / (config.m as f64).ln(),
            nodes: Vec::with_capacity(config.max_elements.min(1 << 16)),
            lookup: AHashMap::new(),
            entry_point: None,
            max_level: 0,
            config,
            space,
            rng,
        })
    }

    /// Reassemble an index from decoded parts.
    pub(crate) fn from_parts(
        space: Space,
        config: HnswConfig,
        nodes: Vec<Node>,
        entry_point: Option<u32>,
        max_level: usize,
    ) -> Result<Self> {
        let mut index = Self::new(space, config)?;
        index.lookup = nodes
            .iter()
            .enumerate()
            .map(|(label, node)| (node.index.clone(), label as u32))
            .collect();
        if index.lookup.len() != nodes.len() {
            return Err(HnswkitError::corrupt("duplicate external index in model"));
        }
        // Continue the level sequence rather than replaying it from the start.
        index.rng = StdRng::seed_from_u64(index.config.seed ^ nodes.len() as u64);
        index.nodes = nodes;
        index.entry_point = entry_point;
        index.max_level = max_level;
        Ok(index)
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check whether the index has reached `max_elements`.
    pub fn is_full(&self) -> bool {
        self.nodes.len() >= self.config.max_elements
    }

    /// Index configuration.
    pub fn config(&self) -> &HnswConfig {
        &self.config
    }

    /// Distance space of the index.
    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Vector dimension.
    pub fn dimension(&self) -> usize {
        self.space.dimension()
    }

    /// Whether stored vectors are unit-normalized.
    pub fn normalize(&self) -> bool {
        self.config.normalize
    }

    /// Adjust the search beam width without rebuilding.
    pub fn set_ef_search(&mut self, ef_search: usize) {
        self.config.ef_search = ef_search.clamp(1, u32::MAX as usize);
    }

    /// Current entry point label.
    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    /// Highest populated layer.
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Exact lookup of a label by external index.
    pub fn find_word_label(&self, index: &str) -> Option<u32> {
        self.lookup.get(index).copied()
    }

    /// Stored vector of `label`.
    pub fn data_by_label(&self, label: u32) -> Option<&[f32]> {
        self.nodes.get(label as usize).map(|n| n.vector.as_slice())
    }

    /// External index of `label`.
    pub fn index_of(&self, label: u32) -> Option<&str> {
        self.nodes.get(label as usize).map(|n| n.index.as_str())
    }

    /// Level assigned to `label`.
    pub fn level_of(&self, label: u32) -> Option<usize> {
        self.nodes.get(label as usize).map(|n| n.level)
    }

    /// Neighbor labels of `label` at `layer`. Empty if the node does not reach that layer.
    pub fn neighbors(&self, label: u32, layer: usize) -> &[u32] {
        self.nodes
            .get(label as usize)
            .and_then(|n| n.neighbors.get(layer))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace the vector stored under `index` in place.
    ///
    /// Edges are left untouched: neighbor quality degrades until the graph is retrained.
    pub fn overwrite_node(&mut self, vector: &[f32], index: &str) -> Result<u32> {
        self.space.validate(vector)?;
        let label = self
            .find_word_label(index)
            .ok_or_else(|| HnswkitError::no_word(index))?;
        self.nodes[label as usize].vector.copy_from_slice(vector);
        Ok(label)
    }

    /// Maximum neighbor count at `layer`.
    pub(crate) fn max_neighbors(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }

    /// Draw a level from the exponentially decaying level distribution.
    pub(crate) fn random_level(&mut self) -> usize {
        // 1 - U lies in (0, 1], keeping ln finite.
        let uniform: f64 = 1.0 - self.rng.random::<f64>();
        let level = (-uniform.ln() * self.level_mult).floor() as usize;
        level.min(MAX_LEVEL)
    }

    /// Summary statistics.
    pub fn stats(&self) -> IndexStats {
        let total_degree: usize = self.nodes.iter().map(|n| n.neighbors[0].len()).sum();
        let avg_degree = if self.nodes.is_empty() {
            0.0
        } else {
            total_degree as f32 / self.nodes.len() as f32
        };
        IndexStats {
            len: self.nodes.len(),
            max_elements: self.config.max_elements,
            dimension: self.dimension(),
            distance: self.space.kind(),
            m: self.config.m,
            ef_construction: self.config.ef_construction,
            ef_search: self.config.ef_search,
            normalize: self.config.normalize,
            max_level: self.max_level,
            avg_degree,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_index() -> HnswIndex {
        HnswIndex::new(Space::euclidean(2).unwrap(), HnswConfig::new(8)).unwrap()
    }

    #[test]
    fn test_hnsw_config() {
        let config = HnswConfig::new(128).with_m(8);
        assert_eq!(config.max_elements, 128);
        assert_eq!(config.m, 8);
        assert_eq!(config.m_max0, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hnsw_config_validation() {
        let mut config = HnswConfig::new(0);
        assert!(config.validate().is_err());

        config.max_elements = 128;
        config.m = 1;
        assert!(config.validate().is_err());

        config.m = 16;
        config.ef_construction = 8; // Less than M
        assert!(config.validate().is_err());

        config.ef_construction = 200;
        config.max_elements = u32::MAX as usize;
        assert!(config.validate().is_ok());
        config.max_elements = u32::MAX as usize + 1;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, HnswkitError::Param(_)));

        config.max_elements = 128;
        config.ef_search = u32::MAX as usize + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_index() {
        let index = small_index();
        assert!(index.is_empty());
        assert!(!index.is_full());
        assert_eq!(index.entry_point(), None);
        assert_eq!(index.find_word_label("missing"), None);
        assert!(index.data_by_label(0).is_none());
        assert!(index.neighbors(0, 0).is_empty());
    }

    #[test]
    fn test_random_level_is_seeded() {
        let mut a = small_index();
        let mut b = small_index();
        let levels_a: Vec<usize> = (0..64).map(|_| a.random_level()).collect();
        let levels_b: Vec<usize> = (0..64).map(|_| b.random_level()).collect();
        assert_eq!(levels_a, levels_b);
        assert!(levels_a.iter().all(|&l| l <= MAX_LEVEL));
        // With M = 16 most nodes stay on layer 0.
        assert!(levels_a.iter().filter(|&&l| l == 0).count() > 32);
    }

    #[test]
    fn test_overwrite_unknown_word() {
        let mut index = small_index();
        let err = index.overwrite_node(&[1.0, 0.0], "nope").unwrap_err();
        assert!(matches!(err, HnswkitError::NoWord(_)));
    }
}
