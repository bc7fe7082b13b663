//! HNSW (Hierarchical Navigable Small World) graph index.
//!
//! HNSW builds a multi-layer proximity graph where each layer holds a subset of
//! the nodes of the layer below. Searches enter at the sparse top layer, descend
//! greedily, and finish with a bounded best-first search on layer 0.
//!
//! Nodes live in a contiguous arena indexed by their dense `label`; neighbor lists
//! store labels, never references. The external `index` string of a node is the
//! only identifier exposed to callers, and maps back to its label through a hash map.
//!
//! - [`graph`]: configuration, node arena and lookups
//! - [`insert`]: point insertion with heuristic neighbor selection
//! - [`search`]: approximate k-NN search and the exhaustive scan
//! - [`codec`]: binary persistence

pub mod codec;
pub mod graph;
pub mod insert;
pub mod search;

pub use self::graph::{HnswConfig, HnswIndex, IndexStats};
pub use self::search::{KnnHeap, Neighbor};
