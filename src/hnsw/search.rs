//! Approximate k-NN search over the graph and the exhaustive scan.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use bit_vec::BitVec;

use super::graph::HnswIndex;

/// A search hit: a label with its distance to the query.
///
/// Ordered by distance first, then by label, so heaps and sorts are deterministic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub label: u32,
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.label.cmp(&other.label))
    }
}

/// Max-heap of results; the farthest hit sits on top.
pub type KnnHeap = BinaryHeap<Neighbor>;

/// Visited markers for one traversal.
pub(crate) struct VisitedSet {
    bits: BitVec,
    touched: Vec<u32>,
}

impl VisitedSet {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            bits: BitVec::from_elem(capacity, false),
            touched: Vec::new(),
        }
    }

    /// Mark `label`; returns false if it was already marked.
    pub(crate) fn insert(&mut self, label: u32) -> bool {
        let idx = label as usize;
        if idx >= self.bits.len() {
            self.bits.grow(idx + 1 - self.bits.len(), false);
        }
        if self.bits.get(idx).unwrap_or(false) {
            return false;
        }
        self.bits.set(idx, true);
        self.touched.push(label);
        true
    }

    /// Unmark everything touched since the last clear.
    pub(crate) fn clear(&mut self) {
        for label in self.touched.drain(..) {
            self.bits.set(label as usize, false);
        }
    }
}

impl HnswIndex {
    /// Best-first search of a single layer.
    ///
    /// Labels rejected by `accept` are still traversed but never enter the result set.
    /// Returns up to `ef` hits sorted closest first.
    pub(crate) fn search_layer<F>(
        &self,
        query: &[f32],
        entry_points: &[u32],
        ef: usize,
        layer: usize,
        visited: &mut VisitedSet,
        accept: &F,
    ) -> Vec<Neighbor>
    where
        F: Fn(u32) -> bool,
    {
        visited.clear();
        let mut candidates: BinaryHeap<Reverse<Neighbor>> = BinaryHeap::new();
        let mut results: BinaryHeap<Neighbor> = BinaryHeap::new();

        for &label in entry_points {
            if !visited.insert(label) {
                continue;
            }
            let distance = self.space.distance(query, &self.nodes[label as usize].vector);
            let hit = Neighbor { distance, label };
            candidates.push(Reverse(hit));
            if accept(label) {
                results.push(hit);
            }
        }

        while let Some(Reverse(current)) = candidates.pop() {
            if results.len() >= ef {
                if let Some(worst) = results.peek() {
                    if current.distance > worst.distance {
                        break;
                    }
                }
            }

            for &next in self.neighbors(current.label, layer) {
                if !visited.insert(next) {
                    continue;
                }
                let distance = self.space.distance(query, &self.nodes[next as usize].vector);
                let hit = Neighbor {
                    distance,
                    label: next,
                };
                let worst = results.peek().map(|n| n.distance).unwrap_or(f32::INFINITY);
                if results.len() < ef || distance < worst {
                    candidates.push(Reverse(hit));
                    if accept(next) {
                        results.push(hit);
                        if results.len() > ef {
                            results.pop();
                        }
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Greedy descent from the top layer down to (but excluding) `stop_layer`.
    pub(crate) fn descend(
        &self,
        query: &[f32],
        entry: u32,
        stop_layer: usize,
        visited: &mut VisitedSet,
    ) -> u32 {
        let mut current = entry;
        let mut layer = self.max_level;
        while layer > stop_layer {
            let found = self.search_layer(query, &[current], 1, layer, visited, &|_| true);
            if let Some(best) = found.first() {
                current = best.label;
            }
            layer -= 1;
        }
        current
    }

    /// Approximate k nearest neighbors of `query`.
    pub fn search_knn(&self, query: &[f32], k: usize) -> KnnHeap {
        self.search_knn_filtered(query, k, |_| true)
    }

    /// Approximate k nearest neighbors among labels accepted by `accept`.
    ///
    /// Rejected labels still route the traversal. The beam width is
    /// `max(ef_search, k)`.
    pub fn search_knn_filtered<F>(&self, query: &[f32], k: usize, accept: F) -> KnnHeap
    where
        F: Fn(u32) -> bool,
    {
        let Some(entry) = self.entry_point else {
            return KnnHeap::new();
        };
        if k == 0 {
            return KnnHeap::new();
        }

        let mut visited = VisitedSet::new(self.nodes.len());
        let current = self.descend(query, entry, 0, &mut visited);
        let ef = self.config.ef_search.max(k);
        let found = self.search_layer(query, &[current], ef, 0, &mut visited, &accept);

        found.into_iter().take(k).collect()
    }

    /// Exact k nearest neighbors by scanning every stored vector.
    pub fn force_loop(&self, query: &[f32], k: usize) -> KnnHeap {
        self.force_loop_filtered(query, k, |_| true)
    }

    /// Exact k nearest neighbors among labels accepted by `accept`.
    pub fn force_loop_filtered<F>(&self, query: &[f32], k: usize, accept: F) -> KnnHeap
    where
        F: Fn(u32) -> bool,
    {
        let mut heap = KnnHeap::with_capacity(k.min(self.nodes.len()).saturating_add(1));
        if k == 0 {
            return heap;
        }
        for (label, node) in self.nodes.iter().enumerate() {
            let label = label as u32;
            if !accept(label) {
                continue;
            }
            let hit = Neighbor {
                distance: self.space.distance(query, &node.vector),
                label,
            };
            if heap.len() < k {
                heap.push(hit);
            } else if heap.peek().is_some_and(|worst| hit < *worst) {
                heap.pop();
                heap.push(hit);
            }
        }
        heap
    }
}
