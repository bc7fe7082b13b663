//! Point insertion with heuristic neighbor selection.

use super::graph::{HnswIndex, Node};
use super::search::{Neighbor, VisitedSet};
use crate::error::{HnswkitError, Result};

impl HnswIndex {
    /// Insert a new point under the external identifier `index` and return its label.
    ///
    /// Labels are assigned densely in insertion order. Fails with `ModelSize` when the
    /// index is full and with `Param` if `index` is already present; replacing an
    /// existing point goes through [`HnswIndex::overwrite_node`].
    pub fn add_point(&mut self, vector: &[f32], index: &str) -> Result<u32> {
        if self.is_full() {
            return Err(HnswkitError::model_size(format!(
                "index is full ({} elements)",
                self.config.max_elements
            )));
        }
        self.space.validate(vector)?;
        if self.lookup.contains_key(index) {
            return Err(HnswkitError::param(format!("index already exists: {index}")));
        }

        let label = self.nodes.len() as u32;
        let level = self.random_level();
        let mut node = Node::new(index.to_string(), vector.to_vec(), level);

        let Some(entry) = self.entry_point else {
            self.push_node(node);
            self.entry_point = Some(label);
            self.max_level = level;
            return Ok(label);
        };

        let mut visited = VisitedSet::new(self.nodes.len() + 1);
        let current = self.descend(vector, entry, level, &mut visited);

        let top = level.min(self.max_level);
        let mut entry_points = vec![current];
        for layer in (0..=top).rev() {
            let candidates = self.search_layer(
                vector,
                &entry_points,
                self.config.ef_construction,
                layer,
                &mut visited,
                &|_| true,
            );
            let selected = self.select_neighbors(&candidates, self.max_neighbors(layer));
            node.neighbors[layer] = selected.iter().map(|n| n.label).collect();
            entry_points = candidates.iter().map(|n| n.label).collect();
        }

        let links: Vec<Vec<u32>> = node.neighbors.clone();
        self.push_node(node);

        for (layer, neighbors) in links.iter().enumerate() {
            for &neighbor in neighbors {
                self.link(neighbor, label, layer);
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(label);
        }

        Ok(label)
    }

    /// Overwrite the vector of `index` if it exists, insert it otherwise.
    pub fn upsert(&mut self, vector: &[f32], index: &str) -> Result<u32> {
        match self.find_word_label(index) {
            Some(_) => self.overwrite_node(vector, index),
            None => self.add_point(vector, index),
        }
    }

    fn push_node(&mut self, node: Node) {
        let label = self.nodes.len() as u32;
        self.lookup.insert(node.index.clone(), label);
        self.nodes.push(node);
    }

    /// Add the back-link `from -> to` at `layer`, pruning `from` if it overflows.
    fn link(&mut self, from: u32, to: u32, layer: usize) {
        let bound = self.max_neighbors(layer);
        let from_idx = from as usize;
        self.nodes[from_idx].neighbors[layer].push(to);
        if self.nodes[from_idx].neighbors[layer].len() <= bound {
            return;
        }

        let base = &self.nodes[from_idx].vector;
        let mut candidates: Vec<Neighbor> = self.nodes[from_idx].neighbors[layer]
            .iter()
            .map(|&label| Neighbor {
                distance: self.space.distance(base, &self.nodes[label as usize].vector),
                label,
            })
            .collect();
        candidates.sort();
        let kept = self.select_neighbors(&candidates, bound);
        self.nodes[from_idx].neighbors[layer] = kept.iter().map(|n| n.label).collect();
    }

    /// Heuristic neighbor selection over `candidates` sorted closest first.
    ///
    /// A candidate is kept if it is closer to the base than to any already selected
    /// neighbor. Remaining slots are back-filled with the closest discarded candidates.
    pub(crate) fn select_neighbors(&self, candidates: &[Neighbor], bound: usize) -> Vec<Neighbor> {
        if candidates.len() <= bound {
            return candidates.to_vec();
        }

        let mut selected: Vec<Neighbor> = Vec::with_capacity(bound);
        let mut discarded: Vec<Neighbor> = Vec::new();

        for &candidate in candidates {
            if selected.len() >= bound {
                break;
            }
            let candidate_vec = &self.nodes[candidate.label as usize].vector;
            let diverse = selected.iter().all(|chosen| {
                let between = self
                    .space
                    .distance(candidate_vec, &self.nodes[chosen.label as usize].vector);
                candidate.distance <= between
            });
            if diverse {
                selected.push(candidate);
            } else {
                discarded.push(candidate);
            }
        }

        for candidate in discarded {
            if selected.len() >= bound {
                break;
            }
            selected.push(candidate);
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::HnswConfig;
    use crate::space::Space;

    fn config(n: usize) -> HnswConfig {
        HnswConfig::new(n).with_m(4).with_ef_construction(16)
    }

    #[test]
    fn test_labels_are_dense() {
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config(10)).unwrap();
        for i in 0..5 {
            let label = index.add_point(&[i as f32, 0.0], &format!("w{i}")).unwrap();
            assert_eq!(label, i);
        }
        assert_eq!(index.len(), 5);
        assert_eq!(index.find_word_label("w3"), Some(3));
        assert_eq!(index.data_by_label(3), Some(&[3.0, 0.0][..]));
    }

    #[test]
    fn test_first_point_is_entry() {
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config(4)).unwrap();
        index.add_point(&[0.0, 0.0], "a").unwrap();
        assert_eq!(index.entry_point(), Some(0));
        assert_eq!(index.max_level(), index.level_of(0).unwrap());
    }

    #[test]
    fn test_capacity_and_duplicates() {
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config(2)).unwrap();
        index.add_point(&[0.0, 0.0], "a").unwrap();

        let err = index.add_point(&[1.0, 0.0], "a").unwrap_err();
        assert!(matches!(err, HnswkitError::Param(_)));

        index.add_point(&[1.0, 0.0], "b").unwrap();
        assert!(index.is_full());
        let err = index.add_point(&[2.0, 0.0], "c").unwrap_err();
        assert!(matches!(err, HnswkitError::ModelSize(_)));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut index = HnswIndex::new(Space::euclidean(3).unwrap(), config(4)).unwrap();
        assert!(index.add_point(&[1.0, 2.0], "a").is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_degree_bounds_hold() {
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config(200)).unwrap();
        for i in 0..200 {
            let v = [(i as f32 * 0.37).sin(), (i as f32 * 0.11).cos()];
            index.add_point(&v, &i.to_string()).unwrap();
        }
        for label in 0..index.len() as u32 {
            let level = index.level_of(label).unwrap();
            for layer in 0..=level {
                let neighbors = index.neighbors(label, layer);
                assert!(neighbors.len() <= index.max_neighbors(layer));
                assert!(!neighbors.contains(&label));
                for &n in neighbors {
                    assert!(index.level_of(n).unwrap() >= layer);
                }
            }
        }
    }

    #[test]
    fn test_overwrite_keeps_label_and_edges() {
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config(8)).unwrap();
        for i in 0..4 {
            index.add_point(&[i as f32, 1.0], &format!("w{i}")).unwrap();
        }
        let edges = index.neighbors(2, 0).to_vec();
        let label = index.overwrite_node(&[9.0, 9.0], "w2").unwrap();
        assert_eq!(label, 2);
        assert_eq!(index.len(), 4);
        assert_eq!(index.data_by_label(2), Some(&[9.0, 9.0][..]));
        assert_eq!(index.neighbors(2, 0), edges.as_slice());
    }

    #[test]
    fn test_select_neighbors_prefers_diverse() {
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config(8)).unwrap();
        // Two points clustered to the east, one to the north.
        index.add_point(&[1.0, 0.0], "east").unwrap();
        index.add_point(&[1.1, 0.0], "east2").unwrap();
        index.add_point(&[0.0, 1.5], "north").unwrap();

        let base = [0.0, 0.0];
        let mut candidates: Vec<Neighbor> = (0..3)
            .map(|label| Neighbor {
                distance: index.space.distance(&base, index.data_by_label(label).unwrap()),
                label,
            })
            .collect();
        candidates.sort();

        let chosen = index.select_neighbors(&candidates, 2);
        let labels: Vec<u32> = chosen.iter().map(|n| n.label).collect();
        assert_eq!(labels, vec![0, 2]);
    }
}
