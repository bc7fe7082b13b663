//! Levenshtein edit distance used to drop near-duplicate words from word search results.

use std::cmp::min;

/// Calculate the Levenshtein distance between two strings, counted in chars.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    bounded_distance(&a, &b, usize::MAX).unwrap_or(usize::MAX)
}

/// Two-row Levenshtein with early termination once every cell in a row exceeds `threshold`.
fn bounded_distance(a: &[char], b: &[char], threshold: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > threshold {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        let distance = a.len().max(b.len());
        return (distance <= threshold).then_some(distance);
    }

    let mut prev_row: Vec<usize> = (0..=b.len()).collect();
    let mut curr_row = vec![0; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr_row[0] = i + 1;
        let mut min_in_row = curr_row[0];

        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr_row[j + 1] = min(
                min(prev_row[j + 1] + 1, curr_row[j] + 1),
                prev_row[j] + cost,
            );
            min_in_row = min(min_in_row, curr_row[j + 1]);
        }

        if min_in_row > threshold {
            return None;
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    let distance = prev_row[b.len()];
    (distance <= threshold).then_some(distance)
}

/// Matches candidate words against a fixed query word within a maximum edit distance.
///
/// The query is decomposed into chars once and reused for every candidate.
#[derive(Debug, Clone)]
pub struct EditDistanceFilter {
    query_chars: Vec<char>,
    max_distance: usize,
}

impl EditDistanceFilter {
    /// Create a filter for `query` matching anything within `max_distance` edits.
    pub fn new(query: &str, max_distance: usize) -> Self {
        Self {
            query_chars: query.chars().collect(),
            max_distance,
        }
    }

    /// Maximum edit distance considered a match.
    pub fn max_distance(&self) -> usize {
        self.max_distance
    }

    /// Returns true if `candidate` lies within the filter's edit distance of the query.
    pub fn matches(&self, candidate: &str) -> bool {
        let candidate: Vec<char> = candidate.chars().collect();
        bounded_distance(&self.query_chars, &candidate, self.max_distance).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("", "a"), 1);
        assert_eq!(levenshtein_distance("a", ""), 1);
        assert_eq!(levenshtein_distance("ab", "ac"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("water", "waters"), 1);
    }

    #[test]
    fn test_bounded_distance_early_exit() {
        let a: Vec<char> = "kitten".chars().collect();
        let b: Vec<char> = "sitting".chars().collect();
        assert_eq!(bounded_distance(&a, &b, 3), Some(3));
        assert_eq!(bounded_distance(&a, &b, 2), None);
    }

    #[test]
    fn test_edit_distance_filter() {
        let filter = EditDistanceFilter::new("water", 1);
        assert!(filter.matches("water"));
        assert!(filter.matches("waters"));
        assert!(filter.matches("wafer"));
        assert!(!filter.matches("ocean"));

        let exact_only = EditDistanceFilter::new("water", 0);
        assert!(exact_only.matches("water"));
        assert!(!exact_only.matches("waters"));
    }

    #[test]
    fn test_multibyte_words() {
        assert_eq!(levenshtein_distance("水果", "水"), 1);
        assert!(EditDistanceFilter::new("苹果", 1).matches("苹"));
    }
}
