//! Shared utility modules used across hnswkit components.

pub mod levenshtein;
pub mod simd;
