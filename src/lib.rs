//! # hnswkit
//!
//! Approximate nearest neighbor search over a hierarchical navigable small world
//! (HNSW) graph, with adaptive training toward a precision target and a session
//! layer that serializes training and inserts against concurrent searches.
//!
//! ## Features
//!
//! - HNSW index with heuristic neighbor selection and exhaustive-scan fallback
//! - Squared Euclidean, negative inner product and caller-supplied distances
//! - Training that rebuilds the graph with larger parameters until precision is met
//! - LRU cache of word-query results, invalidated on mutation
//! - Checksummed binary model files written atomically
//!
//! ## Example
//!
//! ```no_run
//! use hnswkit::prelude::*;
//!
//! # fn main() -> hnswkit::error::Result<()> {
//! let session = SyncSession::new();
//! session.init(SessionConfig::new(Mode::Process, 4, "words.hnsw"), None)?;
//!
//! let result = session.search(&SearchRequest::word("water", 5))?;
//! for word in result.words() {
//!     println!("{word}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod hnsw;
pub mod session;
pub mod space;
pub mod sync;
pub mod trainer;
pub mod util;

pub mod prelude {
    pub use crate::config::{Mode, SessionConfig, TrainConfig};
    pub use crate::data::{SearchPayload, SearchResult};
    pub use crate::error::{HnswkitError, Result, StatusCode};
    pub use crate::hnsw::{HnswConfig, HnswIndex, Neighbor};
    pub use crate::session::{InsertMode, QueryInput, SearchRequest, SearchType, Session};
    pub use crate::space::{DistanceFn, DistanceKind, Space};
    pub use crate::sync::SyncSession;
    pub use crate::trainer::{TrainReport, TrainStatus};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
