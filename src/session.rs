//! A session over one resident index.
//!
//! The session owns the distance space, the index, the result cache and the
//! ignore set. It enforces the operating mode: a `Train` session builds models,
//! a `Process` session loads one and serves searches and inserts.
//!
//! Read operations take `&self` and write operations take `&mut self`, so a
//! [`crate::sync::SyncSession`] can share a session between threads behind a
//! readers-writer lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::{CacheStats, QueryShape, ResultCache};
use crate::config::{Mode, SessionConfig, TrainConfig, with_model_suffix};
use crate::data::{ResultDetail, SearchPath, SearchPayload, SearchResult};
use crate::error::{HnswkitError, Result};
use crate::hnsw::{HnswIndex, IndexStats};
use crate::space::{self, DistanceFn, Space};
use crate::trainer::{self, TrainReport};
use crate::util::levenshtein::EditDistanceFilter;

/// How a search interprets its input and which path it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    /// Approximate search for a query vector.
    Query,
    /// Approximate search for the vector stored under a word.
    Word,
    /// Exhaustive scan for a query vector.
    LoopQuery,
    /// Exhaustive scan for the vector stored under a word.
    LoopWord,
}

impl SearchType {
    pub fn name(&self) -> &'static str {
        match self {
            SearchType::Query => "query",
            SearchType::Word => "word",
            SearchType::LoopQuery => "loop_query",
            SearchType::LoopWord => "loop_word",
        }
    }

    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "query" => Ok(SearchType::Query),
            "word" => Ok(SearchType::Word),
            "loop_query" | "loop-query" => Ok(SearchType::LoopQuery),
            "loop_word" | "loop-word" => Ok(SearchType::LoopWord),
            _ => Err(HnswkitError::param(format!("Unknown search type: {s}"))),
        }
    }

    /// Whether the input is a stored word rather than a vector.
    pub fn is_word(&self) -> bool {
        matches!(self, SearchType::Word | SearchType::LoopWord)
    }

    /// Whether the search scans every node.
    pub fn is_exhaustive(&self) -> bool {
        matches!(self, SearchType::LoopQuery | SearchType::LoopWord)
    }

    pub fn search_path(&self) -> SearchPath {
        if self.is_exhaustive() {
            SearchPath::ForceLoop
        } else {
            SearchPath::AnnSearch
        }
    }

    fn tag(&self) -> u8 {
        match self {
            SearchType::Query => 0,
            SearchType::Word => 1,
            SearchType::LoopQuery => 2,
            SearchType::LoopWord => 3,
        }
    }
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The thing being searched for.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Vector(Vec<f32>),
    Word(String),
}

/// A search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: QueryInput,
    pub search_type: SearchType,
    pub top_k: usize,
    /// Drop hits whose word lies within this edit distance of the query word.
    /// Only applies to word searches.
    pub filter_edit_distance: Option<usize>,
}

impl SearchRequest {
    /// Approximate search for a query vector.
    pub fn vector(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            query: QueryInput::Vector(vector),
            search_type: SearchType::Query,
            top_k,
            filter_edit_distance: None,
        }
    }

    /// Approximate search for a stored word.
    pub fn word(word: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: QueryInput::Word(word.into()),
            search_type: SearchType::Word,
            top_k,
            filter_edit_distance: None,
        }
    }

    /// Switch to the exhaustive variant of the current search type.
    pub fn exhaustive(mut self) -> Self {
        self.search_type = match self.search_type {
            SearchType::Query | SearchType::LoopQuery => SearchType::LoopQuery,
            SearchType::Word | SearchType::LoopWord => SearchType::LoopWord,
        };
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn with_filter_edit_distance(mut self, distance: usize) -> Self {
        self.filter_edit_distance = Some(distance);
        self
    }

    fn shape(&self) -> QueryShape {
        QueryShape {
            top_k: self.top_k,
            search_type: self.search_type.tag(),
            filter_edit_distance: self.filter_edit_distance,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(HnswkitError::param("top_k must be > 0"));
        }
        match (&self.query, self.search_type.is_word()) {
            (QueryInput::Word(_), true) | (QueryInput::Vector(_), false) => Ok(()),
            (QueryInput::Word(_), false) => Err(HnswkitError::param(format!(
                "search type {} expects a vector, got a word",
                self.search_type
            ))),
            (QueryInput::Vector(_), true) => Err(HnswkitError::param(format!(
                "search type {} expects a word, got a vector",
                self.search_type
            ))),
        }
    }
}

/// How an insert treats an existing word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Replace the stored vector.
    #[default]
    Overwrite,
    /// Keep the stored vector and do nothing.
    Discard,
}

impl InsertMode {
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "overwrite" => Ok(InsertMode::Overwrite),
            "discard" => Ok(InsertMode::Discard),
            _ => Err(HnswkitError::param(format!("Unknown insert mode: {s}"))),
        }
    }
}

/// Snapshot of session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub mode: Mode,
    pub model_path: PathBuf,
    pub index: Option<IndexStats>,
    pub cache: CacheStats,
    pub ignored: usize,
}

/// One resident index with its cache and operating mode.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    space: Space,
    model_path: PathBuf,
    index: Option<HnswIndex>,
    normalize: bool,
    ignored: AHashSet<u32>,
    cache: Mutex<ResultCache>,
    last_result: Mutex<Option<Arc<SearchResult>>>,
}

impl Session {
    /// Create a session. In `Process` mode the model is loaded from the configured path.
    ///
    /// `custom_fn` is required when the configured distance is `Custom`.
    pub fn init(config: SessionConfig, custom_fn: Option<DistanceFn>) -> Result<Self> {
        config.validate()?;
        let space = Space::new(config.distance, config.dimension, custom_fn)?;
        let model_path = config.resolved_model_path();

        let (index, normalize) = match config.mode {
            Mode::Process => {
                let index = HnswIndex::load(&model_path, space.clone())?;
                let normalize = index.normalize();
                tracing::info!(
                    path = %model_path.display(),
                    nodes = index.len(),
                    normalize,
                    "Loaded model"
                );
                (Some(index), normalize)
            }
            Mode::Train => (None, false),
        };

        Ok(Self {
            cache: Mutex::new(ResultCache::new(config.cache_capacity)),
            last_result: Mutex::new(None),
            ignored: AHashSet::new(),
            config,
            space,
            model_path,
            index,
            normalize,
        })
    }

    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn space(&self) -> &Space {
        &self.space
    }

    /// Resolved model path, always carrying the model suffix.
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// The resident index, if one was trained or loaded.
    pub fn index(&self) -> Option<&HnswIndex> {
        self.index.as_ref()
    }

    fn require_mode(&self, mode: Mode) -> Result<()> {
        if self.config.mode != mode {
            return Err(HnswkitError::mode(format!(
                "operation requires {mode} mode, session is in {} mode",
                self.config.mode
            )));
        }
        Ok(())
    }

    fn loaded_index(&self) -> Result<&HnswIndex> {
        self.index
            .as_ref()
            .ok_or_else(|| HnswkitError::mode("no model is loaded"))
    }

    fn loaded_index_mut(&mut self) -> Result<&mut HnswIndex> {
        self.index
            .as_mut()
            .ok_or_else(|| HnswkitError::mode("no model is loaded"))
    }

    /// Train a model, keep it resident and save it to the model path.
    pub fn train(&mut self, config: &TrainConfig) -> Result<TrainReport> {
        self.require_mode(Mode::Train)?;
        let (index, report) = trainer::train(&self.space, config, &self.model_path)?;
        self.normalize = index.normalize();
        self.index = Some(index);
        self.ignored.clear();
        self.cache.get_mut().clear();
        Ok(report)
    }

    /// Run a search. Word searches are served from the result cache when possible.
    pub fn search(&self, request: &SearchRequest) -> Result<Arc<SearchResult>> {
        self.require_mode(Mode::Process)?;
        request.validate()?;
        let shape = request.shape();

        let cached = {
            let mut cache = self.cache.lock();
            match &request.query {
                QueryInput::Word(word) => cache.lookup(word, shape),
                QueryInput::Vector(_) => {
                    cache.observe(shape);
                    None
                }
            }
        };

        let result = match cached {
            Some(hit) => hit,
            None => {
                let result = Arc::new(self.run_search(request)?);
                if let QueryInput::Word(word) = &request.query {
                    self.cache.lock().store(word, shape, Arc::clone(&result));
                }
                result
            }
        };

        *self.last_result.lock() = Some(Arc::clone(&result));
        Ok(result)
    }

    fn run_search(&self, request: &SearchRequest) -> Result<SearchResult> {
        let index = self.loaded_index()?;

        let (query, edit_filter) = match &request.query {
            QueryInput::Vector(vector) => {
                self.space.validate(vector)?;
                let mut query = vector.clone();
                if self.normalize {
                    space::normalize(&mut query);
                }
                (query, None)
            }
            QueryInput::Word(word) => {
                let label = index
                    .find_word_label(word)
                    .ok_or_else(|| HnswkitError::no_word(word.as_str()))?;
                let query = index
                    .data_by_label(label)
                    .map(<[f32]>::to_vec)
                    .ok_or_else(|| HnswkitError::other(format!("label {label} has no data")))?;
                let filter = request
                    .filter_edit_distance
                    .map(|d| EditDistanceFilter::new(word, d));
                (query, filter)
            }
        };

        let accept = |label: u32| {
            if self.ignored.contains(&label) {
                return false;
            }
            match (&edit_filter, index.index_of(label)) {
                (Some(filter), Some(word)) => !filter.matches(word),
                _ => true,
            }
        };

        let heap = if request.search_type.is_exhaustive() {
            index.force_loop_filtered(&query, request.top_k, accept)
        } else {
            index.search_knn_filtered(&query, request.top_k, accept)
        };

        let mut details = Vec::with_capacity(heap.len());
        for hit in heap.into_sorted_vec() {
            let (Some(word), Some(node)) = (index.index_of(hit.label), index.data_by_label(hit.label))
            else {
                return Err(HnswkitError::other(format!("label {} has no node", hit.label)));
            };
            details.push(ResultDetail {
                label: word.to_string(),
                index: hit.label,
                distance: hit.distance,
                node: node.to_vec(),
            });
        }

        let payload = SearchPayload::new(self.space.kind(), request.search_type.search_path(), details);
        SearchResult::new(payload)
    }

    /// Insert or update a vector. The capacity check comes first, even for existing words.
    ///
    /// Returns the label of the affected node.
    pub fn insert(&mut self, vector: &[f32], word: &str, mode: InsertMode) -> Result<u32> {
        self.require_mode(Mode::Process)?;
        if word.is_empty() {
            return Err(HnswkitError::param("index must not be empty"));
        }
        self.space.validate(vector)?;
        let normalize = self.normalize;
        let index = self.loaded_index_mut()?;
        if index.is_full() {
            return Err(HnswkitError::model_size(format!(
                "index is full ({} elements)",
                index.config().max_elements
            )));
        }

        let mut vector = vector.to_vec();
        if normalize {
            space::normalize(&mut vector);
        }

        let label = match mode {
            InsertMode::Overwrite => index.upsert(&vector, word)?,
            InsertMode::Discard => match index.find_word_label(word) {
                Some(label) => label,
                None => index.add_point(&vector, word)?,
            },
        };

        self.cache.get_mut().clear();
        Ok(label)
    }

    /// Save the index to `path` (suffix applied) or to the session's model path.
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.require_mode(Mode::Process)?;
        let index = self.loaded_index()?;
        let path = path
            .map(with_model_suffix)
            .unwrap_or_else(|| self.model_path.clone());
        index.save(&path)?;
        tracing::info!(path = %path.display(), nodes = index.len(), "Saved model");
        Ok(path)
    }

    /// The most recent search result.
    pub fn last_result(&self) -> Option<Arc<SearchResult>> {
        self.last_result.lock().clone()
    }

    /// Byte length of the most recent result payload, zero if none.
    pub fn result_size(&self) -> Result<usize> {
        self.require_mode(Mode::Process)?;
        Ok(self
            .last_result
            .lock()
            .as_ref()
            .map_or(0, |r| r.json().len()))
    }

    /// JSON payload of the most recent search, empty if none.
    pub fn result(&self) -> Result<String> {
        self.require_mode(Mode::Process)?;
        Ok(self
            .last_result
            .lock()
            .as_ref()
            .map(|r| r.json().to_string())
            .unwrap_or_default())
    }

    /// Suppress (`is_ignore`) or restore a stored word in search results.
    pub fn ignore(&mut self, word: &str, is_ignore: bool) -> Result<()> {
        self.require_mode(Mode::Process)?;
        let label = self
            .loaded_index()?
            .find_word_label(word)
            .ok_or_else(|| HnswkitError::no_word(word))?;
        let changed = if is_ignore {
            self.ignored.insert(label)
        } else {
            self.ignored.remove(&label)
        };
        if changed {
            tracing::debug!(word, is_ignore, "Ignore set changed");
        }
        self.cache.get_mut().clear();
        Ok(())
    }

    /// Whether `word` is currently suppressed.
    pub fn is_ignored(&self, word: &str) -> bool {
        self.index
            .as_ref()
            .and_then(|index| index.find_word_label(word))
            .is_some_and(|label| self.ignored.contains(&label))
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            mode: self.config.mode,
            model_path: self.model_path.clone(),
            index: self.index.as_ref().map(HnswIndex::stats),
            cache: self.cache.lock().stats(),
            ignored: self.ignored.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::error::StatusCode;
    use crate::hnsw::HnswConfig;

    /// Save a small model and open a process session over it.
    fn process_session(dir: &TempDir, capacity: usize) -> Session {
        let path = dir.path().join("words.hnsw");
        let config = HnswConfig::new(capacity).with_m(4).with_ef_construction(16);
        let mut index = HnswIndex::new(Space::euclidean(2).unwrap(), config).unwrap();
        let words = ["water", "waters", "wafer", "ocean", "river", "stone"];
        for (i, word) in words.iter().enumerate() {
            index.add_point(&[i as f32, 0.0], word).unwrap();
        }
        index.save(&path).unwrap();

        let config = SessionConfig::new(Mode::Process, 2, dir.path().join("words"));
        Session::init(config, None).unwrap()
    }

    #[test]
    fn test_mode_checks() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::new(Mode::Train, 2, dir.path().join("m"));
        let mut session = Session::init(config, None).unwrap();
        let err = session.search(&SearchRequest::word("water", 1)).unwrap_err();
        assert_eq!(err.status(), StatusCode::Mode);
        let err = session
            .insert(&[0.0, 0.0], "water", InsertMode::Overwrite)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::Mode);

        let mut session = process_session(&dir, 10);
        let err = session.train(&TrainConfig::new("data.txt")).unwrap_err();
        assert_eq!(err.status(), StatusCode::Mode);
    }

    #[test]
    fn test_process_mode_requires_model() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::new(Mode::Process, 2, dir.path().join("absent"));
        let err = Session::init(config, None).unwrap_err();
        assert_eq!(err.status(), StatusCode::Path);
    }

    #[test]
    fn test_custom_distance_requires_function() {
        let dir = TempDir::new().unwrap();
        let config = SessionConfig::new(Mode::Train, 2, dir.path().join("m"))
            .with_distance(crate::space::DistanceKind::Custom);
        let err = Session::init(config, None).unwrap_err();
        assert_eq!(err.status(), StatusCode::Param);
    }

    #[test]
    fn test_word_search_includes_self_first() {
        let dir = TempDir::new().unwrap();
        let session = process_session(&dir, 10);
        let result = session.search(&SearchRequest::word("ocean", 3)).unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result.words().next(), Some("ocean"));
        assert_eq!(result.payload().search_type, SearchPath::AnnSearch);

        let exact = session
            .search(&SearchRequest::word("ocean", 3).exhaustive())
            .unwrap();
        assert_eq!(exact.payload().search_type, SearchPath::ForceLoop);
        assert_eq!(exact.words().next(), Some("ocean"));
    }

    #[test]
    fn test_input_type_mismatch() {
        let dir = TempDir::new().unwrap();
        let session = process_session(&dir, 10);
        let request = SearchRequest::word("ocean", 3).with_search_type(SearchType::Query);
        assert_eq!(session.search(&request).unwrap_err().status(), StatusCode::Param);
        let request = SearchRequest::vector(vec![0.0, 0.0], 0);
        assert_eq!(session.search(&request).unwrap_err().status(), StatusCode::Param);
        let err = session.search(&SearchRequest::word("missing", 3)).unwrap_err();
        assert_eq!(err.status(), StatusCode::NoWord);
    }

    #[test]
    fn test_edit_distance_filter() {
        let dir = TempDir::new().unwrap();
        let session = process_session(&dir, 10);
        let request = SearchRequest::word("water", 3)
            .exhaustive()
            .with_filter_edit_distance(1);
        let result = session.search(&request).unwrap();
        let words: Vec<&str> = result.words().collect();
        assert_eq!(words, vec!["ocean", "river", "stone"]);
    }

    #[test]
    fn test_ignore_suppresses_word() {
        let dir = TempDir::new().unwrap();
        let mut session = process_session(&dir, 10);
        session.ignore("waters", true).unwrap();
        assert!(session.is_ignored("waters"));
        let result = session
            .search(&SearchRequest::word("water", 2).exhaustive())
            .unwrap();
        assert_eq!(result.words().collect::<Vec<_>>(), vec!["water", "wafer"]);

        session.ignore("waters", false).unwrap();
        let result = session
            .search(&SearchRequest::word("water", 2).exhaustive())
            .unwrap();
        assert_eq!(result.words().collect::<Vec<_>>(), vec!["water", "waters"]);

        let err = session.ignore("missing", true).unwrap_err();
        assert_eq!(err.status(), StatusCode::NoWord);
    }

    #[test]
    fn test_insert_modes() {
        let dir = TempDir::new().unwrap();
        let mut session = process_session(&dir, 10);

        let label = session
            .insert(&[9.0, 9.0], "water", InsertMode::Discard)
            .unwrap();
        let index = session.index().unwrap();
        assert_eq!(index.len(), 6);
        assert_eq!(index.data_by_label(label), Some(&[0.0, 0.0][..]));

        session
            .insert(&[9.0, 9.0], "water", InsertMode::Overwrite)
            .unwrap();
        session
            .insert(&[9.0, 9.0], "water", InsertMode::Overwrite)
            .unwrap();
        let index = session.index().unwrap();
        assert_eq!(index.len(), 6);
        assert_eq!(index.data_by_label(label), Some(&[9.0, 9.0][..]));

        let label = session
            .insert(&[7.0, 1.0], "island", InsertMode::Discard)
            .unwrap();
        assert_eq!(label, 6);
    }

    #[test]
    fn test_insert_at_capacity() {
        let dir = TempDir::new().unwrap();
        let mut session = process_session(&dir, 6);
        let err = session
            .insert(&[1.0, 1.0], "water", InsertMode::Overwrite)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::ModelSize);
        let index = session.index().unwrap();
        assert_eq!(index.len(), 6);
        assert_eq!(index.data_by_label(0), Some(&[0.0, 0.0][..]));
    }

    #[test]
    fn test_result_accessors() {
        let dir = TempDir::new().unwrap();
        let session = process_session(&dir, 10);
        assert_eq!(session.result_size().unwrap(), 0);
        assert_eq!(session.result().unwrap(), "");

        let result = session.search(&SearchRequest::vector(vec![4.9, 0.0], 1)).unwrap();
        assert_eq!(session.result().unwrap(), result.json());
        assert_eq!(session.result_size().unwrap(), result.json().len());
    }

    #[test]
    fn test_save_to_explicit_path() {
        let dir = TempDir::new().unwrap();
        let session = process_session(&dir, 10);
        let path = session.save(Some(&dir.path().join("copy"))).unwrap();
        assert_eq!(path, dir.path().join("copy.hnsw"));
        assert!(path.exists());
    }
}
