//! Thread-safe session handle.
//!
//! [`SyncSession`] guards one [`Session`] with a readers-writer lock. Searches and
//! result reads share the lock; `init`, `train`, `insert`, `save` and `ignore` take
//! it exclusively. Training holds the exclusive lock for its whole run, so searches
//! issued meanwhile wait until the new index is in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{SessionConfig, TrainConfig};
use crate::data::SearchResult;
use crate::error::{HnswkitError, Result};
use crate::session::{InsertMode, SearchRequest, Session, SessionStats};
use crate::space::DistanceFn;
use crate::trainer::TrainReport;

/// A [`Session`] shared between threads.
#[derive(Debug, Default)]
pub struct SyncSession {
    inner: RwLock<Option<Session>>,
}

impl SyncSession {
    /// Create an uninitialized handle. Every operation except `init` fails with a mode error
    /// until `init` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an already initialized session.
    pub fn from_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }

    /// Initialize, replacing any previous session. On failure the previous session is kept.
    pub fn init(&self, config: SessionConfig, custom_fn: Option<DistanceFn>) -> Result<()> {
        let mut guard = self.inner.write();
        let session = Session::init(config, custom_fn)?;
        *guard = Some(session);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Run `f` against the session under the shared lock.
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Session) -> Result<T>,
    {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some(session) => f(session),
            None => Err(uninitialized()),
        }
    }

    /// Run `f` against the session under the exclusive lock.
    pub fn with_session_mut<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut guard = self.inner.write();
        match guard.as_mut() {
            Some(session) => f(session),
            None => Err(uninitialized()),
        }
    }

    pub fn train(&self, config: &TrainConfig) -> Result<TrainReport> {
        self.with_session_mut(|session| session.train(config))
    }

    pub fn search(&self, request: &SearchRequest) -> Result<Arc<SearchResult>> {
        self.with_session(|session| session.search(request))
    }

    /// Search and hand the result to `callback` while the shared lock is still held.
    pub fn search_with<T, F>(&self, request: &SearchRequest, callback: F) -> Result<T>
    where
        F: FnOnce(&SearchResult) -> T,
    {
        self.with_session(|session| {
            let result = session.search(request)?;
            Ok(callback(&result))
        })
    }

    pub fn insert(&self, vector: &[f32], word: &str, mode: InsertMode) -> Result<u32> {
        self.with_session_mut(|session| session.insert(vector, word, mode))
    }

    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        self.with_session_mut(|session| session.save(path))
    }

    pub fn ignore(&self, word: &str, is_ignore: bool) -> Result<()> {
        self.with_session_mut(|session| session.ignore(word, is_ignore))
    }

    pub fn result_size(&self) -> Result<usize> {
        self.with_session(Session::result_size)
    }

    pub fn result(&self) -> Result<String> {
        self.with_session(Session::result)
    }

    pub fn stats(&self) -> Result<SessionStats> {
        self.with_session(|session| Ok(session.stats()))
    }
}

fn uninitialized() -> HnswkitError {
    HnswkitError::mode("session is not initialized")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;
    use crate::error::StatusCode;

    #[test]
    fn test_uninitialized_session() {
        let sync = SyncSession::new();
        assert!(!sync.is_initialized());
        let err = sync.search(&SearchRequest::word("water", 1)).unwrap_err();
        assert_eq!(err.status(), StatusCode::Mode);
        assert_eq!(sync.result_size().unwrap_err().status(), StatusCode::Mode);
    }

    #[test]
    fn test_failed_init_keeps_previous_session() {
        let dir = tempfile::TempDir::new().unwrap();
        let sync = SyncSession::new();
        sync.init(SessionConfig::new(Mode::Train, 4, dir.path().join("m")), None)
            .unwrap();

        let err = sync
            .init(SessionConfig::new(Mode::Process, 4, dir.path().join("absent")), None)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::Path);
        assert_eq!(sync.stats().unwrap().mode, Mode::Train);
    }

    #[test]
    fn test_reads_wait_for_training() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::mpsc;

        let dir = tempfile::TempDir::new().unwrap();
        let data = dir.path().join("words.txt");
        let lines: Vec<String> = (0..200)
            .map(|i| format!("{{\"w{i}\": [{}, {}, {}]}}", i % 11, i % 13, i / 17))
            .collect();
        std::fs::write(&data, lines.join("\n")).unwrap();

        let sync = SyncSession::new();
        sync.init(SessionConfig::new(Mode::Train, 3, dir.path().join("m")), None)
            .unwrap();
        assert!(sync.stats().unwrap().index.is_none());

        let config = TrainConfig::new(&data)
            .with_ranks(1, 10)
            .with_max_epoch(3);
        let trained = AtomicBool::new(false);
        let (started_tx, started_rx) = mpsc::channel();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                sync.with_session_mut(|session| {
                    started_tx.send(()).unwrap();
                    let report = session.train(&config)?;
                    trained.store(true, Ordering::SeqCst);
                    Ok(report)
                })
                .unwrap();
            });

            started_rx.recv().unwrap();
            let stats = sync.stats().unwrap();
            assert!(trained.load(Ordering::SeqCst));
            assert_eq!(stats.index.unwrap().len, 200);

            let err = sync.search(&SearchRequest::word("w1", 1)).unwrap_err();
            assert_eq!(err.status(), StatusCode::Mode);
        });
    }

    #[test]
    fn test_sync_session_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SyncSession>();
    }
}
