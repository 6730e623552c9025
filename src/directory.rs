//! Application-wide cache in front of the external user directory.
//!
//! The directory API is rate limited and only offers a "list everybody" call, so the whole
//! listing is kept in memory as one snapshot and replaced wholesale when it goes
//! stale. A single [`DirectoryCache`] is created at startup and shared by every request.
//!
//! Refreshes are single-flight: callers that observe a stale snapshot queue up on the write lock,
//! and only the first one to get it calls the directory. Everybody behind it re-checks and
//! reuses that attempt's outcome, successful or not.
//!
//! When a refresh fails and an older snapshot exists, lookups keep serving the older snapshot and
//! log the failure. [`DirectoryCache::ensure_fresh`] and [`DirectoryCache::refresh`] still report
//! the failure to their caller.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{
    config::DirectoryConfig,
    error::{BoxError, Error, Result},
    model::DirectoryEntry,
};

/// Client for the external user directory.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    /// Lists every known user in one call. Fails without partial data.
    async fn list_users(&self) -> Result<Vec<DirectoryEntry>, BoxError>;
}

/// Every directory entry from one listing call.
#[derive(Debug)]
struct DirectorySnapshot {
    entries: HashMap<String, DirectoryEntry>,
    captured_at: Instant,
}

impl DirectorySnapshot {
    fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(|e| (e.id.clone(), e)).collect(),
            captured_at: Instant::now(),
        }
    }

    fn get(&self, id: &str) -> Option<&DirectoryEntry> {
        self.entries.get(id)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn lookup(snapshot: Option<&Self>, id: &str) -> DirectoryEntry {
        snapshot
            .and_then(|s| s.get(id))
            .cloned()
            .unwrap_or_else(|| DirectoryEntry::placeholder(id))
    }
}

#[derive(Debug)]
struct RefreshFailure {
    at: Instant,
    error: Error,
}

#[derive(Debug, Default)]
struct DirectoryState {
    snapshot: Option<Arc<DirectorySnapshot>>,
    last_failure: Option<RefreshFailure>,
}

impl DirectoryState {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.snapshot.as_ref().is_some_and(|s| s.captured_at.elapsed() < ttl)
    }
}

pub struct DirectoryCache {
    source: Arc<dyn DirectorySource>,
    config: DirectoryConfig,
    state: RwLock<DirectoryState>,
    /// Number of completed listing calls, successful or not. Read before waiting on any lock so
    /// a caller can tell whether an attempt finished while it was queued.
    completed_refreshes: AtomicU64,
}

impl DirectoryCache {
    pub fn new(source: Arc<dyn DirectorySource>, config: DirectoryConfig) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(DirectoryState::default()),
            completed_refreshes: AtomicU64::new(0),
        }
    }

    /// Makes sure the snapshot is within its TTL, refreshing it if not.
    pub async fn ensure_fresh(&self) -> Result<()> {
        let observed = self.completed_refreshes.load(Ordering::Acquire);
        if self.state.read().await.is_fresh(self.config.ttl) {
            return Ok(());
        }
        self.refresh_since(observed).await
    }

    /// Refreshes the snapshot unless it became fresh while waiting for the lock.
    pub async fn refresh(&self) -> Result<()> {
        let observed = self.completed_refreshes.load(Ordering::Acquire);
        self.refresh_since(observed).await
    }

    #[tracing::instrument(skip(self))]
    async fn refresh_since(&self, observed: u64) -> Result<()> {
        let mut state = self.state.write().await;
        if state.is_fresh(self.config.ttl) {
            return Ok(());
        }
        if let Some(failure) = &state.last_failure {
            let raced = self.completed_refreshes.load(Ordering::Acquire) != observed;
            if raced || failure.at.elapsed() < self.config.failure_backoff {
                tracing::debug!(error = %failure.error, raced, "reusing recent refresh failure");
                return Err(failure.error.clone());
            }
        }

        let listed = self.source.list_users().await;
        self.completed_refreshes.fetch_add(1, Ordering::Release);
        match listed {
            Ok(entries) => {
                let snapshot = DirectorySnapshot::new(entries);
                tracing::debug!(entries = snapshot.len(), "directory refreshed");
                state.snapshot = Some(Arc::new(snapshot));
                state.last_failure = None;
                Ok(())
            }
            Err(e) => {
                let error = Error::directory_refresh(e);
                tracing::warn!(%error, "directory refresh failed");
                state.last_failure = Some(RefreshFailure { at: Instant::now(), error: error.clone() });
                Err(error)
            }
        }
    }

    /// Snapshot to answer lookups from, falling back to the previous one if a refresh failed.
    async fn current_snapshot(&self) -> Result<Option<Arc<DirectorySnapshot>>> {
        let refreshed = self.ensure_fresh().await;
        let snapshot = self.state.read().await.snapshot.clone();
        match (refreshed, snapshot) {
            (Ok(()), snapshot) => Ok(snapshot),
            (Err(error), Some(snapshot)) => {
                tracing::warn!(%error, age = ?snapshot.captured_at.elapsed(), "serving stale directory snapshot");
                Ok(Some(snapshot))
            }
            (Err(error), None) => Err(error),
        }
    }

    /// Looks up one user. Unknown ids resolve to a placeholder entry.
    pub async fn get(&self, id: &str) -> Result<DirectoryEntry> {
        let snapshot = self.current_snapshot().await?;
        Ok(DirectorySnapshot::lookup(snapshot.as_deref(), id))
    }

    /// Looks up several users, in the order given.
    pub async fn get_many<S>(&self, ids: &[S]) -> Result<Vec<DirectoryEntry>>
    where
        S: AsRef<str> + Sync,
    {
        let snapshot = self.current_snapshot().await?;
        Ok(ids
            .iter()
            .map(|id| DirectorySnapshot::lookup(snapshot.as_deref(), id.as_ref()))
            .collect())
    }

    /// Every known user, sorted by id.
    pub async fn get_all(&self) -> Result<Vec<DirectoryEntry>> {
        let snapshot = self.current_snapshot().await?;
        let mut entries = snapshot
            .map(|s| s.entries.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// How old the current snapshot is, if there is one.
    pub async fn snapshot_age(&self) -> Option<Duration> {
        self.state.read().await.snapshot.as_ref().map(|s| s.captured_at.elapsed())
    }
}
