use std::time::Duration;

/// Tuning for request-scoped loaders.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// How long a batch window stays open after its first key arrives.
    ///
    /// Zero means the executor yields once to the scheduler before closing the window, which is
    /// enough for sibling resolvers polled in the same pass to join.
    pub batch_delay: Duration,
    /// Closes a window early once this many requesters have joined it.
    pub max_batch_size: Option<usize>,
}

impl LoaderConfig {
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size.max(1));
        self
    }
}

/// Tuning for the application-wide directory cache.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// How long a directory snapshot is considered fresh.
    pub ttl: Duration,
    /// After a failed refresh, callers reuse that failure instead of calling the directory again
    /// until this much time has passed.
    pub failure_backoff: Duration,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(60), failure_backoff: Duration::from_secs(5) }
    }
}

impl DirectoryConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }
}
