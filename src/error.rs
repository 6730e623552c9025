use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by the external collaborators (store, directory).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared form of an external error so that one failure can be handed to many waiters.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the loading and caching layer.
///
/// The enum is `Clone` because a single downstream failure is delivered to every requester that
/// joined the failed batch window.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The downstream bulk fetch for a batch window failed.
    #[error("batch fetch failed: {source}")]
    BatchFetchFailed { source: SharedError },

    /// The batch executor went away without answering this requester.
    #[error("batch executor dropped the request without a result")]
    BatchAbandoned,

    /// The request was cancelled while waiting for a result.
    #[error("load cancelled")]
    Cancelled,

    /// The directory listing call failed during a refresh.
    #[error("directory refresh failed: {source}")]
    DirectoryRefreshFailed { source: SharedError },

    /// The request context carries no loader bundle.
    #[error("no loaders installed in request context")]
    LoaderNotInstalled,
}

impl Error {
    pub(crate) fn batch_fetch(err: impl Into<BoxError>) -> Self {
        Error::BatchFetchFailed { source: Arc::from(err.into()) }
    }

    pub(crate) fn directory_refresh(err: impl Into<BoxError>) -> Self {
        Error::DirectoryRefreshFailed { source: Arc::from(err.into()) }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
