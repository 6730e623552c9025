use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::BoxError;

/// A `BatchFunction` defines the method through which some `Loader` may fetch batched data from
/// some resource. The `BatchFunction` receives a slice of deduplicated keys that were requested
/// during one batch window, and some user defined context struct.
///
/// The returned map does not need to hold an entry for every key. Requesters of keys that are
/// missing from the map receive a `None`. A returned error fails the whole window: every
/// requester that joined it receives the same [`crate::Error::BatchFetchFailed`].
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context: Send + Sync + 'static;
    type Error: Into<BoxError> + Send + 'static;

    async fn load(keys: &[K], context: &Self::Context) -> Result<HashMap<K, V>, Self::Error>;
}
