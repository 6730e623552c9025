use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    collector::BatchCollector,
    config::LoaderConfig,
    error::{Error, Result},
};
#[cfg(feature = "stats")]
use crate::stats::LoaderStats;

/// Batch loads values from some expensive resource for the duration of one GraphQL request,
/// primarily intended for mitigating GraphQL's N+1 problem.
///
/// Users call [`Loader::load`] and [`Loader::load_many`] to fetch values from the underlying
/// resource or the request cache. Cache misses from [`Loader::load`] join the
/// [`BatchCollector`]'s open window, so sibling resolvers asking for different keys at the same
/// time share one downstream call. [`Loader::load_many`] already knows all of its keys and goes
/// straight to the `BatchFunction` for the ones that are not cached.
///
/// Every fetched key is remembered, including keys the `BatchFunction` had no value for, so a
/// key is fetched at most once per loader. A `Loader` is meant to be created fresh for each
/// request and dropped with it; nothing is ever evicted.
pub struct Loader<K, V, F>
where
    F: BatchFunction<K, V>,
{
    collector: BatchCollector<K, V, F>,
    cache: RwLock<HashMap<K, Option<V>>>,
    cancel: CancellationToken,
}

impl<K, V, F> Loader<K, V, F>
where
    K: 'static + Debug + Clone + Ord + Hash + Send + Sync,
    V: 'static + Debug + Clone + Send + Sync,
    F: 'static + BatchFunction<K, V>,
{
    /// Creates a new Loader for the provided BatchFunction and Context type.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new(_: F, context: F::Context) -> Self {
        Self::with_config(Arc::new(context), LoaderConfig::default(), CancellationToken::new())
    }

    /// Creates a Loader sharing `context` with other loaders, whose waits end when `cancel`
    /// fires.
    pub fn with_config(
        context: Arc<F::Context>,
        config: LoaderConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            collector: BatchCollector::new(context, config),
            cache: RwLock::new(HashMap::new()),
            cancel,
        }
    }

    /// Loads a value from the underlying resource.
    ///
    /// Returns `Ok(None)` if the BatchFunction had no value for the key.
    ///
    /// If the key is already in the loader cache, it is returned immediately. Otherwise it is
    /// enqueued in the current batch window and the value is cached once the window completes.
    pub async fn load(&self, key: K) -> Result<Option<V>> {
        #[cfg(feature = "stats")]
        self.collector.record_load_request(1);
        let cached = self.cache.read().get(&key).cloned();
        if let Some(value) = cached {
            #[cfg(feature = "stats")]
            self.collector.record_cache_hits(1);
            return Ok(value);
        }

        let value = self.collector.request_item(key.clone(), &self.cancel).await?;
        Cache::insert(&mut *self.cache.write(), key, value.clone());
        Ok(value)
    }

    /// Loads many values at once.
    ///
    /// Keys that are not cached yet are fetched with a single direct call to the BatchFunction,
    /// bypassing the batch window. Keys without a value are left out of the returned map.
    #[tracing::instrument(skip(self))]
    pub async fn load_many(&self, keys: Vec<K>) -> Result<HashMap<K, V>> {
        #[cfg(feature = "stats")]
        self.collector.record_load_request(keys.len() as u32);
        let mut found = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        {
            let cache = self.cache.read();
            for (key, cached) in Cache::get_key_vals(&*cache, &keys) {
                match cached {
                    Some(Some(value)) => {
                        found.insert(key.clone(), value.clone());
                    }
                    Some(None) => {}
                    None => missing.push(key.clone()),
                }
            }
        }
        #[cfg(feature = "stats")]
        self.collector.record_cache_hits((keys.len() - missing.len()) as u32);

        #[cfg(feature = "stats")]
        let requested_misses = missing.len() as u32;
        missing.sort();
        missing.dedup();
        tracing::debug!(requested_keys = ?keys, keys_to_load = ?missing);
        if missing.is_empty() {
            return Ok(found);
        }

        let loaded = tokio::select! {
            biased;
            loaded = F::load(&missing, self.collector.context()) => loaded.map_err(Error::batch_fetch)?,
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
        };
        #[cfg(feature = "stats")]
        self.collector.record_direct_load(
            requested_misses,
            missing.len() as u32,
            loaded.len() as u32,
        );

        let mut cache = self.cache.write();
        for key in missing {
            let value = loaded.get(&key).cloned();
            if let Some(value) = &value {
                found.insert(key.clone(), value.clone());
            }
            Cache::insert(&mut *cache, key, value);
        }
        Ok(found)
    }

    /// Number of keys remembered by this loader, with or without a value.
    pub fn cached_len(&self) -> usize {
        self.cache.read().len()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> LoaderStats {
        self.collector.stats()
    }
}
