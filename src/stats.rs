/// Counters describing how well a loader batched and cached during its request.
///
/// Only compiled with the `stats` feature. A snapshot can be taken at any time with
/// [`crate::Loader::stats`]; the final numbers are logged when the loader is dropped.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoaderStats {
    /// Human readable name used to identify these stats when they are reported.
    pub tag: &'static str,
    /// Number of `load` and `load_many` calls, cache hits included.
    pub load_requests: u32,
    /// The total number of keys that were requested (not necessarily unique).
    pub items_requested: u32,
    /// The number of keys that were immediately found in the request cache.
    pub cache_hits: u32,
    /// Number of downstream fetches that were executed.
    pub loads: u32,
    /// The average number of keys (not-unique) that were fetched during load operations.
    pub average_batch_size: f32,
    /// The max number of keys (not-unique) that were fetched during a single load.
    pub max_batch_size: u32,
    /// The min number of keys (not-unique) that were fetched during a single load.
    pub min_batch_size: u32,
    /// The max number of unique keys fetched during a single load.
    pub max_batch_unique: u32,
    /// The min number of unique keys fetched during a single load.
    pub min_batch_unique: u32,
    /// The total number of values that were actually loaded.
    pub items_loaded: u32,
}

impl LoaderStats {
    pub fn new(tag: &'static str) -> Self {
        Self { tag, min_batch_size: u32::MAX, min_batch_unique: u32::MAX, ..Default::default() }
    }

    pub fn record_load_request(&mut self, items_requested: u32) {
        self.load_requests += 1;
        self.items_requested += items_requested;
    }

    pub fn record_cache_hits(&mut self, hits: u32) {
        self.cache_hits += hits;
    }

    pub fn record_load_exec(&mut self, batch_size: u32) {
        let new_total_load = self.loads + 1;
        self.average_batch_size = (((self.average_batch_size as f64 * self.loads as f64)
            + batch_size as f64)
            / new_total_load as f64) as f32;
        self.loads = new_total_load;
        self.max_batch_size = self.max_batch_size.max(batch_size);
        self.min_batch_size = self.min_batch_size.min(batch_size);
    }

    pub fn record_load_exec_completed(&mut self, unique_batch_size: u32, loaded_item_count: u32) {
        self.items_loaded += loaded_item_count;
        self.max_batch_unique = self.max_batch_unique.max(unique_batch_size);
        self.min_batch_unique = self.min_batch_unique.min(unique_batch_size);
    }
}
