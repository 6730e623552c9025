use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Storage behind a request-scoped [`crate::Loader`].
///
/// Entries are only ever added. A request-scoped cache lives exactly as long as the request that
/// owns it, so there is no eviction or invalidation.
pub trait Cache {
    type K;
    type V;

    /// Returns key value pairs for the requested keys.
    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)>;

    fn insert(&mut self, key: Self::K, value: Self::V);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn get_key_vals<'cache, 'a>(
        &'cache self,
        keys: &'a [Self::K],
    ) -> Vec<(&'a Self::K, Option<&'cache Self::V>)> {
        keys.iter().map(|k| (k, self.get(k))).collect::<Vec<_>>()
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        self.insert(key, value);
    }
}
