use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future;
use riskload::{BatchCollector, BatchFunction, CancellationToken, Error, Loader, LoaderConfig};
use tokio::sync::Semaphore;

#[derive(Default)]
struct DummyContext {
    map: HashMap<i64, Vec<String>>,
    batches: Mutex<Vec<Vec<i64>>>,
    fail: AtomicBool,
    gate: Option<Semaphore>,
}

impl DummyContext {
    fn fish() -> Self {
        let mut map = HashMap::new();
        map.insert(42, vec!["one fish".to_owned()]);
        map.insert(12, vec!["two fish".to_owned()]);
        map.insert(5, vec!["red fish".to_owned(), "blue fish".to_owned()]);
        map.insert(7, vec!["a".to_owned(), "b".to_owned()]);
        map.insert(9, vec!["c".to_owned()]);
        Self { map, ..Default::default() }
    }

    fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    fn batches(&self) -> Vec<Vec<i64>> {
        self.batches.lock().unwrap().clone()
    }
}

struct ChildrenLoader;

#[async_trait]
impl BatchFunction<i64, Vec<String>> for ChildrenLoader {
    type Context = DummyContext;
    type Error = io::Error;

    async fn load(
        keys: &[i64],
        context: &DummyContext,
    ) -> Result<HashMap<i64, Vec<String>>, io::Error> {
        context.batches.lock().unwrap().push(keys.to_vec());
        if let Some(gate) = &context.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        if context.fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "store unavailable"));
        }
        Ok(keys.iter().filter_map(|k| context.map.get(k).cloned().map(|v| (*k, v))).collect())
    }
}

struct PanickingLoader;

#[async_trait]
impl BatchFunction<i64, Vec<String>> for PanickingLoader {
    type Context = DummyContext;
    type Error = io::Error;

    async fn load(
        keys: &[i64],
        context: &DummyContext,
    ) -> Result<HashMap<i64, Vec<String>>, io::Error> {
        context.batches.lock().unwrap().push(keys.to_vec());
        panic!("batch function blew up on {keys:?}");
    }
}

fn loader_for(context: &Arc<DummyContext>) -> Loader<i64, Vec<String>, ChildrenLoader> {
    Loader::with_config(Arc::clone(context), LoaderConfig::default(), CancellationToken::new())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

async fn wait_for_batches(context: &DummyContext, count: usize) {
    while context.batches.lock().unwrap().len() < count {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn basic_load() {
    let loader = Loader::new(ChildrenLoader, DummyContext::fish());
    assert_eq!(loader.load(42).await.unwrap(), Some(strings(&["one fish"])));
}

#[tokio::test]
async fn repeated_load_hits_request_cache() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    assert_eq!(loader.load(42).await.unwrap(), Some(strings(&["one fish"])));
    assert_eq!(loader.load(42).await.unwrap(), Some(strings(&["one fish"])));
    assert_eq!(context.batches(), vec![vec![42]]);
}

#[tokio::test]
async fn missing_key_is_none_and_not_refetched() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    assert_eq!(loader.load(99).await.unwrap(), None);
    assert_eq!(loader.load(99).await.unwrap(), None);
    assert_eq!(context.batches(), vec![vec![99]]);
    assert_eq!(loader.cached_len(), 1);
}

#[tokio::test]
async fn concurrent_loads_share_one_batch() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    let (seven, nine, seven_again) =
        future::join3(loader.load(7), loader.load(9), loader.load(7)).await;

    assert_eq!(seven.unwrap(), Some(strings(&["a", "b"])));
    assert_eq!(nine.unwrap(), Some(strings(&["c"])));
    assert_eq!(seven_again.unwrap(), Some(strings(&["a", "b"])));
    assert_eq!(context.batches(), vec![vec![7, 9]]);
}

#[tokio::test]
async fn many_callers_for_one_key_fetch_once() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    let results = future::join_all((0..20).map(|_| loader.load(5))).await;

    for result in results {
        assert_eq!(result.unwrap(), Some(strings(&["red fish", "blue fish"])));
    }
    assert_eq!(context.batches(), vec![vec![5]]);
}

#[tokio::test]
async fn later_request_opens_new_window() {
    let context = Arc::new(DummyContext::fish());
    let collector = BatchCollector::<i64, Vec<String>, ChildrenLoader>::new(
        Arc::clone(&context),
        LoaderConfig::default(),
    );
    let cancel = CancellationToken::new();

    assert!(collector.request_item(12, &cancel).await.unwrap().is_some());
    assert!(collector.request_item(12, &cancel).await.unwrap().is_some());
    assert_eq!(context.batches(), vec![vec![12], vec![12]]);
}

#[tokio::test]
async fn basic_load_many() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    let loaded = loader.load_many(vec![5, 12, 99, 12]).await.unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[&5], strings(&["red fish", "blue fish"]));
    assert_eq!(loaded[&12], strings(&["two fish"]));
    assert_eq!(context.batches(), vec![vec![5, 12, 99]]);
}

#[tokio::test]
async fn load_many_with_no_keys_does_not_fetch() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    assert!(loader.load_many(Vec::new()).await.unwrap().is_empty());
    assert!(context.batches().is_empty());
}

#[tokio::test]
async fn load_many_only_fetches_uncached_keys() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    loader.load(5).await.unwrap();
    let loaded = loader.load_many(vec![12, 5, 42]).await.unwrap();
    assert_eq!(loaded.len(), 3);

    let again = loader.load_many(vec![42, 5]).await.unwrap();
    assert_eq!(again[&42], strings(&["one fish"]));
    assert_eq!(loader.load(12).await.unwrap(), Some(strings(&["two fish"])));
    assert_eq!(context.batches(), vec![vec![5], vec![12, 42]]);
}

#[tokio::test]
async fn load_async() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    let tuple = future::join4(
        loader.load(5),
        loader.load_many(vec![5, 42]),
        loader.load(99),
        loader.load(12),
    );
    let (five, many, missing, twelve) = tuple.await;

    assert_eq!(five.unwrap(), Some(strings(&["red fish", "blue fish"])));
    assert_eq!(many.unwrap().len(), 2);
    assert_eq!(missing.unwrap(), None);
    assert_eq!(twelve.unwrap(), Some(strings(&["two fish"])));
}

#[tokio::test]
async fn failed_batch_fails_every_waiter_then_recovers() {
    let context = Arc::new(DummyContext::fish());
    context.fail.store(true, Ordering::SeqCst);
    let loader = loader_for(&context);

    let (first, second) = future::join(loader.load(7), loader.load(9)).await;
    for result in [first, second] {
        match result {
            Err(Error::BatchFetchFailed { source }) => {
                assert_eq!(source.to_string(), "store unavailable")
            }
            other => panic!("expected batch failure, got {other:?}"),
        }
    }
    assert_eq!(context.batches(), vec![vec![7, 9]]);

    context.fail.store(false, Ordering::SeqCst);
    assert_eq!(loader.load(7).await.unwrap(), Some(strings(&["a", "b"])));
    assert_eq!(context.batches(), vec![vec![7, 9], vec![7]]);
}

#[tokio::test]
async fn panicking_batch_abandons_every_waiter() {
    let context = Arc::new(DummyContext::fish());
    let loader = Loader::<i64, Vec<String>, PanickingLoader>::with_config(
        Arc::clone(&context),
        LoaderConfig::default(),
        CancellationToken::new(),
    );

    let (first, second) = future::join(loader.load(1), loader.load(2)).await;
    assert!(matches!(first, Err(Error::BatchAbandoned)));
    assert!(matches!(second, Err(Error::BatchAbandoned)));
    assert_eq!(context.batches(), vec![vec![1, 2]]);
    assert_eq!(loader.cached_len(), 0);
}

#[tokio::test]
async fn full_window_dispatches_early() {
    let context = Arc::new(DummyContext::fish());
    let loader = Loader::<i64, Vec<String>, ChildrenLoader>::with_config(
        Arc::clone(&context),
        LoaderConfig::default().with_max_batch_size(2),
        CancellationToken::new(),
    );

    let (a, b, c) = future::join3(loader.load(7), loader.load(9), loader.load(42)).await;
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());
    assert!(c.unwrap().is_some());

    let mut batches = context.batches();
    batches.sort();
    assert_eq!(batches, vec![vec![7, 9], vec![42]]);
}

#[tokio::test]
async fn cancelled_waiter_leaves_batch_running_for_others() {
    let context = Arc::new(DummyContext::fish().gated());
    let collector = Arc::new(BatchCollector::<i64, Vec<String>, ChildrenLoader>::new(
        Arc::clone(&context),
        LoaderConfig::default(),
    ));
    let cancelled = CancellationToken::new();
    let kept = CancellationToken::new();

    let first = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = cancelled.clone();
        async move { collector.request_item(5, &cancel).await }
    });
    let second = tokio::spawn({
        let collector = Arc::clone(&collector);
        let cancel = kept.clone();
        async move { collector.request_item(12, &cancel).await }
    });

    wait_for_batches(&context, 1).await;
    cancelled.cancel();
    assert!(matches!(first.await.unwrap(), Err(Error::Cancelled)));

    context.gate.as_ref().unwrap().add_permits(1);
    assert_eq!(second.await.unwrap().unwrap(), Some(strings(&["two fish"])));
    assert_eq!(context.batches(), vec![vec![5, 12]]);
}

#[tokio::test]
async fn cancelled_load_many_returns_immediately() {
    let context = Arc::new(DummyContext::fish().gated());
    let cancel = CancellationToken::new();
    let loader = Arc::new(Loader::<i64, Vec<String>, ChildrenLoader>::with_config(
        Arc::clone(&context),
        LoaderConfig::default(),
        cancel.clone(),
    ));

    let pending = tokio::spawn({
        let loader = Arc::clone(&loader);
        async move { loader.load_many(vec![5, 42]).await }
    });
    wait_for_batches(&context, 1).await;
    cancel.cancel();

    assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled)));
    assert_eq!(loader.cached_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_callers_get_their_own_keys() {
    let mut context = DummyContext::default();
    for key in 0..10 {
        context.map.insert(key, vec![format!("child of {key}")]);
    }
    let context = Arc::new(context);
    let loader = Arc::new(loader_for(&context));

    let handles = (0..100i64)
        .map(|i| {
            let loader = Arc::clone(&loader);
            tokio::spawn(async move { (i % 10, loader.load(i % 10).await) })
        })
        .collect::<Vec<_>>();

    for handle in future::join_all(handles).await {
        let (key, result) = handle.unwrap();
        assert_eq!(result.unwrap(), Some(vec![format!("child of {key}")]));
    }
    let fetched = context.batches().concat();
    assert!(fetched.len() <= 100);
    for key in 0..10 {
        assert!(fetched.contains(&key));
    }
}

#[cfg(feature = "stats")]
#[tokio::test]
async fn stats_track_batches_and_hits() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    let _ = future::join(loader.load(7), loader.load(9)).await;
    loader.load(7).await.unwrap();
    loader.load_many(vec![7, 42]).await.unwrap();

    let stats = loader.stats();
    assert_eq!((stats.load_requests, stats.items_requested), (4, 5));
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.loads, 2);
    assert_eq!(stats.items_loaded, 3);
    assert_eq!((stats.min_batch_size, stats.max_batch_size), (1, 2));
    assert_eq!((stats.min_batch_unique, stats.max_batch_unique), (1, 2));
}

#[cfg(feature = "stats")]
#[tokio::test]
async fn stats_count_duplicate_keys_in_batch_size_only() {
    let context = Arc::new(DummyContext::fish());
    let loader = loader_for(&context);

    let _ = future::join3(loader.load(7), loader.load(7), loader.load(9)).await;
    loader.load_many(vec![12, 12, 5, 99]).await.unwrap();

    let stats = loader.stats();
    assert_eq!(context.batches(), vec![vec![7, 9], vec![5, 12, 99]]);
    assert_eq!((stats.load_requests, stats.items_requested), (4, 7));
    assert_eq!(stats.cache_hits, 0);
    assert_eq!((stats.min_batch_size, stats.max_batch_size), (3, 4));
    assert_eq!((stats.min_batch_unique, stats.max_batch_unique), (2, 3));
    assert_eq!(stats.items_loaded, 4);
}
