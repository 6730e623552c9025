use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{span, Level, Span};
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    config::LoaderConfig,
    error::{Error, Result},
    window::{BatchWindow, PendingRequest, WindowState},
};
#[cfg(feature = "stats")]
use crate::stats::LoaderStats;

/// A `BatchCollector` turns many concurrent single-key requests into one downstream
/// [`BatchFunction::load`] call per batch window.
///
/// A window goes through three states during its lifetime:
///
/// 1. Open. The first requester to join an empty window spawns the window's executor task.
///    Every requester that arrives while the window is open parks in it with a private oneshot
///    channel.
/// 2. Closed. The executor yields (or sleeps for `batch_delay`) and then swaps the window out
///    under the window mutex. From then on new requesters open a fresh window. If
///    `max_batch_size` is set, the requester that fills the window closes it instead and the
///    pending executor finds the generation moved on and exits.
/// 3. Executed. The executor calls the `BatchFunction` once with the sorted, deduplicated keys
///    and answers every waiter from that single result, or hands all of them the same error.
///
/// Requesters wait on their channel and on the request's `CancellationToken`. A cancelled
/// requester returns [`Error::Cancelled`] right away; the executor still completes the window for
/// everybody else.
pub struct BatchCollector<K, V, F>
where
    F: BatchFunction<K, V>,
{
    shared: Arc<Shared<K, V, F>>,
}

struct Shared<K, V, F>
where
    F: BatchFunction<K, V>,
{
    state: Mutex<WindowState<K, V>>,
    context: Arc<F::Context>,
    config: LoaderConfig,
    span: Span,
    #[cfg(feature = "stats")]
    stats: Mutex<LoaderStats>,
    phantom_batch_function: PhantomData<fn() -> F>,
}

impl<K, V, F> BatchCollector<K, V, F>
where
    K: 'static + Debug + Clone + Ord + Hash + Send + Sync,
    V: 'static + Debug + Clone + Send + Sync,
    F: 'static + BatchFunction<K, V>,
{
    pub fn new(context: Arc<F::Context>, config: LoaderConfig) -> Self {
        let debug_name = std::any::type_name::<(K, V)>();
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(WindowState::default()),
                context,
                config,
                span: span!(Level::TRACE, "BatchCollector", kv = debug_name),
                #[cfg(feature = "stats")]
                stats: Mutex::new(LoaderStats::new(debug_name)),
                phantom_batch_function: PhantomData,
            }),
        }
    }

    pub fn context(&self) -> &F::Context {
        self.shared.context.as_ref()
    }

    /// Joins the open batch window with `key` and waits for the window's result.
    pub async fn request_item(&self, key: K, cancel: &CancellationToken) -> Result<Option<V>> {
        let (response_tx, response_rx) = oneshot::channel();
        let full_window = {
            let mut state = self.shared.state.lock();
            if state.join(PendingRequest::new(key, response_tx)) {
                self.spawn_dispatch(state.generation());
            }
            match self.shared.config.max_batch_size {
                Some(max) if state.window().len() >= max => Some(state.close()),
                _ => None,
            }
        };

        if let Some(window) = full_window {
            tracing::trace!(parent: &self.shared.span, waiters = window.len(), "batch window full");
            let shared = Arc::clone(&self.shared);
            let span = shared.span.clone();
            tokio::spawn(async move { shared.execute(window).await }.instrument(span));
        }

        tokio::select! {
            biased;
            response = response_rx => response.unwrap_or(Err(Error::BatchAbandoned)),
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    fn spawn_dispatch(&self, generation: u64) {
        let shared = Arc::clone(&self.shared);
        let span = shared.span.clone();
        tokio::spawn(shared.dispatch(generation).instrument(span));
    }

    #[cfg(feature = "stats")]
    pub(crate) fn record_load_request(&self, items: u32) {
        self.shared.stats.lock().record_load_request(items);
    }

    #[cfg(feature = "stats")]
    pub(crate) fn record_cache_hits(&self, hits: u32) {
        self.shared.stats.lock().record_cache_hits(hits);
    }

    #[cfg(feature = "stats")]
    pub(crate) fn record_direct_load(&self, requested_keys: u32, unique_keys: u32, loaded: u32) {
        let mut stats = self.shared.stats.lock();
        stats.record_load_exec(requested_keys);
        stats.record_load_exec_completed(unique_keys, loaded);
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> LoaderStats {
        self.shared.stats.lock().clone()
    }
}

impl<K, V, F> Shared<K, V, F>
where
    K: 'static + Debug + Clone + Ord + Hash + Send + Sync,
    V: 'static + Debug + Clone + Send + Sync,
    F: 'static + BatchFunction<K, V>,
{
    async fn dispatch(self: Arc<Self>, generation: u64) {
        if self.config.batch_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.config.batch_delay).await;
        }

        let window = self.state.lock().close_if_current(generation);
        match window {
            Some(window) => self.execute(window).await,
            None => tracing::trace!(generation, "window already dispatched"),
        }
    }

    #[tracing::instrument(skip(self, window), fields(waiters = window.len()))]
    async fn execute(&self, window: BatchWindow<K, V>) {
        let keys = window.unique_keys();
        #[cfg(feature = "stats")]
        self.stats.lock().record_load_exec(window.len() as u32);
        tracing::debug!(?keys, "executing batch");

        match F::load(&keys, self.context.as_ref()).await {
            Ok(loaded) => {
                tracing::debug!(?loaded);
                #[cfg(feature = "stats")]
                self.stats.lock().record_load_exec_completed(keys.len() as u32, loaded.len() as u32);
                window.resolve(&loaded);
            }
            Err(e) => {
                let err = Error::batch_fetch(e);
                tracing::warn!(error = %err, ?keys, "batch fetch failed");
                window.fail(err);
            }
        }
    }
}

#[cfg(feature = "stats")]
impl<K, V, F> Drop for Shared<K, V, F>
where
    F: BatchFunction<K, V>,
{
    fn drop(&mut self) {
        tracing::debug!(loader_stats = ?self.stats.get_mut());
    }
}
