use std::collections::HashMap;
use std::mem;

use tokio::sync::oneshot;

use crate::error::{Error, Result};

/// A requester parked until its batch window has been executed.
///
/// Exactly one response is ever sent on `response_tx`; sending consumes the request.
#[derive(Debug)]
pub struct PendingRequest<K, V> {
    key: K,
    response_tx: oneshot::Sender<Result<Option<V>>>,
}

impl<K, V> PendingRequest<K, V>
where
    K: std::fmt::Debug,
    V: Clone,
{
    pub fn new(key: K, response_tx: oneshot::Sender<Result<Option<V>>>) -> Self {
        Self { key, response_tx }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn send_response(self, response: Result<Option<V>>) {
        // The receiver goes away when its request is cancelled; the rest of the window is
        // unaffected.
        if self.response_tx.send(response).is_err() {
            tracing::debug!(key = ?self.key, "receiver dropped");
        }
    }
}

/// Requests accumulated for one pending downstream fetch.
#[derive(Debug)]
pub struct BatchWindow<K, V> {
    waiters: Vec<PendingRequest<K, V>>,
}

impl<K, V> Default for BatchWindow<K, V> {
    fn default() -> Self {
        Self { waiters: Vec::new() }
    }
}

impl<K, V> BatchWindow<K, V>
where
    K: std::fmt::Debug + Clone + Ord + std::hash::Hash,
    V: Clone,
{
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn push(&mut self, request: PendingRequest<K, V>) {
        self.waiters.push(request);
    }

    /// Sorted, deduplicated keys of every waiter in the window.
    pub fn unique_keys(&self) -> Vec<K> {
        let mut keys = self.waiters.iter().map(|w| w.key().clone()).collect::<Vec<_>>();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Answers every waiter from one fetch result.
    pub fn resolve(self, loaded: &HashMap<K, V>) {
        for waiter in self.waiters {
            let value = loaded.get(waiter.key()).cloned();
            waiter.send_response(Ok(value));
        }
    }

    /// Hands the same failure to every waiter.
    pub fn fail(self, err: Error) {
        for waiter in self.waiters {
            waiter.send_response(Err(err.clone()));
        }
    }
}

/// The open window together with the generation that identifies it.
///
/// The generation is bumped whenever a window is closed, so an executor that was scheduled for a
/// window that has since been closed by someone else can tell and back off.
#[derive(Debug)]
pub struct WindowState<K, V> {
    generation: u64,
    window: BatchWindow<K, V>,
}

impl<K, V> Default for WindowState<K, V> {
    fn default() -> Self {
        Self { generation: 0, window: BatchWindow::default() }
    }
}

impl<K, V> WindowState<K, V>
where
    K: std::fmt::Debug + Clone + Ord + std::hash::Hash,
    V: Clone,
{
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn window(&self) -> &BatchWindow<K, V> {
        &self.window
    }

    /// Adds a requester and reports whether it opened the window.
    pub fn join(&mut self, request: PendingRequest<K, V>) -> bool {
        let first = self.window.is_empty();
        self.window.push(request);
        first
    }

    /// Swaps out the open window, leaving an empty one under the next generation.
    pub fn close(&mut self) -> BatchWindow<K, V> {
        self.generation = self.generation.wrapping_add(1);
        mem::take(&mut self.window)
    }

    /// Closes the window only if it is still the one identified by `generation`.
    pub fn close_if_current(&mut self, generation: u64) -> Option<BatchWindow<K, V>> {
        if self.generation == generation {
            Some(self.close())
        } else {
            None
        }
    }
}
