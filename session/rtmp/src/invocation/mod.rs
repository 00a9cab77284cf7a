use std::{
    future::Future,
    hash::Hash,
    pin::Pin,
    task::{Context, Poll},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;

pub mod errors;

pub use errors::{InvocationError, InvocationResult};

type Completion<T, E> = Shared<oneshot::Receiver<Result<T, E>>>;

struct PendingInvocation<T, E> {
    completer: oneshot::Sender<Result<T, E>>,
    completion: Completion<T, E>,
}

impl<T: Clone, E: Clone> PendingInvocation<T, E> {
    fn new() -> Self {
        let (completer, receiver) = oneshot::channel();
        Self {
            completer,
            completion: receiver.shared(),
        }
    }

    fn complete(self, result: Result<T, E>) {
        let _ = self.completer.send(result);
    }
}

/// Table of outstanding calls keyed by invocation id.
///
/// Every key completes at most once. Completion always happens after the entry
/// left the map, so continuations of the returned handles never run under a
/// shard lock and may freely call back into the table.
pub struct PendingInvocations<K, T, E> {
    entries: DashMap<K, PendingInvocation<T, E>>,
}

impl<K, T, E> Default for PendingInvocations<K, T, E>
where
    K: Eq + Hash + Clone,
    T: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> PendingInvocations<K, T, E>
where
    K: Eq + Hash + Clone,
    T: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers `key`, or joins the entry already registered under it.
    pub fn create(&self, key: K) -> InvocationHandle<T, E> {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(PendingInvocation::new);
        InvocationHandle {
            completion: entry.completion.clone(),
        }
    }

    /// Registers `key` only when nothing is pending under it.
    pub fn try_create(&self, key: K) -> Option<InvocationHandle<T, E>> {
        match self.entries.entry(key) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let entry = vacant.insert(PendingInvocation::new());
                Some(InvocationHandle {
                    completion: entry.completion.clone(),
                })
            }
        }
    }

    /// Forgets `key` without completing it.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn set_result(&self, key: &K, value: T) -> bool {
        self.complete(key, Ok(value))
    }

    pub fn set_exception(&self, key: &K, error: E) -> bool {
        self.complete(key, Err(error))
    }

    pub fn set_result_for_all(&self, value: T) -> usize {
        self.complete_all(Ok(value))
    }

    pub fn set_exception_for_all(&self, error: E) -> usize {
        self.complete_all(Err(error))
    }

    /// Drops every entry, nothing is completed.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn complete(&self, key: &K, result: Result<T, E>) -> bool {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                entry.complete(result);
                true
            }
            None => false,
        }
    }

    fn complete_all(&self, result: Result<T, E>) -> usize {
        let keys: Vec<K> = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        let drained: Vec<PendingInvocation<T, E>> = keys
            .iter()
            .filter_map(|key| self.entries.remove(key))
            .map(|(_, entry)| entry)
            .collect();

        let count = drained.len();
        for entry in drained {
            entry.complete(result.clone());
        }
        count
    }
}

/// Completion side of a pending invocation, cloneable and awaitable.
pub struct InvocationHandle<T, E> {
    completion: Completion<T, E>,
}

impl<T: Clone, E: Clone> Clone for InvocationHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            completion: self.completion.clone(),
        }
    }
}

impl<T: Clone, E: Clone> InvocationHandle<T, E> {
    /// Blocks the current thread until the invocation completes.
    ///
    /// Must not be called from within an async runtime worker.
    pub fn wait(self) -> InvocationResult<T, E> {
        futures::executor::block_on(self)
    }

    /// The outcome, if the invocation has already completed.
    pub fn peek(&self) -> Option<InvocationResult<T, E>> {
        self.completion.peek().map(convert_completion)
    }
}

impl<T: Clone, E: Clone> Future for InvocationHandle<T, E> {
    type Output = InvocationResult<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.completion)
            .poll(cx)
            .map(|result| convert_completion(&result))
    }
}

fn convert_completion<T: Clone, E: Clone>(
    result: &Result<Result<T, E>, oneshot::error::RecvError>,
) -> InvocationResult<T, E> {
    match result {
        Ok(Ok(value)) => Ok(value.clone()),
        Ok(Err(err)) => Err(InvocationError::Failed(err.clone())),
        Err(_) => Err(InvocationError::Abandoned),
    }
}
