//! Concurrency control for discovery and scanning.
//!
//! The [`Governor`] is a weighted counting semaphore sized from the
//! process's file-descriptor budget. Every unit of work that opens sockets
//! holds a [`GovernorPermit`] for as long as those sockets may be open.
//! [`fan_out`] runs units of work as spawned tasks on a bounded pool and
//! collects one result per unit, in input order.

use crate::system;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinError;
use tracing::{debug, error};

/// Weighted gate limiting how many sockets may be outstanding at once.
///
/// A governor is built per discovery or scan call and passed explicitly;
/// clones share the same capacity.
#[derive(Debug, Clone)]
pub struct Governor {
    semaphore: Arc<Semaphore>,
    capacity: u32,
}

/// Weight held while `permit` is alive. Dropping it returns the weight.
#[derive(Debug)]
pub struct GovernorPermit {
    _permit: OwnedSemaphorePermit,
    weight: u32,
}

impl GovernorPermit {
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl Governor {
    /// Capacity used when the descriptor limit cannot be determined.
    pub const FALLBACK_CAPACITY: u32 = 1024;

    /// Create a governor with `capacity` units. A zero capacity is raised
    /// to one so that acquisition can always make progress.
    pub fn new(capacity: u32) -> Self {
        let max = u32::try_from(Semaphore::MAX_PERMITS).unwrap_or(u32::MAX);
        let capacity = capacity.clamp(1, max);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    /// Size a governor from a descriptor limit, falling back to
    /// `fallback` when the limit is unknown.
    pub fn from_limit(limit: Option<u64>, fallback: u32) -> Self {
        let capacity = limit
            .map(|l| u32::try_from(l).unwrap_or(u32::MAX))
            .unwrap_or(fallback);
        Self::new(capacity)
    }

    /// Size a governor from the process's open-file soft limit.
    pub fn from_descriptor_limit(fallback: u32) -> Self {
        let limit = match system::descriptor_limit() {
            Ok(limit) => Some(limit),
            Err(e) => {
                debug!(error = %e, fallback, "descriptor limit unavailable");
                None
            }
        };
        Self::from_limit(limit, fallback)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Units currently held by outstanding permits.
    pub fn in_use(&self) -> u32 {
        let available = u32::try_from(self.semaphore.available_permits()).unwrap_or(u32::MAX);
        self.capacity.saturating_sub(available)
    }

    /// Wait until `weight` units are free and reserve them.
    ///
    /// Weight above the capacity is clamped to the capacity; otherwise the
    /// request could never be satisfied.
    pub async fn acquire(&self, weight: u32) -> GovernorPermit {
        let weight = weight.clamp(1, self.capacity);
        let permit = Arc::clone(&self.semaphore)
            .acquire_many_owned(weight)
            .await
            .expect("governor semaphore is never closed");
        GovernorPermit {
            _permit: permit,
            weight,
        }
    }

    /// Number of units of `weight` that can be outstanding at once.
    pub fn slots(&self, weight: u32) -> usize {
        (self.capacity / weight.clamp(1, self.capacity)) as usize
    }
}

/// Run `task` for every item as a spawned task, at most `workers` at a time.
///
/// Results come back in the order of `items`, one per item. A task that
/// panics is logged and its slot is filled with `on_panic(item)`.
pub async fn fan_out<I, F, Fut, T, P>(items: I, workers: usize, mut task: F, on_panic: P) -> Vec<T>
where
    I: IntoIterator,
    I::Item: Clone,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    P: Fn(I::Item) -> T,
{
    let mut joined: Vec<(usize, I::Item, Result<T, JoinError>)> =
        stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let handle = tokio::spawn(task(item.clone()));
                async move { (index, item, handle.await) }
            })
            .buffer_unordered(workers.max(1))
            .collect()
            .await;

    joined.sort_by_key(|(index, _, _)| *index);
    joined
        .into_iter()
        .map(|(index, item, outcome)| match outcome {
            Ok(value) => value,
            Err(e) => {
                error!(index, error = %e, "worker task failed");
                on_panic(item)
            }
        })
        .collect()
}
