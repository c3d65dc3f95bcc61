//! Fixed-size worker pool over a slice, preserving input order.
//!
//! `min(concurrency, items.len())` workers share one cursor. Each worker
//! claims the next index, runs the item, and loops until the cursor passes
//! the end. Workers are polled together on the caller's task, so the only
//! shared state is the atomic cursor.

use futures::future::join_all;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Run `worker` over every item with at most `concurrency` in flight.
///
/// `results[i]` always corresponds to `items[i]`.
pub async fn map_with_concurrency<T, R, F, Fut>(items: &[T], concurrency: usize, worker: F) -> Vec<R>
where
    F: Fn(&T, usize) -> Fut,
    Fut: Future<Output = R>,
{
    let cursor = AtomicUsize::new(0);
    let workers = concurrency.max(1).min(items.len());

    let batches = join_all((0..workers).map(|_| drain(items, &cursor, &worker))).await;
    reassemble(batches)
}

/// Like [`map_with_concurrency`] but stops claiming new items after the first
/// error. Items already in flight are awaited; the first error is returned.
pub async fn try_map_with_concurrency<T, R, E, F, Fut>(
    items: &[T],
    concurrency: usize,
    worker: F,
) -> Result<Vec<R>, E>
where
    F: Fn(&T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let cursor = AtomicUsize::new(0);
    let stop = AtomicBool::new(false);
    let first_error: Mutex<Option<E>> = Mutex::new(None);
    let workers = concurrency.max(1).min(items.len());

    let record = |index: usize, result: Result<R, E>| match result {
        Ok(value) => Some((index, value)),
        Err(err) => {
            stop.store(true, Ordering::SeqCst);
            first_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_or_insert(err);
            None
        }
    };

    let batches = join_all((0..workers).map(|_| {
        drain_fallible(items, &cursor, &stop, &worker, &record)
    }))
    .await;

    if let Some(err) = first_error
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
    {
        return Err(err);
    }
    Ok(reassemble(batches))
}

async fn drain<T, R, F, Fut>(items: &[T], cursor: &AtomicUsize, worker: &F) -> Vec<(usize, R)>
where
    F: Fn(&T, usize) -> Fut,
    Fut: Future<Output = R>,
{
    let mut done = Vec::new();
    loop {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(item) = items.get(index) else { break };
        done.push((index, worker(item, index).await));
    }
    done
}

async fn drain_fallible<T, R, E, F, Fut, Rec>(
    items: &[T],
    cursor: &AtomicUsize,
    stop: &AtomicBool,
    worker: &F,
    record: &Rec,
) -> Vec<(usize, R)>
where
    F: Fn(&T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
    Rec: Fn(usize, Result<R, E>) -> Option<(usize, R)>,
{
    let mut done = Vec::new();
    while !stop.load(Ordering::SeqCst) {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(item) = items.get(index) else { break };
        if let Some(entry) = record(index, worker(item, index).await) {
            done.push(entry);
        }
    }
    done
}

fn reassemble<R>(batches: Vec<Vec<(usize, R)>>) -> Vec<R> {
    let mut indexed: Vec<(usize, R)> = batches.into_iter().flatten().collect();
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}
