// src/stream/buffered.rs

//! Time-windowed batching of a stream.
//!
//! PTY sources emit a handful of bytes per read; batching them keeps
//! downstream consumers from handling one tiny chunk per character.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result as AnyResult;
use tracing::{debug, error};

use crate::stream::publisher::{Publisher, Stream, lock};
use crate::stream::observer::Observer;

/// Values that can be merged into one by concatenation.
pub trait Concat: Sized {
    fn concat(batch: Vec<Self>) -> Self;
}

impl Concat for String {
    fn concat(batch: Vec<Self>) -> Self {
        batch.concat()
    }
}

impl Concat for Vec<u8> {
    fn concat(batch: Vec<Self>) -> Self {
        batch.concat()
    }
}

type Aggregator<T> = Box<dyn Fn(Vec<T>) -> T + Send + Sync>;

struct Batcher<T> {
    pending: Mutex<Vec<T>>,
    /// Held for a whole take-aggregate-push cycle so that a tick flush and
    /// the final flush on close never reorder batches.
    flush: Mutex<()>,
    stopped: Mutex<bool>,
    stop_cv: Condvar,
    aggregate: Aggregator<T>,
    downstream: Publisher<T>,
}

impl<T: Clone + Send + 'static> Batcher<T> {
    fn flush(&self) {
        let _flush = lock(&self.flush);
        let batch = std::mem::take(&mut *lock(&self.pending));
        if batch.is_empty() {
            return;
        }
        let _ = self.downstream.push((self.aggregate)(batch));
    }

    fn run_ticks(&self, period: Duration) {
        loop {
            let stopped = {
                let guard = lock(&self.stopped);
                let (guard, _) = self
                    .stop_cv
                    .wait_timeout_while(guard, period, |stopped| !*stopped)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                *guard
            };
            if stopped {
                break;
            }
            self.flush();
        }
        debug!("stream buffer flusher finished");
    }
}

struct BatchObserver<T> {
    batcher: Arc<Batcher<T>>,
}

impl<T: Clone + Send + 'static> Observer<T> for BatchObserver<T> {
    fn on_next(&self, value: &T) -> AnyResult<()> {
        lock(&self.batcher.pending).push(value.clone());
        Ok(())
    }

    fn on_close(&self) -> AnyResult<()> {
        // Pending data goes out before the close.
        self.batcher.flush();
        self.batcher.downstream.close();

        *lock(&self.batcher.stopped) = true;
        self.batcher.stop_cv.notify_all();
        Ok(())
    }
}

impl<T: Clone + Send + 'static> Stream<T> {
    /// Batch upstream values per `period` and emit each batch merged by
    /// `aggregate`. Empty windows emit nothing.
    pub fn time_buffered_with<A>(&self, period: Duration, aggregate: A) -> Stream<T>
    where
        A: Fn(Vec<T>) -> T + Send + Sync + 'static,
    {
        let downstream = Publisher::new();
        let view = downstream.stream();

        let batcher = Arc::new(Batcher {
            pending: Mutex::new(Vec::new()),
            flush: Mutex::new(()),
            stopped: Mutex::new(false),
            stop_cv: Condvar::new(),
            aggregate: Box::new(aggregate),
            downstream,
        });

        let ticker = Arc::clone(&batcher);
        let spawned = thread::Builder::new()
            .name("stream-buffer".to_string())
            .spawn(move || ticker.run_ticks(period));
        if let Err(err) = spawned {
            // Without a ticker values still arrive, just all at close.
            error!(error = %err, "failed to start stream buffer flusher");
        }

        self.subscribe(BatchObserver { batcher });
        view
    }
}

impl<T: Concat + Clone + Send + 'static> Stream<T> {
    /// [`Stream::time_buffered_with`] using concatenation.
    pub fn time_buffered(&self, period: Duration) -> Stream<T> {
        self.time_buffered_with(period, <T as Concat>::concat)
    }
}
