// src/stream/observer.rs

use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::Result;
use tracing::{error, warn};

/// Receiver side of a [`Stream`](super::Stream).
///
/// Both callbacks run synchronously on the thread that pushed (or closed).
/// Returning an error (or panicking) only skips this observer for the current
/// value; other observers and future values are unaffected.
pub trait Observer<T>: Send + Sync {
    fn on_next(&self, value: &T) -> Result<()>;

    fn on_close(&self) -> Result<()> {
        Ok(())
    }
}

/// Observer built from two closures.
pub struct FnObserver<N, C> {
    next: N,
    close: C,
}

impl<N, C> FnObserver<N, C> {
    pub fn new<T>(next: N, close: C) -> Self
    where
        N: Fn(&T) -> Result<()> + Send + Sync,
        C: Fn() -> Result<()> + Send + Sync,
    {
        Self { next, close }
    }
}

impl<T, N, C> Observer<T> for FnObserver<N, C>
where
    N: Fn(&T) -> Result<()> + Send + Sync,
    C: Fn() -> Result<()> + Send + Sync,
{
    fn on_next(&self, value: &T) -> Result<()> {
        (self.next)(value)
    }

    fn on_close(&self) -> Result<()> {
        (self.close)()
    }
}

pub(crate) fn deliver_next<T>(observer: &dyn Observer<T>, value: &T) {
    match catch_unwind(AssertUnwindSafe(|| observer.on_next(value))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "stream observer failed; value skipped for it"),
        Err(_) => error!("stream observer panicked; value skipped for it"),
    }
}

pub(crate) fn deliver_close<T>(observer: &dyn Observer<T>) {
    match catch_unwind(AssertUnwindSafe(|| observer.on_close())) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "stream observer failed on close"),
        Err(_) => error!("stream observer panicked on close"),
    }
}
