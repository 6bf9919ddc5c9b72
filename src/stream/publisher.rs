// src/stream/publisher.rs

//! Writable [`Publisher`] and read-only [`Stream`] over one shared core.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;

use anyhow::Result as AnyResult;

use crate::errors::{Result, ScriptcastError};
use crate::stream::observer::{FnObserver, Observer, deliver_close, deliver_next};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared<T> {
    state: Mutex<State<T>>,
    /// Signalled when the emission slot is released.
    slot_cv: Condvar,
    closed_cv: Condvar,
    replaying: bool,
}

struct State<T> {
    closed: bool,
    /// A close queued by an observer; later pushes are rejected.
    close_pending: bool,
    observers: Vec<Arc<dyn Observer<T>>>,
    /// Replay buffer. `None` for plain streams and after `dispose()`.
    history: Option<Vec<T>>,
    /// Thread currently delivering. push / close / replay-subscribe take
    /// turns on this slot, so every observer sees one total order of values
    /// followed by at most one close.
    emitter: Option<ThreadId>,
    /// Emissions requested by an observer while its own thread holds the
    /// slot; delivered once the current delivery returns.
    deferred: VecDeque<Emission<T>>,
}

enum Emission<T> {
    Next(T),
    Close,
}

/// Outcome of waiting for the emission slot.
enum Slot<'a, T> {
    Acquired,
    /// The calling thread already emits on this stream.
    Reentrant(MutexGuard<'a, State<T>>),
    Closed,
}

impl<T: Clone + Send + 'static> Shared<T> {
    /// Wait for the emission slot. A closed (or closing) stream is reported
    /// instead of waited on when `reject_closed` is set.
    fn acquire(&self, reject_closed: bool) -> Slot<'_, T> {
        let me = thread::current().id();
        let mut state = lock(&self.state);
        loop {
            if reject_closed && (state.closed || state.close_pending) {
                return Slot::Closed;
            }
            let owner = state.emitter;
            match owner {
                None => {
                    state.emitter = Some(me);
                    return Slot::Acquired;
                }
                Some(owner) if owner == me => return Slot::Reentrant(state),
                Some(_) => {
                    state = self
                        .slot_cv
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// Deliver what observers queued meanwhile, then free the slot.
    fn release(&self) {
        loop {
            let next = {
                let mut state = lock(&self.state);
                match state.deferred.pop_front() {
                    Some(emission) => emission,
                    None => {
                        state.emitter = None;
                        break;
                    }
                }
            };
            match next {
                Emission::Next(value) => self.deliver_value(value),
                Emission::Close => self.deliver_close(),
            }
        }
        self.slot_cv.notify_all();
    }

    fn push(&self, value: T) -> Result<()> {
        match self.acquire(true) {
            Slot::Closed => Err(ScriptcastError::StreamClosed),
            Slot::Reentrant(mut state) => {
                state.deferred.push_back(Emission::Next(value));
                Ok(())
            }
            Slot::Acquired => {
                self.deliver_value(value);
                self.release();
                Ok(())
            }
        }
    }

    fn close(&self) {
        match self.acquire(true) {
            Slot::Closed => {}
            Slot::Reentrant(mut state) => {
                state.close_pending = true;
                state.deferred.push_back(Emission::Close);
            }
            Slot::Acquired => {
                self.deliver_close();
                self.release();
            }
        }
    }

    /// Caller holds the slot.
    fn deliver_value(&self, value: T) {
        let observers = {
            let mut state = lock(&self.state);
            if let Some(history) = state.history.as_mut() {
                history.push(value.clone());
            }
            state.observers.clone()
        };

        for observer in observers.iter() {
            deliver_next(observer.as_ref(), &value);
        }
    }

    /// Caller holds the slot.
    fn deliver_close(&self) {
        let observers = {
            let mut state = lock(&self.state);
            if state.closed {
                return;
            }
            state.closed = true;
            state.close_pending = false;
            std::mem::take(&mut state.observers)
        };

        for observer in observers.iter() {
            deliver_close(observer.as_ref());
        }
        self.closed_cv.notify_all();
    }

    /// Caller holds the slot (or is the emitting thread).
    fn replay_to(&self, observer: Arc<dyn Observer<T>>) {
        let (history, closed) = {
            let mut state = lock(&self.state);
            let history = state.history.clone().unwrap_or_default();
            if !state.closed {
                state.observers.push(Arc::clone(&observer));
            }
            (history, state.closed)
        };

        for value in history.iter() {
            deliver_next(observer.as_ref(), value);
        }
        if closed {
            deliver_close(observer.as_ref());
        }
    }
}

/// Writer side of a stream. Cloning shares the same stream.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

/// Read-only handle: subscribe, derive views, wait for close.
pub struct Stream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> Publisher<T> {
    /// Plain stream: subscribers only see values pushed after they attach.
    pub fn new() -> Self {
        Self::with_replay(false)
    }

    /// Replaying stream: every subscriber sees the full history first.
    pub fn replaying() -> Self {
        Self::with_replay(true)
    }

    fn with_replay(replaying: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    closed: false,
                    close_pending: false,
                    observers: Vec::new(),
                    history: replaying.then(Vec::new),
                    emitter: None,
                    deferred: VecDeque::new(),
                }),
                slot_cv: Condvar::new(),
                closed_cv: Condvar::new(),
                replaying,
            }),
        }
    }

    pub fn stream(&self) -> Stream<T> {
        Stream {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Deliver `value` to every current observer, in subscription order.
    ///
    /// Called from one of this stream's own observers, the value is queued
    /// and delivered right after the value being handled.
    pub fn push(&self, value: T) -> Result<()> {
        self.shared.push(value)
    }

    /// Close the stream. Idempotent. Like `push`, a close requested from an
    /// observer takes effect after the current delivery.
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.shared.state).closed
    }
}

impl<T: Clone + Send + 'static> Stream<T> {
    pub fn is_closed(&self) -> bool {
        lock(&self.shared.state).closed
    }

    pub fn is_replaying(&self) -> bool {
        self.shared.replaying
    }

    pub fn subscribe<O>(&self, observer: O)
    where
        O: Observer<T> + 'static,
    {
        self.subscribe_arc(Arc::new(observer));
    }

    /// Subscribe with a pair of closures.
    pub fn subscribe_fn<N, C>(&self, on_next: N, on_close: C)
    where
        N: Fn(&T) -> AnyResult<()> + Send + Sync + 'static,
        C: Fn() -> AnyResult<()> + Send + Sync + 'static,
    {
        self.subscribe(FnObserver::new(on_next, on_close));
    }

    pub fn subscribe_arc(&self, observer: Arc<dyn Observer<T>>) {
        if self.shared.replaying {
            self.subscribe_replaying(observer);
            return;
        }

        let closed = {
            let mut state = lock(&self.shared.state);
            if !state.closed {
                state.observers.push(Arc::clone(&observer));
            }
            state.closed
        };

        if closed {
            deliver_close(observer.as_ref());
        }
    }

    fn subscribe_replaying(&self, observer: Arc<dyn Observer<T>>) {
        // Holding the slot keeps live values from overtaking the replayed
        // history.
        match self.shared.acquire(false) {
            Slot::Acquired => {
                self.shared.replay_to(observer);
                self.shared.release();
            }
            Slot::Reentrant(state) => {
                drop(state);
                self.shared.replay_to(observer);
            }
            Slot::Closed => {}
        }
    }

    /// Release the replay buffer.
    ///
    /// Observers already attached keep receiving values until the upstream
    /// closes; subscribers attaching later only see live values (or just the
    /// close, if the stream already finished).
    pub fn dispose(&self) {
        lock(&self.shared.state).history = None;
    }

    /// Block until the stream is closed, or until `timeout` elapses.
    pub fn wait_close(&self, timeout: Option<Duration>) -> Result<()> {
        let state = lock(&self.shared.state);
        match timeout {
            None => {
                let _state = self
                    .shared
                    .closed_cv
                    .wait_while(state, |s| !s.closed)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(())
            }
            Some(limit) => {
                let (state, _) = self
                    .shared
                    .closed_cv
                    .wait_timeout_while(state, limit, |s| !s.closed)
                    .unwrap_or_else(PoisonError::into_inner);
                if state.closed {
                    Ok(())
                } else {
                    Err(ScriptcastError::StreamTimeout(limit))
                }
            }
        }
    }

    /// Collect every value delivered from now on until the stream closes.
    ///
    /// For a replaying stream this includes the history.
    pub fn drain_until_closed(&self, timeout: Option<Duration>) -> Result<Vec<T>> {
        let collected = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        self.subscribe_fn(
            move |value: &T| {
                lock(&sink).push(value.clone());
                Ok(())
            },
            || Ok(()),
        );

        self.wait_close(timeout)?;
        let values = std::mem::take(&mut *lock(&collected));
        Ok(values)
    }

    /// Derived stream of `transform(value)` for every upstream value.
    pub fn map<U, F>(&self, transform: F) -> Stream<U>
    where
        U: Clone + Send + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let downstream = Publisher::new();
        let view = downstream.stream();
        self.subscribe(Relay {
            downstream,
            transform,
        });
        view
    }

    /// Derived stream that keeps the full history for late subscribers.
    pub fn replay(&self) -> Stream<T> {
        let downstream = Publisher::replaying();
        let view = downstream.stream();
        self.subscribe(Relay {
            downstream,
            transform: T::clone,
        });
        view
    }
}

/// Forwards upstream values (transformed) and the close into a derived
/// stream's publisher.
pub(crate) struct Relay<U, F> {
    pub(crate) downstream: Publisher<U>,
    pub(crate) transform: F,
}

impl<T, U, F> Observer<T> for Relay<U, F>
where
    U: Clone + Send + 'static,
    F: Fn(&T) -> U + Send + Sync,
{
    fn on_next(&self, value: &T) -> AnyResult<()> {
        // A closed downstream just stops listening.
        let _ = self.downstream.push((self.transform)(value));
        Ok(())
    }

    fn on_close(&self) -> AnyResult<()> {
        self.downstream.close();
        Ok(())
    }
}
