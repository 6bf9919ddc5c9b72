use std::sync::{Arc, Mutex};

use scriptcast::stream::{Observer, Stream};

/// What an observer saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    Next(T),
    Close,
}

/// Observer that records every callback. Clones share the same log.
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<Event<T>>>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
        }
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// New recorder already subscribed to `stream`.
    pub fn attach(stream: &Stream<T>) -> Self {
        let recorder = Self::new();
        stream.subscribe(recorder.clone());
        recorder
    }

    pub fn events(&self) -> Vec<Event<T>> {
        self.events.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<T> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Next(value) => Some(value),
                Event::Close => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, Event::Close))
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl<T: Clone + Send + 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder<String> {
    /// All text values concatenated.
    pub fn text(&self) -> String {
        self.values().concat()
    }
}

impl<T: Clone + Send + 'static> Observer<T> for Recorder<T> {
    fn on_next(&self, value: &T) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(Event::Next(value.clone()));
        Ok(())
    }

    fn on_close(&self) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(Event::Close);
        Ok(())
    }
}
