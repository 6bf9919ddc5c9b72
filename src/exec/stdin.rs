// src/exec/stdin.rs

//! Pattern-triggered stdin delivery.

use std::sync::Mutex;

use anyhow::Result;
use tracing::debug;

use crate::stream::Observer;
use crate::stream::publisher::lock;

/// One-shot observer: writes `value` once `expected` has appeared in the
/// output, even when the text arrives split over several chunks.
///
/// Only the last `expected.len()` bytes of output are kept between chunks.
pub struct StdinTrigger<W> {
    expected: String,
    value: String,
    write: W,
    state: Mutex<TriggerState>,
}

#[derive(Default)]
struct TriggerState {
    lookback: String,
    fired: bool,
}

impl<W> StdinTrigger<W>
where
    W: Fn(&str) + Send + Sync,
{
    pub fn new(expected: impl Into<String>, value: impl Into<String>, write: W) -> Self {
        Self {
            expected: expected.into(),
            value: value.into(),
            write,
            state: Mutex::new(TriggerState::default()),
        }
    }

    pub fn has_fired(&self) -> bool {
        lock(&self.state).fired
    }
}

impl<W> Observer<String> for StdinTrigger<W>
where
    W: Fn(&str) + Send + Sync,
{
    fn on_next(&self, chunk: &String) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fired {
            return Ok(());
        }

        state.lookback.push_str(chunk);
        if state.lookback.contains(&self.expected) {
            state.fired = true;
            state.lookback = String::new();
            debug!(expected = %self.expected, "stdin trigger matched");
            (self.write)(&self.value);
            return Ok(());
        }

        let keep_from = tail_start(&state.lookback, self.expected.len());
        state.lookback.drain(..keep_from);
        Ok(())
    }
}

/// Byte index where the last `keep` bytes start, moved back to a char
/// boundary.
fn tail_start(text: &str, keep: usize) -> usize {
    let mut start = text.len().saturating_sub(keep);
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    start
}
