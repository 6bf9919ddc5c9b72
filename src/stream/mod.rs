// src/stream/mod.rs

//! Push-based, multi-subscriber, closable streams.
//!
//! - [`Publisher`] is the single writer side (`push` / `close`).
//! - [`Stream`] is the read side: `subscribe`, `wait_close`, and derived views
//!   (`map`, `time_buffered`, `replay`). Derived views have no writer of their
//!   own; they close when their upstream closes.
//! - [`Observer`] receives values and the close notification synchronously on
//!   the pushing thread.
//!
//! Output of one process is fanned out this way to the live viewer, the
//! masking view and any post-finish consumer, without the reader thread
//! knowing how many there are.

pub mod buffered;
pub mod publisher;
pub mod observer;

pub use buffered::Concat;
pub use publisher::{Publisher, Stream};
pub use observer::{FnObserver, Observer};
