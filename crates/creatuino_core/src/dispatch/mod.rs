//! Parallel job execution.
//!
//! The [`Dispatcher`] runs a [`JobQueue`](crate::plan::JobQueue) on a fixed
//! pool of scoped worker threads. Workers claim jobs through an atomic
//! cursor, so each job is executed at most once, and write each outcome into
//! the slot of its queue position.
//!
//! - `encode` jobs run the external encoder into a hidden temp file next to
//!   the destination
//! - `copy` jobs stream bytes into such a temp file
//!
//! Either way the temp file is renamed into place only on success.
//! A [`CancelHandle`] stops new claims; running encoders get the configured
//! shutdown grace before they are killed.

mod cancel;
mod copy;
mod encoder;
mod pool;
mod staging;

pub use cancel::CancelHandle;
pub use encoder::{locate_encoder, EncoderConfig};
pub use pool::{Dispatcher, DispatcherConfig};
pub use staging::probe_writable;
