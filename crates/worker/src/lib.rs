//! Background work primitives for live module environments.
//!
//! Everything here is cooperative: work is spawned onto the ambient tokio
//! runtime (or a global fallback when the caller is not on one) and stops by
//! observing a [`Liveness`] switch rather than by being aborted.

mod liveness;
mod poller;
mod spawn;

pub use liveness::Liveness;
pub use poller::{MIN_POLL_INTERVAL, PollFlow, Poller, spawn_poller};
pub use spawn::spawn;
