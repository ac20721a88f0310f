//! Per-module load coalescing.
//!
//! Every outstanding load is a [`Shared`] future keyed by module. A caller
//! that finds one attaches by cloning it; nobody starts a second load for the
//! same module while the first is outstanding.
//!
//! The pending map's lock also orders reads of the [`ResultStore`]: a load
//! settles by writing the store and clearing its pending entry under that
//! lock, so a requester can never observe the gap between the two and start
//! a duplicate.

use std::collections::HashMap;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::error::Result;
use crate::host::ModuleKey;
use crate::store::ResultStore;

/// Awaitable outcome of one load, cloned to every attached caller.
pub(crate) type PendingLoad<R> = Shared<BoxFuture<'static, Result<R>>>;

/// How a request was satisfied.
pub(crate) enum Flight<R> {
	/// Already in the store.
	Resolved(R),
	/// Attached to a load someone else started.
	Joined(PendingLoad<R>),
	/// Started a fresh load.
	Started(PendingLoad<R>),
}

pub(crate) struct SingleFlight<M, R> {
	pending: Mutex<HashMap<M, PendingLoad<R>>>,
}

impl<M, R> Default for SingleFlight<M, R> {
	fn default() -> Self {
		Self {
			pending: Mutex::new(HashMap::new()),
		}
	}
}

impl<M, R> SingleFlight<M, R>
where
	M: ModuleKey,
	R: Clone + Send + Sync + 'static,
{
	/// Returns the stored result, the outstanding load, or the load made by `start`.
	///
	/// `start` runs under the pending lock and must not block on this flight.
	pub(crate) fn join_or_start(&self, module: &M, store: &ResultStore<M, R>, start: impl FnOnce() -> PendingLoad<R>) -> Flight<R> {
		let mut pending = self.pending.lock();
		if let Some(result) = store.get(module) {
			return Flight::Resolved(result);
		}
		if let Some(load) = pending.get(module) {
			return Flight::Joined(load.clone());
		}

		let load = start();
		pending.insert(module.clone(), load.clone());
		Flight::Started(load)
	}

	/// Publishes a finished load: successes go to the store, then the entry clears.
	pub(crate) fn settle(&self, module: &M, store: &ResultStore<M, R>, outcome: &Result<R>) {
		let mut pending = self.pending.lock();
		if let Ok(result) = outcome {
			store.put(module.clone(), result.clone());
		}
		pending.remove(module);
	}

	/// Drops the pending entry without publishing anything.
	pub(crate) fn forget(&self, module: &M) {
		self.pending.lock().remove(module);
	}

	pub(crate) fn is_pending(&self, module: &M) -> bool {
		self.pending.lock().contains_key(module)
	}
}
