use std::collections::HashMap;
use std::collections::hash_map::Entry;

use parking_lot::RwLock;

use crate::host::ModuleKey;

/// Append-only map from module identity to its computed result.
///
/// Presence is map membership, so "empty" results such as `None` or `()`
/// still count as resolved.
#[derive(Debug)]
pub(crate) struct ResultStore<M, R> {
	resolved: RwLock<HashMap<M, R>>,
}

impl<M, R> Default for ResultStore<M, R> {
	fn default() -> Self {
		Self {
			resolved: RwLock::new(HashMap::new()),
		}
	}
}

impl<M: ModuleKey, R: Clone> ResultStore<M, R> {
	pub(crate) fn has(&self, module: &M) -> bool {
		self.resolved.read().contains_key(module)
	}

	pub(crate) fn get(&self, module: &M) -> Option<R> {
		self.resolved.read().get(module).cloned()
	}

	/// Records `result` unless the module already resolved.
	///
	/// Returns false (and keeps the first result) on a second write.
	pub(crate) fn put(&self, module: M, result: R) -> bool {
		match self.resolved.write().entry(module) {
			Entry::Occupied(entry) => {
				tracing::warn!(module = ?entry.key(), "env.store.overwrite_rejected");
				false
			}
			Entry::Vacant(entry) => {
				entry.insert(result);
				true
			}
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.resolved.read().len()
	}
}
