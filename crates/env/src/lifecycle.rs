//! Teardown ordering for an environment.
//!
//! Teardown runs at most once: the shutdown hook first (while the
//! environment still reads as live), then the liveness switch is revoked,
//! then the owner releases its watchers and signal.

use std::sync::atomic::{AtomicBool, Ordering};

use hotmod_worker::Liveness;
use parking_lot::Mutex;

/// Callback registered through [`Environment::hook_on_destroyed`](crate::Environment::hook_on_destroyed).
pub type ShutdownHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct Lifecycle {
	liveness: Liveness,
	torn_down: AtomicBool,
	hook: Mutex<Option<ShutdownHook>>,
}

impl Lifecycle {
	pub(crate) fn liveness(&self) -> &Liveness {
		&self.liveness
	}

	pub(crate) fn is_live(&self) -> bool {
		self.liveness.is_live()
	}

	pub(crate) fn is_torn_down(&self) -> bool {
		self.torn_down.load(Ordering::Acquire)
	}

	/// Stores `hook`, replacing any earlier one. Returns false after teardown began.
	pub(crate) fn set_hook(&self, hook: ShutdownHook) -> bool {
		if self.is_torn_down() {
			return false;
		}
		*self.hook.lock() = Some(hook);
		true
	}

	/// Runs the teardown sequence once; later calls return false without side effects.
	pub(crate) fn teardown(&self, release: impl FnOnce()) -> bool {
		if self.torn_down.swap(true, Ordering::AcqRel) {
			return false;
		}

		let hook = self.hook.lock().take();
		if let Some(hook) = hook {
			hook();
		}
		self.liveness.revoke();
		release();
		true
	}
}

impl std::fmt::Debug for Lifecycle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Lifecycle")
			.field("live", &self.is_live())
			.field("torn_down", &self.is_torn_down())
			.field("hooked", &self.hook.lock().is_some())
			.finish()
	}
}
