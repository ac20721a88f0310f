//! Seams to the editor host and to the module compiler.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Environment;

/// Boxed error returned by a [`ModuleLoader`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback a [`SourceHost`] invokes when a module's source mutates.
pub type SourceChangedFn = Arc<dyn Fn() + Send + Sync>;

/// Opaque identity of a loadable module. Compared by equality only.
pub trait ModuleKey: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

impl<T> ModuleKey for T where T: Clone + Eq + Hash + Debug + Send + Sync + 'static {}

/// Compiles and executes one module.
///
/// `env` is a handle to the requesting environment, so the loader can pull
/// nested dependencies through [`Environment::load`].
#[async_trait]
pub trait ModuleLoader<M, R>: Send + Sync + 'static {
	async fn load(&self, module: M, env: Environment<M, R>) -> Result<R, BoxError>;
}

/// Editor-side view of live module sources.
pub trait SourceHost<M>: Send + Sync + 'static {
	/// Returns the text the editor currently holds for `module`.
	///
	/// `None` means the text is missing or unreadable right now.
	fn current_source(&self, module: &M) -> Option<String>;

	/// Registers `on_change` to run synchronously whenever `module`'s source
	/// is mutated. The callback must stay registered until the returned
	/// subscription is disconnected.
	fn connect_source_changed(&self, module: &M, on_change: SourceChangedFn) -> Box<dyn SourceSubscription>;
}

/// Live registration with a host's source-changed event.
pub trait SourceSubscription: Send {
	/// Stops further callbacks. Repeated calls are no-ops.
	fn disconnect(&mut self);
}

/// [`SourceSubscription`] that runs a closure on first disconnect.
pub struct OnDisconnect(Option<Box<dyn FnOnce() + Send>>);

impl OnDisconnect {
	pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
		Self(Some(Box::new(f)))
	}
}

impl Debug for OnDisconnect {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("OnDisconnect").field("connected", &self.0.is_some()).finish()
	}
}

impl SourceSubscription for OnDisconnect {
	fn disconnect(&mut self) {
		if let Some(f) = self.0.take() {
			f();
		}
	}
}
