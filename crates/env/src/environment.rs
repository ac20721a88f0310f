use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::config::EnvConfig;
use crate::detector::ChangeDetector;
use crate::error::{EnvError, Result};
use crate::flight::{Flight, PendingLoad, SingleFlight};
use crate::host::{ModuleKey, ModuleLoader, SourceHost};
use crate::injection::{InjectedValue, InjectionSlot, InjectionTable, SharedState};
use crate::lifecycle::Lifecycle;
use crate::signal::{DependencySignal, SignalConnection};
use crate::store::ResultStore;

/// Unique identity of one environment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnvironmentId(Uuid);

impl EnvironmentId {
	fn generate() -> Self {
		Self(Uuid::new_v4())
	}

	pub fn as_uuid(&self) -> Uuid {
		self.0
	}
}

impl fmt::Display for EnvironmentId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0.hyphenated())
	}
}

struct Inner<M, R> {
	id: EnvironmentId,
	config: EnvConfig,
	loader: Arc<dyn ModuleLoader<M, R>>,
	store: ResultStore<M, R>,
	flight: SingleFlight<M, R>,
	detector: ChangeDetector<M>,
	changed: Arc<DependencySignal<M>>,
	lifecycle: Lifecycle,
	injection: InjectionSlot,
	shared: SharedState,
}

/// One isolated loading context: a result cache, single-flight loads, and
/// live change detection over the host's module sources.
///
/// Cloning is cheap and every clone refers to the same environment. When the
/// last clone drops without [`Self::destroy`], the same teardown runs then.
///
/// In-flight loads survive teardown. They run to completion and settle into
/// the result store, which nothing reads further.
pub struct Environment<M, R> {
	inner: Arc<Inner<M, R>>,
}

impl<M, R> Clone for Environment<M, R> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<M, R> fmt::Debug for Environment<M, R> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Environment")
			.field("id", &self.inner.id)
			.field("lifecycle", &self.inner.lifecycle)
			.finish_non_exhaustive()
	}
}

impl<M, R> Environment<M, R>
where
	M: ModuleKey,
	R: Clone + Send + Sync + 'static,
{
	/// Creates an environment with default configuration.
	pub fn new(loader: Arc<dyn ModuleLoader<M, R>>, host: Arc<dyn SourceHost<M>>) -> Self {
		Self::with_config(loader, host, EnvConfig::default())
	}

	pub fn with_config(loader: Arc<dyn ModuleLoader<M, R>>, host: Arc<dyn SourceHost<M>>, config: EnvConfig) -> Self {
		let id = EnvironmentId::generate();
		let lifecycle = Lifecycle::default();
		let changed = Arc::new(DependencySignal::default());
		let detector = ChangeDetector::new(host, Arc::clone(&changed), lifecycle.liveness().clone(), config.clone());
		tracing::debug!(env = %id, poll_interval = ?config.poll_interval(), polling = config.polling(), "env.create");

		Self {
			inner: Arc::new(Inner {
				id,
				config,
				loader,
				store: ResultStore::default(),
				flight: SingleFlight::default(),
				detector,
				changed,
				lifecycle,
				injection: InjectionSlot::default(),
				shared: SharedState::default(),
			}),
		}
	}

	pub fn id(&self) -> EnvironmentId {
		self.inner.id
	}

	pub fn config(&self) -> &EnvConfig {
		&self.inner.config
	}

	/// Returns `module`'s result, loading it at most once per environment.
	///
	/// A cached result returns without suspending. Otherwise the caller
	/// attaches to the outstanding load for `module`, or starts one after
	/// arming change detection so edits made during the load are seen. A
	/// failure reaches every attached caller and caches nothing, so the next
	/// request starts a fresh attempt.
	///
	/// # Errors
	///
	/// [`EnvError::Destroyed`] once the environment is torn down (cached
	/// results included), or the failure of the load this call attached to.
	pub async fn load(&self, module: M) -> Result<R> {
		if !self.inner.lifecycle.is_live() {
			return Err(EnvError::Destroyed { env: self.inner.id });
		}
		if let Some(result) = self.inner.store.get(&module) {
			tracing::trace!(env = %self.inner.id, module = ?module, "env.load.cached");
			return Ok(result);
		}

		self.watch(&module);

		let pending = match self.inner.flight.join_or_start(&module, &self.inner.store, || self.start_load(module.clone())) {
			Flight::Resolved(result) => return Ok(result),
			Flight::Joined(pending) => {
				tracing::trace!(env = %self.inner.id, module = ?module, "env.load.joined");
				pending
			}
			Flight::Started(pending) => pending,
		};
		pending.await
	}

	/// Spawns the external load for `module` and wraps it for sharing.
	///
	/// Runs under the single-flight lock; the spawned task settles through
	/// the same lock, so it cannot publish before the pending entry exists.
	fn start_load(&self, module: M) -> PendingLoad<R> {
		tracing::debug!(env = %self.inner.id, module = ?module, "env.load.start");

		let env = self.clone();
		let task_module = module.clone();
		let task = hotmod_worker::spawn("env.load", async move {
			let inner = &env.inner;
			let outcome = match AssertUnwindSafe(inner.loader.load(task_module.clone(), env.clone())).catch_unwind().await {
				Ok(Ok(result)) => Ok(result),
				Ok(Err(err)) => Err(EnvError::load(&task_module, err)),
				Err(_) => {
					tracing::warn!(env = %inner.id, module = ?task_module, "env.load.panicked");
					Err(EnvError::panicked(&task_module))
				}
			};
			inner.flight.settle(&task_module, &inner.store, &outcome);
			tracing::debug!(env = %inner.id, module = ?task_module, ok = outcome.is_ok(), "env.load.settled");
			outcome
		});

		let weak: Weak<Inner<M, R>> = Arc::downgrade(&self.inner);
		async move {
			match task.await {
				Ok(outcome) => outcome,
				Err(err) => {
					if let Some(inner) = weak.upgrade() {
						inner.flight.forget(&module);
					}
					Err(EnvError::aborted(&module, err))
				}
			}
		}
		.boxed()
		.shared()
	}

	pub fn is_resolved(&self, module: &M) -> bool {
		self.inner.store.has(module)
	}

	/// Returns the cached result for `module`, if it resolved.
	pub fn result(&self, module: &M) -> Option<R> {
		self.inner.store.get(module)
	}

	/// Returns true while a load for `module` is outstanding.
	pub fn is_loading(&self, module: &M) -> bool {
		self.inner.flight.is_pending(module)
	}

	pub fn resolved_count(&self) -> usize {
		self.inner.store.len()
	}

	/// Starts change detection for `module`. No-op when already watched or torn down.
	pub fn watch(&self, module: &M) {
		self.inner.detector.watch(module);
	}

	pub fn is_watched(&self, module: &M) -> bool {
		self.inner.detector.is_watching(module)
	}

	pub fn watched_count(&self) -> usize {
		self.inner.detector.len()
	}

	/// Calls `callback` with each module whose source changed.
	///
	/// Delivery is synchronous with detection and carries no ordering
	/// guarantee across modules. Change notifications never evict cached
	/// results; reacting to them is up to the subscriber.
	pub fn on_dependency_changed(&self, callback: impl Fn(&M) + Send + Sync + 'static) -> SignalConnection<M> {
		self.inner.changed.connect(callback)
	}

	/// Channel flavour of [`Self::on_dependency_changed`].
	///
	/// The receiver yields `None` once the environment is torn down.
	pub fn dependency_changes(&self) -> mpsc::UnboundedReceiver<M> {
		self.inner.changed.subscribe()
	}

	pub fn enable_injection(&self) {
		self.inner.injection.enable();
	}

	/// Injects an ambient global for loaded modules, enabling injection if needed.
	pub fn inject(&self, key: impl Into<String>, value: impl std::any::Any + Send + Sync) {
		let value: InjectedValue = Arc::new(value);
		self.inner.injection.inject(key.into(), value);
	}

	/// Returns a snapshot of injected globals, or `None` if injection was never enabled.
	pub fn injection(&self) -> Option<InjectionTable> {
		self.inner.injection.snapshot()
	}

	pub fn shared(&self) -> &SharedState {
		&self.inner.shared
	}

	/// Registers the shutdown hook. A later registration replaces an earlier one.
	///
	/// The hook runs first during teardown, while [`Self::is_live`] is still true.
	pub fn hook_on_destroyed(&self, hook: impl FnOnce() + Send + 'static) {
		if !self.inner.lifecycle.set_hook(Box::new(hook)) {
			tracing::debug!(env = %self.inner.id, "env.hook.ignored");
		}
	}

	/// Tears the environment down. Later calls are no-ops.
	pub fn destroy(&self) {
		self.inner.teardown();
	}

	/// Returns false once teardown has revoked liveness.
	pub fn is_live(&self) -> bool {
		self.inner.lifecycle.is_live()
	}

	/// Returns true once teardown has started.
	pub fn is_destroyed(&self) -> bool {
		self.inner.lifecycle.is_torn_down()
	}
}

impl<M, R> Inner<M, R> {
	fn teardown(&self) {
		let mut released = 0;
		let ran = self.lifecycle.teardown(|| {
			released = self.detector.release_all();
			self.changed.close();
		});
		if ran {
			tracing::debug!(env = %self.id, watches = released, "env.destroy");
		}
	}
}

impl<M, R> Drop for Inner<M, R> {
	fn drop(&mut self) {
		self.teardown();
	}
}
