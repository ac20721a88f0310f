#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hotmod_env::{BoxError, Environment, ModuleLoader, OnDisconnect, SourceChangedFn, SourceHost, SourceSubscription};
use parking_lot::Mutex;
use slab::Slab;

pub type Module = &'static str;
pub type Env = Environment<Module, String>;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt::try_init();
}

#[derive(Default)]
struct HostState {
	sources: HashMap<Module, String>,
	listeners: HashMap<Module, Slab<SourceChangedFn>>,
}

/// Editor stand-in holding module sources in memory.
#[derive(Default)]
pub struct MemoryHost {
	state: Arc<Mutex<HostState>>,
	reads: AtomicUsize,
}

impl MemoryHost {
	pub fn with_sources(sources: &[(Module, &str)]) -> Arc<Self> {
		let host = Self::default();
		{
			let mut state = host.state.lock();
			for (module, text) in sources {
				state.sources.insert(*module, (*text).to_string());
			}
		}
		Arc::new(host)
	}

	/// Edits `module` and fires its source-changed listeners, like a live buffer edit.
	pub fn edit(&self, module: Module, text: &str) {
		let listeners: Vec<SourceChangedFn> = {
			let mut state = self.state.lock();
			state.sources.insert(module, text.to_string());
			state
				.listeners
				.get(module)
				.map(|slab| slab.iter().map(|(_, f)| Arc::clone(f)).collect())
				.unwrap_or_default()
		};
		for listener in listeners {
			listener();
		}
	}

	/// Edits `module` without firing any event; only polling can notice.
	pub fn edit_silently(&self, module: Module, text: &str) {
		self.state.lock().sources.insert(module, text.to_string());
	}

	/// Makes `module` unreadable.
	pub fn remove(&self, module: Module) {
		self.state.lock().sources.remove(module);
	}

	/// Fires listeners without touching the text.
	pub fn touch(&self, module: Module) {
		let listeners: Vec<SourceChangedFn> = {
			let state = self.state.lock();
			state
				.listeners
				.get(module)
				.map(|slab| slab.iter().map(|(_, f)| Arc::clone(f)).collect())
				.unwrap_or_default()
		};
		for listener in listeners {
			listener();
		}
	}

	/// Reads `module` without counting it as a host read.
	pub fn peek(&self, module: Module) -> Option<String> {
		self.state.lock().sources.get(module).cloned()
	}

	pub fn reads(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	pub fn listener_count(&self, module: Module) -> usize {
		self.state.lock().listeners.get(module).map_or(0, Slab::len)
	}
}

impl SourceHost<Module> for MemoryHost {
	fn current_source(&self, module: &Module) -> Option<String> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		self.state.lock().sources.get(module).cloned()
	}

	fn connect_source_changed(&self, module: &Module, on_change: SourceChangedFn) -> Box<dyn SourceSubscription> {
		let module = *module;
		let key = self.state.lock().listeners.entry(module).or_default().insert(on_change);
		let state = Arc::downgrade(&self.state);
		Box::new(OnDisconnect::new(move || {
			let Some(state) = state.upgrade() else {
				return;
			};
			if let Some(slab) = state.lock().listeners.get_mut(module) {
				slab.try_remove(key);
			}
		}))
	}
}

/// Loader returning `"<module>@<source>"` after an optional delay.
///
/// Modules listed in `failures` fail that many times before succeeding.
pub struct EchoLoader {
	host: Arc<MemoryHost>,
	delay: Duration,
	calls: Mutex<HashMap<Module, usize>>,
	failures: Mutex<HashMap<Module, usize>>,
}

impl EchoLoader {
	pub fn new(host: &Arc<MemoryHost>) -> Arc<Self> {
		Self::with_delay(host, Duration::ZERO)
	}

	pub fn with_delay(host: &Arc<MemoryHost>, delay: Duration) -> Arc<Self> {
		Arc::new(Self {
			host: Arc::clone(host),
			delay,
			calls: Mutex::new(HashMap::new()),
			failures: Mutex::new(HashMap::new()),
		})
	}

	pub fn fail_times(&self, module: Module, times: usize) {
		self.failures.lock().insert(module, times);
	}

	pub fn calls(&self, module: Module) -> usize {
		self.calls.lock().get(module).copied().unwrap_or(0)
	}
}

#[async_trait]
impl ModuleLoader<Module, String> for EchoLoader {
	async fn load(&self, module: Module, _env: Env) -> Result<String, BoxError> {
		*self.calls.lock().entry(module).or_default() += 1;
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}

		let should_fail = {
			let mut failures = self.failures.lock();
			match failures.get_mut(module) {
				Some(left) if *left > 0 => {
					*left -= 1;
					true
				}
				_ => false,
			}
		};
		if should_fail {
			return Err(format!("{module} failed to compile").into());
		}

		let source = self.host.peek(module).unwrap_or_default();
		Ok(format!("{module}@{source}"))
	}
}

pub fn env_with(host: &Arc<MemoryHost>, loader: Arc<dyn ModuleLoader<Module, String>>) -> Env {
	init_tracing();
	Environment::new(loader, host.clone())
}

/// Counts notifications per module.
pub fn record_changes(env: &Env) -> Arc<Mutex<Vec<Module>>> {
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	let _conn = env.on_dependency_changed(move |module| sink.lock().push(*module));
	seen
}

pub fn count(seen: &Mutex<Vec<Module>>, module: Module) -> usize {
	seen.lock().iter().filter(|m| **m == module).count()
}
