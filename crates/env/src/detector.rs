//! Change detection for watched modules.
//!
//! Each watch runs two triggers against one [`Probe`]: the host's
//! source-changed event and a low-frequency backstop poll. Both compare the
//! freshly read text with the probe's last observation and swap it in under
//! one lock, so whichever trigger sees an edit first reports it and the
//! other finds nothing new.

use std::collections::HashMap;
use std::sync::Arc;

use hotmod_worker::{Liveness, PollFlow, Poller, spawn_poller};
use parking_lot::Mutex;

use crate::config::EnvConfig;
use crate::host::{ModuleKey, SourceHost, SourceSubscription};
use crate::signal::DependencySignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
	Event,
	Poll,
}

impl Trigger {
	const fn as_str(self) -> &'static str {
		match self {
			Self::Event => "event",
			Self::Poll => "poll",
		}
	}
}

/// Last source text seen for one module.
#[derive(Debug, Default)]
pub(crate) struct ObservedSource {
	last: Mutex<Option<String>>,
}

impl ObservedSource {
	fn new(baseline: Option<String>) -> Self {
		Self { last: Mutex::new(baseline) }
	}

	/// Swaps in `current` and reports whether it differs from the last observation.
	///
	/// The first observation only establishes a baseline.
	pub(crate) fn observe(&self, current: String) -> bool {
		let mut last = self.last.lock();
		match last.as_deref() {
			Some(prev) if prev == current => false,
			Some(_) => {
				*last = Some(current);
				true
			}
			None => {
				*last = Some(current);
				false
			}
		}
	}
}

/// Shared compare-and-notify state for one watched module.
struct Probe<M> {
	module: M,
	host: Arc<dyn SourceHost<M>>,
	observed: ObservedSource,
	liveness: Liveness,
	changed: Arc<DependencySignal<M>>,
}

impl<M: ModuleKey> Probe<M> {
	fn check(&self, trigger: Trigger) {
		if !self.liveness.is_live() {
			return;
		}
		let Some(current) = self.host.current_source(&self.module) else {
			tracing::trace!(module = ?self.module, trigger = trigger.as_str(), "env.watch.unreadable");
			return;
		};
		if !self.observed.observe(current) || !self.liveness.is_live() {
			return;
		}
		let subscribers = self.changed.fire(&self.module);
		tracing::debug!(module = ?self.module, trigger = trigger.as_str(), subscribers, "env.watch.changed");
	}
}

struct WatchEntry {
	subscription: Box<dyn SourceSubscription>,
	poller: Option<Poller>,
}

impl WatchEntry {
	fn release(mut self) {
		self.subscription.disconnect();
		if let Some(poller) = self.poller {
			poller.cancel();
		}
	}
}

/// Owns every watch of one environment.
pub(crate) struct ChangeDetector<M> {
	host: Arc<dyn SourceHost<M>>,
	changed: Arc<DependencySignal<M>>,
	liveness: Liveness,
	config: EnvConfig,
	watches: Mutex<HashMap<M, WatchEntry>>,
}

impl<M: ModuleKey> ChangeDetector<M> {
	pub(crate) fn new(host: Arc<dyn SourceHost<M>>, changed: Arc<DependencySignal<M>>, liveness: Liveness, config: EnvConfig) -> Self {
		Self {
			host,
			changed,
			liveness,
			config,
			watches: Mutex::new(HashMap::new()),
		}
	}

	/// Arms both triggers for `module`. Returns false when already watched or torn down.
	///
	/// The watch lock is held while arming so two racing callers cannot both
	/// subscribe to the host.
	pub(crate) fn watch(&self, module: &M) -> bool {
		let mut watches = self.watches.lock();
		if !self.liveness.is_live() || watches.contains_key(module) {
			return false;
		}

		let probe = Arc::new(Probe {
			module: module.clone(),
			host: Arc::clone(&self.host),
			observed: ObservedSource::new(self.host.current_source(module)),
			liveness: self.liveness.clone(),
			changed: Arc::clone(&self.changed),
		});

		let event_probe = Arc::clone(&probe);
		let subscription = self
			.host
			.connect_source_changed(module, Arc::new(move || event_probe.check(Trigger::Event)));

		let poller = self.config.polling().then(|| {
			let poll_probe = Arc::clone(&probe);
			spawn_poller("env.watch.poll", self.config.poll_interval(), &self.liveness, move || {
				poll_probe.check(Trigger::Poll);
				PollFlow::Continue
			})
		});

		watches.insert(module.clone(), WatchEntry { subscription, poller });
		tracing::debug!(module = ?module, polling = self.config.polling(), "env.watch.armed");
		true
	}

	pub(crate) fn is_watching(&self, module: &M) -> bool {
		self.watches.lock().contains_key(module)
	}

	pub(crate) fn len(&self) -> usize {
		self.watches.lock().len()
	}
}

impl<M> ChangeDetector<M> {
	/// Disconnects and cancels every watch. Returns how many were released.
	///
	/// Callers revoke liveness first, so no watch can be armed afterwards.
	pub(crate) fn release_all(&self) -> usize {
		let entries: Vec<WatchEntry> = self.watches.lock().drain().map(|(_, entry)| entry).collect();
		let released = entries.len();
		for entry in entries {
			entry.release();
		}
		released
	}
}
