//! Broadcast point for module-changed notifications.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slab::Slab;
use tokio::sync::mpsc;

type Callback<M> = Arc<dyn Fn(&M) + Send + Sync>;

enum Subscriber<M> {
	Callback(Callback<M>),
	Channel(mpsc::UnboundedSender<M>),
}

impl<M> Clone for Subscriber<M> {
	fn clone(&self) -> Self {
		match self {
			Self::Callback(f) => Self::Callback(Arc::clone(f)),
			Self::Channel(tx) => Self::Channel(tx.clone()),
		}
	}
}

struct SignalState<M> {
	subscribers: Slab<Subscriber<M>>,
	closed: bool,
}

/// Synchronous fan-out of changed module identities.
///
/// Delivery runs on the detecting thread, outside the subscriber lock, so a
/// subscriber may connect or disconnect from inside its own callback.
pub struct DependencySignal<M> {
	state: Mutex<SignalState<M>>,
}

impl<M> Default for DependencySignal<M> {
	fn default() -> Self {
		Self {
			state: Mutex::new(SignalState {
				subscribers: Slab::new(),
				closed: false,
			}),
		}
	}
}

impl<M> fmt::Debug for DependencySignal<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.state.lock();
		f.debug_struct("DependencySignal")
			.field("subscribers", &state.subscribers.len())
			.field("closed", &state.closed)
			.finish()
	}
}

impl<M> DependencySignal<M> {
	/// Drops every subscriber and refuses new ones.
	pub(crate) fn close(&self) {
		let dropped = {
			let mut state = self.state.lock();
			state.closed = true;
			std::mem::take(&mut state.subscribers)
		};
		tracing::trace!(subscribers = dropped.len(), "env.signal.closed");
	}
}

impl<M: Clone + Send + 'static> DependencySignal<M> {
	/// Registers `callback`. Returns an inert connection once closed.
	pub(crate) fn connect(self: &Arc<Self>, callback: impl Fn(&M) + Send + Sync + 'static) -> SignalConnection<M> {
		self.attach(Subscriber::Callback(Arc::new(callback)))
	}

	/// Registers a channel subscriber. The receiver yields `None` once closed.
	pub(crate) fn subscribe(self: &Arc<Self>) -> mpsc::UnboundedReceiver<M> {
		let (tx, rx) = mpsc::unbounded_channel();
		let _ = self.attach(Subscriber::Channel(tx));
		rx
	}

	fn attach(self: &Arc<Self>, subscriber: Subscriber<M>) -> SignalConnection<M> {
		let mut state = self.state.lock();
		if state.closed {
			return SignalConnection { slot: None };
		}
		let key = state.subscribers.insert(subscriber);
		SignalConnection {
			slot: Some((key, Arc::downgrade(self))),
		}
	}

	/// Delivers `module` to every subscriber. Returns how many were reached.
	pub(crate) fn fire(&self, module: &M) -> usize {
		let targets: Vec<Subscriber<M>> = {
			let mut state = self.state.lock();
			if state.closed {
				return 0;
			}
			state.subscribers.retain(|_, sub| !matches!(sub, Subscriber::Channel(tx) if tx.is_closed()));
			state.subscribers.iter().map(|(_, sub)| sub.clone()).collect()
		};

		let mut delivered = 0;
		for target in targets {
			match target {
				Subscriber::Callback(f) => {
					f(module);
					delivered += 1;
				}
				Subscriber::Channel(tx) => {
					if tx.send(module.clone()).is_ok() {
						delivered += 1;
					}
				}
			}
		}
		delivered
	}

	pub(crate) fn subscriber_count(&self) -> usize {
		self.state.lock().subscribers.len()
	}

	fn detach(&self, key: usize) {
		let mut state = self.state.lock();
		if state.subscribers.contains(key) {
			state.subscribers.remove(key);
		}
	}
}

/// Handle returned by [`Environment::on_dependency_changed`](crate::Environment::on_dependency_changed).
///
/// Dropping the handle keeps the subscription alive; call [`Self::disconnect`]
/// to remove it.
pub struct SignalConnection<M> {
	slot: Option<(usize, Weak<DependencySignal<M>>)>,
}

impl<M: Clone + Send + 'static> SignalConnection<M> {
	/// Removes the subscription.
	pub fn disconnect(self) {
		let Some((key, signal)) = self.slot else {
			return;
		};
		if let Some(signal) = signal.upgrade() {
			signal.detach(key);
		}
	}

	/// Returns false once the signal closed or was dropped.
	pub fn is_connected(&self) -> bool {
		let Some((key, signal)) = &self.slot else {
			return false;
		};
		signal.upgrade().is_some_and(|signal| signal.state.lock().subscribers.contains(*key))
	}
}

impl<M> fmt::Debug for SignalConnection<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SignalConnection").field("key", &self.slot.as_ref().map(|(key, _)| *key)).finish()
	}
}
