//! Ambient values handed to loaded modules.
//!
//! The engine never reads these; they exist for the loader, which reaches
//! them through the [`Environment`](crate::Environment) it is given.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Value stored in an [`InjectionTable`].
pub type InjectedValue = Arc<dyn Any + Send + Sync>;

/// Snapshot of injected globals, keyed by name.
#[derive(Clone, Default)]
pub struct InjectionTable {
	values: HashMap<String, InjectedValue>,
}

impl InjectionTable {
	/// Returns the value under `key` if it holds a `T`.
	pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
		self.values.get(key)?.downcast_ref::<T>()
	}

	/// Returns the untyped value under `key`.
	pub fn get_raw(&self, key: &str) -> Option<&InjectedValue> {
		self.values.get(key)
	}

	pub fn contains(&self, key: &str) -> bool {
		self.values.contains_key(key)
	}

	pub fn keys(&self) -> impl Iterator<Item = &str> {
		self.values.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

impl std::fmt::Debug for InjectionTable {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mut keys: Vec<_> = self.keys().collect();
		keys.sort_unstable();
		f.debug_struct("InjectionTable").field("keys", &keys).finish()
	}
}

/// Lazily created injection table.
#[derive(Debug, Default)]
pub(crate) struct InjectionSlot {
	table: Mutex<Option<InjectionTable>>,
}

impl InjectionSlot {
	pub(crate) fn enable(&self) {
		self.table.lock().get_or_insert_with(InjectionTable::default);
	}

	/// Inserts `value`, enabling the table first if needed.
	pub(crate) fn inject(&self, key: String, value: InjectedValue) {
		let mut table = self.table.lock();
		table.get_or_insert_with(InjectionTable::default).values.insert(key, value);
	}

	pub(crate) fn snapshot(&self) -> Option<InjectionTable> {
		self.table.lock().clone()
	}
}

/// Type-keyed scratch space shared by every module loaded in one environment.
#[derive(Default)]
pub struct SharedState {
	slots: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl SharedState {
	/// Stores `value`, returning the previous `T` if there was one.
	pub fn insert<T: Any + Send + Sync>(&self, value: T) -> Option<Arc<T>> {
		let previous = self.slots.write().insert(TypeId::of::<T>(), Arc::new(value));
		previous.and_then(|prev| prev.downcast::<T>().ok())
	}

	pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		let slot = self.slots.read().get(&TypeId::of::<T>()).cloned()?;
		slot.downcast::<T>().ok()
	}

	/// Returns the stored `T`, creating it with `init` on first use.
	pub fn get_or_insert_with<T: Any + Send + Sync>(&self, init: impl FnOnce() -> T) -> Arc<T> {
		if let Some(existing) = self.get::<T>() {
			return existing;
		}
		let mut slots = self.slots.write();
		// Another thread may have filled the slot between the read and the write lock.
		if let Some(existing) = slots.get(&TypeId::of::<T>()).and_then(|slot| Arc::clone(slot).downcast::<T>().ok()) {
			return existing;
		}
		let value = Arc::new(init());
		slots.insert(TypeId::of::<T>(), value.clone());
		value
	}

	pub fn remove<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
		let removed = self.slots.write().remove(&TypeId::of::<T>())?;
		removed.downcast::<T>().ok()
	}

	pub fn contains<T: Any + Send + Sync>(&self) -> bool {
		self.slots.read().contains_key(&TypeId::of::<T>())
	}
}

impl std::fmt::Debug for SharedState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SharedState").field("slots", &self.slots.read().len()).finish()
	}
}
