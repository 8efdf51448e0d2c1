//! Adapter between callback-style asynchronous primitives and bridge tasks.
//!
//! An asynchronous primitive takes its arguments plus one [`Callback`],
//! returns immediately, and later calls the callback exactly once with its
//! result. [`envelope`] turns such a primitive into a [`Task`] whose callback
//! stores the result in a [`ResultSlot`] and then completes the bridge
//! handle, so one bridge can carry any number of distinct primitives.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::task::Task;

/// Move-only completion callback handed to an asynchronous primitive.
pub struct Callback<T> {
	f: Box<dyn FnOnce(T) + Send + 'static>,
}

impl<T> Callback<T> {
	/// Wraps `f`.
	pub fn new(f: impl FnOnce(T) + Send + 'static) -> Self {
		Self { f: Box::new(f) }
	}

	/// Delivers the primitive's result.
	pub fn call(self, value: T) {
		(self.f)(value);
	}
}

impl<T> fmt::Debug for Callback<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Callback")
	}
}

/// Caller-visible output slot written by a task before it completes.
pub struct ResultSlot<T> {
	inner: Arc<Mutex<Option<T>>>,
}

impl<T> Clone for ResultSlot<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T> Default for ResultSlot<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> ResultSlot<T> {
	/// Creates an empty slot.
	pub fn new() -> Self {
		Self {
			inner: Arc::new(Mutex::new(None)),
		}
	}

	/// Stores `value`, returning whatever was there before.
	pub fn put(&self, value: T) -> Option<T> {
		self.inner.lock().replace(value)
	}

	/// Takes the stored value out of the slot.
	pub fn take(&self) -> Option<T> {
		self.inner.lock().take()
	}

	/// Returns `true` if a value is stored.
	pub fn is_filled(&self) -> bool {
		self.inner.lock().is_some()
	}
}

impl<T> fmt::Debug for ResultSlot<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResultSlot").field("filled", &self.is_filled()).finish()
	}
}

/// Wraps a callback-style primitive into a task plus the slot it reports into.
pub fn envelope<T, P>(primitive: P) -> (Task, ResultSlot<T>)
where
	T: Send + 'static,
	P: FnOnce(Callback<T>) + Send + 'static,
{
	let slot = ResultSlot::new();
	let out = slot.clone();
	let task = Task::labeled("envelope", move |done| {
		primitive(Callback::new(move |value| {
			out.put(value);
			done.complete();
		}));
	});
	(task, slot)
}
