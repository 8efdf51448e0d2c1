//! Completion handles: the signal a task raises once its work is done.
//!
//! A [`CompletionHandle`] is cheap to clone so it can be parked inside host
//! callbacks, timers or other threads. Only the first [`complete`] counts. A
//! second call is a contract violation: it trips a debug assertion and is
//! logged and ignored in release builds.
//!
//! [`complete`]: CompletionHandle::complete

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::BridgeError;

struct HandleInner {
	task_id: u64,
	consumed: AtomicBool,
	signal: Mutex<Option<oneshot::Sender<()>>>,
}

/// Single-use completion signal issued to exactly one task.
#[derive(Clone)]
pub struct CompletionHandle {
	inner: Arc<HandleInner>,
}

impl CompletionHandle {
	/// Creates a handle and the worker-side future that observes it.
	pub(crate) fn pair(task_id: u64) -> (Self, Completion) {
		let (tx, rx) = oneshot::channel();
		let handle = Self {
			inner: Arc::new(HandleInner {
				task_id,
				consumed: AtomicBool::new(false),
				signal: Mutex::new(Some(tx)),
			}),
		};
		(handle, Completion { task_id, rx })
	}

	/// Sequence number of the task this handle belongs to.
	pub fn task_id(&self) -> u64 {
		self.inner.task_id
	}

	/// Returns `true` once [`Self::complete`] has been called.
	pub fn is_consumed(&self) -> bool {
		self.inner.consumed.load(Ordering::Acquire)
	}

	/// Signals that the task is done.
	///
	/// Everything the task wrote before this call is visible to the thread
	/// blocked in [`Bridge::invoke`](crate::Bridge::invoke) once it returns.
	/// Safe to call from any thread, including from inside the worker's
	/// executor. The worker resumes on its own stack, never on the caller's.
	pub fn complete(&self) {
		let task_id = self.inner.task_id;
		if self.inner.consumed.swap(true, Ordering::AcqRel) {
			tracing::error!(task_id, "worker.completion.double_complete");
			debug_assert!(false, "completion handle for task {task_id} invoked more than once");
			return;
		}
		tracing::trace!(task_id, "worker.completion.complete");
		if let Some(tx) = self.inner.signal.lock().take() {
			// The receiver is gone only if the worker itself is being torn down.
			let _ = tx.send(());
		}
	}
}

impl fmt::Debug for CompletionHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("CompletionHandle")
			.field("task_id", &self.inner.task_id)
			.field("consumed", &self.is_consumed())
			.finish()
	}
}

/// Worker-side view of a [`CompletionHandle`].
///
/// Resolves when the handle is completed, or with
/// [`BridgeError::Abandoned`] when every clone was dropped first.
#[derive(Debug)]
pub struct Completion {
	task_id: u64,
	rx: oneshot::Receiver<()>,
}

impl Future for Completion {
	type Output = Result<(), BridgeError>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		let task_id = self.task_id;
		Pin::new(&mut self.rx)
			.poll(cx)
			.map(move |res| res.map_err(|_| BridgeError::Abandoned { task_id }))
	}
}

#[cfg(test)]
mod tests;
