//! Tasks: the unit of work a bridge carries.

use std::fmt;
use std::future::Future;

use crate::completion::CompletionHandle;

type TaskBody = Box<dyn FnOnce(CompletionHandle) + Send + 'static>;

/// One unit of work submitted through [`Bridge::invoke`](crate::Bridge::invoke).
///
/// The body runs once on the worker thread, inside the worker's tokio
/// runtime, and receives the completion handle for this submission. It may
/// complete the handle before returning, or hand it to asynchronous work that
/// completes it later from any thread.
///
/// # Contract
///
/// Every task must eventually complete its handle exactly once, on every path,
/// including failure paths of the work it starts. A body that neither
/// completes nor drops its handle hangs the bridge.
///
/// A task must not call [`Bridge::invoke`](crate::Bridge::invoke) on its own
/// bridge and wait for the result before completing: only one task is ever in
/// flight, so the nested call can never be served.
pub struct Task {
	label: &'static str,
	body: TaskBody,
}

impl Task {
	/// Wraps a closure receiving the completion handle.
	pub fn new(body: impl FnOnce(CompletionHandle) + Send + 'static) -> Self {
		Self::labeled("task", body)
	}

	/// Like [`Self::new`], with a label used in worker logs.
	pub fn labeled(label: &'static str, body: impl FnOnce(CompletionHandle) + Send + 'static) -> Self {
		Self {
			label,
			body: Box::new(body),
		}
	}

	/// Runs `fut` on the worker executor and completes when it resolves.
	pub fn from_future<F>(fut: F) -> Self
	where
		F: Future<Output = ()> + Send + 'static,
	{
		Self::labeled("future", move |done| {
			tokio::spawn(async move {
				fut.await;
				done.complete();
			});
		})
	}

	/// Log label of this task.
	pub fn label(&self) -> &'static str {
		self.label
	}

	/// Invokes the body with `done`.
	pub fn run(self, done: CompletionHandle) {
		(self.body)(done);
	}
}

impl fmt::Debug for Task {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Task").field("label", &self.label).finish_non_exhaustive()
	}
}
