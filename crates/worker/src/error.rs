//! Error types for the bridge.

use thiserror::Error;

/// Failures reported by [`Bridge::invoke`](crate::Bridge::invoke).
///
/// None of these describe the proxied work itself: results of the work travel
/// through the task's own output slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
	/// The worker thread could not be started.
	#[error("failed to spawn bridge worker thread: {0}")]
	Spawn(String),

	/// The bridge was shut down, or its worker exited.
	#[error("bridge worker has stopped")]
	Stopped,

	/// One-time backend initialization failed; the bridge refuses further work.
	#[error("bridge unusable: backend initialization failed: {0}")]
	Unusable(String),

	/// Every clone of the completion handle was dropped without completing.
	#[error("task {task_id} dropped its completion handle without completing")]
	Abandoned {
		/// Sequence number of the offending task.
		task_id: u64,
	},

	/// The task body panicked on the worker thread.
	#[error("task panicked on the bridge worker: {0}")]
	TaskPanicked(String),

	/// `invoke` was called from the worker thread, which can never make progress.
	#[error("invoke called from the bridge worker thread")]
	Reentrant,

	/// A blocking bridge call was made from inside an async runtime.
	#[error("blocking bridge call made from inside an async runtime")]
	AsyncContext,

	/// The completion handle fired but the task left no result in its slot.
	#[error("task completed without producing a result")]
	MissingResult,
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
