//! The worker execution context.
//!
//! One named OS thread drives a current-thread tokio runtime inside a
//! [`LocalSet`]. The worker pulls one [`Submission`] at a time from a
//! single-slot inbox, runs the task body, then awaits the task's
//! [`Completion`]. While it waits the executor keeps running whatever the task
//! started, so the thread never blocks between an asynchronous operation and
//! its completion.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;

use crate::completion::CompletionHandle;
use crate::error::{BridgeError, Result};
use crate::panic_message;
use crate::task::Task;

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
	/// Idle, waiting for the next task.
	Waiting,
	/// A task has been handed out and has not completed yet.
	Running,
	/// The worker loop has exited for good.
	Stopped,
}

impl WorkerState {
	const fn from_u8(raw: u8) -> Self {
		match raw {
			0 => Self::Waiting,
			1 => Self::Running,
			_ => Self::Stopped,
		}
	}

	const fn as_u8(self) -> u8 {
		match self {
			Self::Waiting => 0,
			Self::Running => 1,
			Self::Stopped => 2,
		}
	}
}

/// State shared between the bridge and its worker thread.
#[derive(Debug, Default)]
pub(crate) struct WorkerShared {
	state: AtomicU8,
	shutdown: AtomicBool,
	completed: AtomicU64,
}

impl WorkerShared {
	pub(crate) fn state(&self) -> WorkerState {
		WorkerState::from_u8(self.state.load(Ordering::Acquire))
	}

	fn set_state(&self, state: WorkerState) {
		self.state.store(state.as_u8(), Ordering::Release);
	}

	pub(crate) fn request_shutdown(&self) {
		self.shutdown.store(true, Ordering::Release);
	}

	fn shutdown_requested(&self) -> bool {
		self.shutdown.load(Ordering::Acquire)
	}

	pub(crate) fn completed(&self) -> u64 {
		self.completed.load(Ordering::Acquire)
	}
}

/// One task handed to the worker, plus the channel its outcome goes back on.
pub(crate) struct Submission {
	pub(crate) id: u64,
	pub(crate) task: Task,
	/// Bootstrap and shutdown tasks do not count towards [`WorkerShared::completed`].
	pub(crate) internal: bool,
	pub(crate) reply: oneshot::Sender<Result<()>>,
}

/// Starts the worker thread. It reaches its waiting state on its own.
pub(crate) fn spawn_worker(name: &str, shared: Arc<WorkerShared>) -> Result<(mpsc::Sender<Submission>, JoinHandle<()>)> {
	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.map_err(|err| BridgeError::Spawn(err.to_string()))?;
	let (inbox_tx, inbox_rx) = mpsc::channel(1);

	tracing::debug!(thread = name, "worker.bridge.spawn_thread");
	let handle = std::thread::Builder::new()
		.name(name.to_string())
		.spawn(move || {
			let local = LocalSet::new();
			local.block_on(&runtime, worker_loop(inbox_rx, shared));
		})
		.map_err(|err| BridgeError::Spawn(err.to_string()))?;

	Ok((inbox_tx, handle))
}

async fn worker_loop(mut inbox: mpsc::Receiver<Submission>, shared: Arc<WorkerShared>) {
	loop {
		if shared.shutdown_requested() {
			break;
		}
		shared.set_state(WorkerState::Waiting);
		let Some(Submission { id, task, internal, reply }) = inbox.recv().await else {
			tracing::debug!("worker.bridge.inbox_closed");
			break;
		};

		shared.set_state(WorkerState::Running);
		tracing::trace!(task_id = id, task = task.label(), "worker.bridge.run");
		let outcome = run_task(id, task).await;
		if outcome.is_ok() && !internal {
			shared.completed.fetch_add(1, Ordering::AcqRel);
		}
		shared.set_state(WorkerState::Waiting);

		// The caller only disappears if its thread died while blocked.
		let _ = reply.send(outcome);
	}
	shared.set_state(WorkerState::Stopped);
	tracing::debug!(completed = shared.completed(), "worker.bridge.stopped");
}

async fn run_task(id: u64, task: Task) -> Result<()> {
	let (handle, completion) = CompletionHandle::pair(id);
	let panicked = catch_unwind(AssertUnwindSafe(|| task.run(handle)))
		.err()
		.map(|payload| panic_message(payload.as_ref()));

	// Work the body started before panicking may still hold a handle clone.
	let outcome = completion.await;
	if let Some(message) = panicked {
		tracing::error!(task_id = id, %message, "worker.bridge.task_panicked");
		return Err(BridgeError::TaskPanicked(message));
	}
	outcome.inspect_err(|err| {
		tracing::error!(task_id = id, %err, "worker.bridge.task_abandoned");
	})
}
