//! The bridge coordinator.
//!
//! Callers on any number of threads call [`Bridge::invoke`] and block. A
//! submission lock admits one call at a time; the task travels to the worker
//! through a single-slot inbox and the caller sleeps on a oneshot until the
//! worker reports that the task's completion handle fired.
//!
//! The very first call runs the bootstrap hook before the caller's own task,
//! still under the submission lock, so racing first callers all observe a
//! finished bootstrap. A failed bootstrap leaves the bridge permanently
//! unusable.

use std::fmt;
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::config::BridgeConfig;
use crate::envelope::{Callback, envelope};
use crate::error::{BridgeError, Result};
use crate::panic_message;
use crate::runtime::{Submission, WorkerShared, WorkerState, spawn_worker};
use crate::task::Task;

/// Result reported by a bootstrap hook.
pub type BootstrapResult = std::result::Result<(), String>;

/// One-time backend initialization, run before the first task.
///
/// Receives the configured storage-area identifier and a callback that must be
/// called exactly once, possibly after asynchronous work on the worker.
pub type BootstrapHook = Box<dyn FnOnce(&str, Callback<BootstrapResult>) + Send + 'static>;

enum BootState {
	Pending(BootstrapHook),
	Ready,
	Failed(String),
}

struct Submitter {
	boot: BootState,
	next_id: u64,
}

impl Submitter {
	fn next_id(&mut self) -> u64 {
		self.next_id = self.next_id.wrapping_add(1);
		self.next_id
	}
}

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
	config: BridgeConfig,
	bootstrap: BootstrapHook,
}

impl Default for BridgeBuilder {
	fn default() -> Self {
		Self {
			config: BridgeConfig::default(),
			bootstrap: Box::new(|_storage, done| done.call(Ok(()))),
		}
	}
}

impl BridgeBuilder {
	/// Replaces the configuration.
	#[must_use]
	pub fn config(mut self, config: BridgeConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets the one-time bootstrap hook.
	#[must_use]
	pub fn bootstrap(mut self, hook: impl FnOnce(&str, Callback<BootstrapResult>) + Send + 'static) -> Self {
		self.bootstrap = Box::new(hook);
		self
	}

	/// Spawns the worker thread and returns the bridge.
	pub fn build(self) -> Result<Bridge> {
		let shared = Arc::new(WorkerShared::default());
		let (inbox, worker) = spawn_worker(&self.config.thread_name, Arc::clone(&shared))?;
		let worker_id = worker.thread().id();
		Ok(Bridge {
			config: self.config,
			submit: Mutex::new(Submitter {
				boot: BootState::Pending(self.bootstrap),
				next_id: 0,
			}),
			inbox,
			shared,
			worker: Mutex::new(Some(worker)),
			worker_id,
		})
	}
}

/// Runs tasks on a dedicated worker and blocks callers until they complete.
///
/// Construct one per process (or per storage backend) and share it, usually
/// behind an [`Arc`]. Dropping the bridge shuts the worker down and joins it.
///
/// `invoke` blocks the calling thread. From inside an async runtime it returns
/// [`BridgeError::AsyncContext`]; from the worker itself,
/// [`BridgeError::Reentrant`]. Dropping the bridge inside a runtime cannot join
/// the worker: the worker is detached and exits once it sees its inbox close.
pub struct Bridge {
	config: BridgeConfig,
	submit: Mutex<Submitter>,
	inbox: mpsc::Sender<Submission>,
	shared: Arc<WorkerShared>,
	worker: Mutex<Option<JoinHandle<()>>>,
	worker_id: ThreadId,
}

impl Bridge {
	/// Returns a builder with default configuration and a no-op bootstrap.
	pub fn builder() -> BridgeBuilder {
		BridgeBuilder::default()
	}

	/// Builds a bridge from `config` with a no-op bootstrap.
	pub fn new(config: BridgeConfig) -> Result<Self> {
		Self::builder().config(config).build()
	}

	/// Runs `task` on the worker and blocks until its completion handle fires.
	///
	/// Calls from different threads are totally ordered; task N+1 starts only
	/// after task N completed. Everything the task wrote before completing is
	/// visible once this returns.
	pub fn invoke(&self, task: Task) -> Result<()> {
		self.ensure_caller()?;
		let mut submitter = self.submit.lock();
		if self.worker.lock().is_none() {
			return Err(BridgeError::Stopped);
		}
		self.ensure_bootstrapped(&mut submitter)?;
		let id = submitter.next_id();
		tracing::trace!(task_id = id, task = task.label(), "worker.bridge.invoke");
		self.dispatch(id, task, false)
	}

	/// Bridges one callback-style primitive and returns the value it reported.
	pub fn call<T, P>(&self, primitive: P) -> Result<T>
	where
		T: Send + 'static,
		P: FnOnce(Callback<T>) + Send + 'static,
	{
		let (task, slot) = envelope(primitive);
		self.invoke(task)?;
		slot.take().ok_or(BridgeError::MissingResult)
	}

	/// Stops the worker and joins its thread. Later calls are no-ops.
	pub fn shutdown(&self) -> Result<()> {
		self.ensure_caller()?;
		let mut submitter = self.submit.lock();
		let Some(worker) = self.worker.lock().take() else {
			return Ok(());
		};

		let shared = Arc::clone(&self.shared);
		let stop = Task::labeled("shutdown", move |done| {
			shared.request_shutdown();
			done.complete();
		});
		let id = submitter.next_id();
		let sent = self.dispatch(id, stop, true);
		let joined = worker.join();
		tracing::debug!(completed = self.shared.completed(), "worker.bridge.shutdown");

		if let Err(payload) = joined {
			return Err(BridgeError::TaskPanicked(panic_message(payload.as_ref())));
		}
		match sent {
			Ok(()) | Err(BridgeError::Stopped) => Ok(()),
			Err(err) => Err(err),
		}
	}

	/// Current worker state.
	pub fn state(&self) -> WorkerState {
		self.shared.state()
	}

	/// Number of caller tasks that completed successfully.
	pub fn completed(&self) -> u64 {
		self.shared.completed()
	}

	/// Configuration the bridge was built with.
	pub fn config(&self) -> &BridgeConfig {
		&self.config
	}

	fn ensure_caller(&self) -> Result<()> {
		if std::thread::current().id() == self.worker_id {
			tracing::warn!("worker.bridge.reentrant_invoke");
			return Err(BridgeError::Reentrant);
		}
		if tokio::runtime::Handle::try_current().is_ok() {
			tracing::warn!("worker.bridge.async_context");
			return Err(BridgeError::AsyncContext);
		}
		Ok(())
	}

	fn ensure_bootstrapped(&self, submitter: &mut Submitter) -> Result<()> {
		let interrupted = BootState::Failed("bootstrap interrupted".to_string());
		let hook = match std::mem::replace(&mut submitter.boot, interrupted) {
			BootState::Ready => {
				submitter.boot = BootState::Ready;
				return Ok(());
			}
			BootState::Failed(reason) => {
				submitter.boot = BootState::Failed(reason.clone());
				return Err(BridgeError::Unusable(reason));
			}
			BootState::Pending(hook) => hook,
		};

		let storage = self.config.storage.clone();
		tracing::debug!(storage = %storage, "worker.bridge.bootstrap");
		let (task, slot) = envelope(move |done: Callback<BootstrapResult>| hook(storage.as_str(), done));
		let id = submitter.next_id();
		let outcome = match self.dispatch(id, task, true) {
			Ok(()) => slot.take().unwrap_or_else(|| Err(BridgeError::MissingResult.to_string())),
			Err(err) => Err(err.to_string()),
		};

		match outcome {
			Ok(()) => {
				submitter.boot = BootState::Ready;
				Ok(())
			}
			Err(reason) => {
				tracing::error!(%reason, "worker.bridge.bootstrap_failed");
				submitter.boot = BootState::Failed(reason.clone());
				Err(BridgeError::Unusable(reason))
			}
		}
	}

	fn dispatch(&self, id: u64, task: Task, internal: bool) -> Result<()> {
		let (reply, outcome) = oneshot::channel();
		self.inbox
			.blocking_send(Submission { id, task, internal, reply })
			.map_err(|_| BridgeError::Stopped)?;
		outcome.blocking_recv().map_err(|_| BridgeError::Stopped)?
	}
}

impl Drop for Bridge {
	fn drop(&mut self) {
		if let Err(err) = self.shutdown() {
			tracing::warn!(%err, "worker.bridge.shutdown_failed");
		}
	}
}

impl fmt::Debug for Bridge {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Bridge")
			.field("config", &self.config)
			.field("state", &self.state())
			.field("completed", &self.completed())
			.finish_non_exhaustive()
	}
}
