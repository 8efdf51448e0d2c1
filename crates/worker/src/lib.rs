//! Blocking-to-asynchronous bridge.
//!
//! Lets code written against a blocking API run on top of operations that
//! only exist in callback-driven asynchronous form. A [`Bridge`] owns one
//! worker thread with its own executor:
//! * [`Bridge::invoke`]: blocks the calling thread while a [`Task`] runs on the worker
//! * [`CompletionHandle`]: single-use signal a task raises when its work is done
//! * [`envelope`]: adapts a callback-style primitive into a task plus a [`ResultSlot`]
//! * [`Bridge::call`]: `envelope` + `invoke` in one step
//!
//! At most one task is in flight at any time, however many threads call in.

#![warn(missing_docs)]

use std::any::Any;

pub mod bridge;
pub mod completion;
pub mod config;
pub mod envelope;
pub mod error;
pub mod runtime;
pub mod task;

pub use bridge::{BootstrapHook, BootstrapResult, Bridge, BridgeBuilder};
pub use completion::{Completion, CompletionHandle};
pub use config::BridgeConfig;
pub use envelope::{Callback, ResultSlot, envelope};
pub use error::{BridgeError, Result};
pub use runtime::WorkerState;
pub use task::Task;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(msg) = payload.downcast_ref::<&'static str>() {
		return (*msg).to_string();
	}
	if let Some(msg) = payload.downcast_ref::<String>() {
		return msg.clone();
	}
	"non-string panic payload".to_string()
}

#[cfg(test)]
mod panic_tests;
