//! Bridge configuration.

use serde::Deserialize;

/// Default name of the storage area handed to the bootstrap hook.
pub const DEFAULT_STORAGE: &str = "persistent";

/// Default name of the worker OS thread.
pub const DEFAULT_THREAD_NAME: &str = "threadfs-worker";

/// Construction parameters for a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
	/// Name given to the dedicated worker thread.
	pub thread_name: String,
	/// Storage-area identifier passed to the bootstrap hook.
	pub storage: String,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			thread_name: DEFAULT_THREAD_NAME.to_string(),
			storage: DEFAULT_STORAGE.to_string(),
		}
	}
}

impl BridgeConfig {
	/// Sets the worker thread name.
	#[must_use]
	pub fn thread_name(mut self, name: impl Into<String>) -> Self {
		self.thread_name = name.into();
		self
	}

	/// Sets the storage-area identifier.
	#[must_use]
	pub fn storage(mut self, storage: impl Into<String>) -> Self {
		self.storage = storage.into();
		self
	}
}
