//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! [storage]
//! folder = "persistent"
//! min_fd = 4097
//!
//! [worker]
//! thread_name = "threadfs-worker"
//!
//! [backend]
//! latency_ms = 0
//! ```
//!
//! Every key is optional.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use threadfs_worker::BridgeConfig;
use threadfs_worker::config::{DEFAULT_STORAGE, DEFAULT_THREAD_NAME};

use crate::error::{ConfigError, Result};
use crate::path::{DEFAULT_MIN_FD, StorageArea};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	pub storage: StorageSection,
	pub worker: WorkerSection,
	pub backend: BackendSection,
}

/// `[storage]`: which paths and descriptors belong to the asynchronous backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
	pub folder: String,
	pub min_fd: i32,
}

impl Default for StorageSection {
	fn default() -> Self {
		Self {
			folder: DEFAULT_STORAGE.to_string(),
			min_fd: DEFAULT_MIN_FD,
		}
	}
}

/// `[worker]`: the bridge worker thread.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkerSection {
	pub thread_name: String,
}

impl Default for WorkerSection {
	fn default() -> Self {
		Self {
			thread_name: DEFAULT_THREAD_NAME.to_string(),
		}
	}
}

/// `[backend]`: the in-memory asynchronous backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendSection {
	/// Artificial delay before each request completes.
	pub latency_ms: u64,
}

impl Config {
	/// Parses and validates a TOML document.
	pub fn from_toml(source: &str) -> Result<Self> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses the file at `path`.
	pub fn load(path: &Path) -> Result<Self> {
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		tracing::debug!(path = %path.display(), "fs.config.load");
		Self::from_toml(&source)
	}

	/// Checks values serde cannot.
	pub fn validate(&self) -> Result<()> {
		if self.storage.min_fd <= 2 {
			return Err(ConfigError::InvalidMinFd(self.storage.min_fd));
		}
		self.storage_area().map(drop)
	}

	/// Classifier for the configured storage area.
	pub fn storage_area(&self) -> Result<StorageArea> {
		StorageArea::new(&self.storage.folder, self.storage.min_fd)
	}

	/// Bridge settings derived from this configuration.
	pub fn bridge_config(&self) -> BridgeConfig {
		BridgeConfig::default()
			.thread_name(self.worker.thread_name.clone())
			.storage(self.storage.folder.clone())
	}

	/// Backend latency as a duration.
	pub fn latency(&self) -> Duration {
		Duration::from_millis(self.backend.latency_ms)
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_uses_defaults() {
		let config = Config::from_toml("").expect("config");
		assert_eq!(config, Config::default());
		assert_eq!(config.storage.folder, "persistent");
		assert_eq!(config.storage.min_fd, 4097);
		assert_eq!(config.latency(), Duration::ZERO);
	}

	#[test]
	fn sections_override_defaults() {
		let config = Config::from_toml(
			r#"
			[storage]
			folder = "opfs"

			[worker]
			thread_name = "io"

			[backend]
			latency_ms = 25
			"#,
		)
		.expect("config");
		assert_eq!(config.storage.folder, "opfs");
		assert_eq!(config.storage.min_fd, 4097);
		assert_eq!(config.latency(), Duration::from_millis(25));

		let bridge = config.bridge_config();
		assert_eq!(bridge.thread_name, "io");
		assert_eq!(bridge.storage, "opfs");
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let err = Config::from_toml("[storage]\nfolders = \"x\"\n").unwrap_err();
		assert!(matches!(err, ConfigError::Toml(_)), "got {err:?}");
	}

	#[test]
	fn invalid_values_are_rejected() {
		assert!(matches!(
			Config::from_toml("[storage]\nmin_fd = 1\n"),
			Err(ConfigError::InvalidMinFd(1))
		));
		assert!(matches!(
			Config::from_toml("[storage]\nfolder = \"a/b\"\n"),
			Err(ConfigError::InvalidFolder(_))
		));
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().expect("tempfile");
		writeln!(file, "[backend]\nlatency_ms = 3").expect("write");
		let config = Config::load(file.path()).expect("config");
		assert_eq!(config.backend.latency_ms, 3);
	}

	#[test]
	fn load_reports_missing_file() {
		let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }), "got {err:?}");
	}
}
