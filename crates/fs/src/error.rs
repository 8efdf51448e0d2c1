//! Error types for configuration and proxy construction.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// The storage folder is empty or contains a slash.
	#[error("invalid storage folder: {0:?}")]
	InvalidFolder(String),

	/// The storage descriptor floor would collide with standard descriptors.
	#[error("invalid minimum descriptor {0} (expected > 2)")]
	InvalidMinFd(i32),

	/// The classification pattern could not be compiled.
	#[error("invalid storage pattern: {0}")]
	Pattern(#[from] regex::Error),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when constructing a proxy.
#[derive(Debug, Error)]
pub enum ProxyError {
	/// The configuration is invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The bridge worker could not be started.
	#[error("bridge: {0}")]
	Bridge(#[from] threadfs_worker::BridgeError),
}
