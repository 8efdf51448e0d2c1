//! Classification of paths and descriptor links into the storage area.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConfigError;

/// Lowest descriptor number the asynchronous backend hands out.
pub const DEFAULT_MIN_FD: i32 = 4097;

static FD_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^/*proc/+self/+fd/+([0-9]+)$").expect("valid fd link pattern"));

/// The directory tree served by the asynchronous backend.
#[derive(Debug, Clone)]
pub struct StorageArea {
	folder: String,
	min_fd: i32,
	pattern: Regex,
}

impl StorageArea {
	/// Builds the area rooted at `/<folder>`.
	pub fn new(folder: &str, min_fd: i32) -> Result<Self, ConfigError> {
		if folder.is_empty() || folder.contains('/') {
			return Err(ConfigError::InvalidFolder(folder.to_string()));
		}
		let pattern = Regex::new(&format!("^/*{}(/*$|/+.*)$", regex::escape(folder)))?;
		Ok(Self {
			folder: folder.to_string(),
			min_fd,
			pattern,
		})
	}

	/// Folder name, without slashes.
	pub fn folder(&self) -> &str {
		&self.folder
	}

	/// Lowest descriptor belonging to the area.
	pub fn min_fd(&self) -> i32 {
		self.min_fd
	}

	/// Returns `true` for the folder itself and anything below it.
	pub fn contains(&self, path: &str) -> bool {
		self.pattern.is_match(path)
	}

	/// Returns `true` for `/proc/self/fd/N` when `N` is an area descriptor.
	pub fn is_fd_link(&self, path: &str) -> bool {
		FD_LINK
			.captures(path)
			.and_then(|caps| caps[1].parse::<i64>().ok())
			.is_some_and(|fd| fd >= i64::from(self.min_fd))
	}
}
