//! Preload packages: host directory trees copied into the storage area.

use std::path::Path;

use crate::errno::{Errno, SysResult};

/// One regular file of a package, addressed relative to the package root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
	/// `/`-separated path below the package root.
	pub path: String,
	pub data: Vec<u8>,
}

/// Files to install below the storage area, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
	pub name: String,
	pub files: Vec<PackageFile>,
}

impl Package {
	/// Reads every regular file below `root` on the host filesystem.
	pub fn from_dir(root: &Path) -> SysResult<Self> {
		let name = root
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_default();
		let mut files = Vec::new();
		collect(root, "", &mut files)?;
		files.sort_by(|a, b| a.path.cmp(&b.path));
		tracing::debug!(package = %name, files = files.len(), "fs.package.read");
		Ok(Self { name, files })
	}

	/// Total payload size in bytes.
	pub fn size(&self) -> usize {
		self.files.iter().map(|file| file.data.len()).sum()
	}
}

fn collect(dir: &Path, prefix: &str, files: &mut Vec<PackageFile>) -> SysResult<()> {
	for entry in std::fs::read_dir(dir).map_err(io_errno)? {
		let entry = entry.map_err(io_errno)?;
		let name = entry.file_name().to_string_lossy().into_owned();
		let path = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
		let kind = entry.file_type().map_err(io_errno)?;
		if kind.is_dir() {
			collect(&entry.path(), &path, files)?;
		} else if kind.is_file() {
			let data = std::fs::read(entry.path()).map_err(io_errno)?;
			files.push(PackageFile { path, data });
		}
	}
	Ok(())
}

fn io_errno(error: std::io::Error) -> Errno {
	error.raw_os_error().map_or(Errno::EIO, Errno)
}
