//! Blocking filesystem surface that splits traffic between two backends.
//!
//! Paths inside the storage area, descriptors it handed out, and
//! `/proc/self/fd/N` links to those descriptors are carried across the
//! [`Bridge`] to the asynchronous backend. Everything else goes straight to
//! the conventional backend on the calling thread.

use std::path::Path;
use std::sync::Arc;

use threadfs_worker::{Bridge, Callback};

use crate::backend::{AsyncFs, SyncFs};
use crate::config::Config;
use crate::deferred::DeferredFs;
use crate::descriptors::DescriptorTable;
use crate::errno::{Errno, SysResult};
use crate::error::ProxyError;
use crate::memfs::MemFs;
use crate::package::Package;
use crate::path::StorageArea;
use crate::request::{FsReply, FsRequest, Target};
use crate::types::{AccessMode, DirEntry, Fd, FileStat, FileTimes, OpenFlags, Whence};

/// Where a request is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
	/// Across the bridge, on the asynchronous backend.
	Bridged,
	/// In place, on the conventional backend.
	Conventional,
}

/// Routes blocking filesystem calls to an [`AsyncFs`] or a [`SyncFs`].
pub struct FsProxy<A: AsyncFs, S: SyncFs> {
	bridge: Bridge,
	backend: Arc<A>,
	conventional: S,
	area: StorageArea,
	descriptors: Arc<DescriptorTable>,
}

impl FsProxy<DeferredFs, MemFs> {
	/// Proxy over the in-memory backends, shaped by `config`.
	pub fn in_memory(config: &Config) -> Result<Self, ProxyError> {
		let backend = DeferredFs::new(config.storage.min_fd).with_latency(config.latency());
		Self::new(config, backend, MemFs::default())
	}
}

impl<A: AsyncFs, S: SyncFs> FsProxy<A, S> {
	/// Starts the bridge worker. The backend is initialised lazily, on the
	/// first bridged request.
	pub fn new(config: &Config, backend: A, conventional: S) -> Result<Self, ProxyError> {
		config.validate()?;
		let area = config.storage_area()?;
		let backend = Arc::new(backend);

		let init = Arc::clone(&backend);
		let bridge = Bridge::builder()
			.config(config.bridge_config())
			.bootstrap(move |storage, done| {
				init.init(
					storage,
					Callback::new(move |result: SysResult<()>| done.call(result.map_err(|errno| errno.to_string()))),
				);
			})
			.build()?;

		Ok(Self {
			bridge,
			backend,
			conventional,
			area,
			descriptors: Arc::new(DescriptorTable::new()),
		})
	}

	pub fn bridge(&self) -> &Bridge {
		&self.bridge
	}

	pub fn backend(&self) -> &Arc<A> {
		&self.backend
	}

	pub fn conventional(&self) -> &S {
		&self.conventional
	}

	pub fn area(&self) -> &StorageArea {
		&self.area
	}

	/// Descriptors currently owned by the asynchronous backend.
	pub fn descriptors(&self) -> &DescriptorTable {
		&self.descriptors
	}

	/// Decides which backend serves `request`.
	///
	/// A rename with exactly one end in the storage area cannot be served by
	/// either backend and fails with `EXDEV`.
	pub fn route(&self, request: &FsRequest) -> SysResult<Route> {
		let bridged = match request.target() {
			Target::Path(path) => self.area.contains(path),
			Target::Descriptor(fd) => self.descriptors.contains(fd),
			Target::Link(path) => self.area.contains(path) || self.area.is_fd_link(path),
			Target::Pair { from, to } => match (self.area.contains(from), self.area.contains(to)) {
				(true, true) => true,
				(false, false) => false,
				_ => return Err(Errno::EXDEV),
			},
		};
		Ok(if bridged { Route::Bridged } else { Route::Conventional })
	}

	/// Executes `request` on whichever backend [`route`](Self::route) picks.
	pub fn execute(&self, request: FsRequest) -> SysResult<FsReply> {
		match self.route(&request)? {
			Route::Conventional => self.conventional.execute(request),
			Route::Bridged => self.bridged(request),
		}
	}

	/// Runs `request` on the asynchronous backend.
	///
	/// The descriptor table is updated from the backend's callback, before the
	/// bridge task completes, so no other bridged call can observe a descriptor
	/// the backend already reused or released.
	fn bridged(&self, request: FsRequest) -> SysResult<FsReply> {
		let op = request.name();
		let opening = matches!(request, FsRequest::Open { .. });
		let closing = match request {
			FsRequest::Close { fd } => Some(fd),
			_ => None,
		};
		let backend = Arc::clone(&self.backend);
		let descriptors = Arc::clone(&self.descriptors);
		self.bridge
			.call(move |done: Callback<SysResult<FsReply>>| {
				backend.submit(
					request,
					Callback::new(move |result: SysResult<FsReply>| {
						match (&result, closing) {
							(Ok(FsReply::Fd(fd)), _) if opening => {
								descriptors.insert(*fd);
							}
							(Ok(_), Some(fd)) => {
								descriptors.remove(fd);
							}
							_ => {}
						}
						done.call(result);
					}),
				);
			})
			.unwrap_or_else(|error| {
				tracing::error!(op, %error, "fs.proxy.bridge_failed");
				Err(Errno::EIO)
			})
	}

	/// Copies the host directory `dir` into the storage area through the
	/// bridge. Returns the number of files installed.
	pub fn load_package(&self, dir: &Path) -> SysResult<usize> {
		let package = Package::from_dir(dir)?;
		tracing::info!(package = %package.name, files = package.files.len(), bytes = package.size(), "fs.proxy.load_package");
		let storage = self.area.folder().to_string();
		let backend = Arc::clone(&self.backend);
		self.bridge
			.call(move |done| backend.load_package(&storage, package, done))
			.unwrap_or_else(|error| {
				tracing::error!(op = "load_package", %error, "fs.proxy.bridge_failed");
				Err(Errno::EIO)
			})
	}

	pub fn open(&self, path: &str, flags: OpenFlags, mode: u32) -> SysResult<Fd> {
		self.execute(FsRequest::Open {
			path: path.to_string(),
			flags,
			mode,
		})?
		.into_fd()
	}

	pub fn close(&self, fd: Fd) -> SysResult<()> {
		self.execute(FsRequest::Close { fd })?.into_unit()
	}

	/// Reads up to `buf.len()` bytes at the current offset.
	pub fn read(&self, fd: Fd, buf: &mut [u8]) -> SysResult<usize> {
		let data = self.execute(FsRequest::Read { fd, len: buf.len() })?.into_data()?;
		Ok(copy_into(&data, buf))
	}

	pub fn write(&self, fd: Fd, data: &[u8]) -> SysResult<usize> {
		self.execute(FsRequest::Write {
			fd,
			data: data.to_vec(),
		})?
		.into_count()
	}

	pub fn pread(&self, fd: Fd, buf: &mut [u8], offset: u64) -> SysResult<usize> {
		let data = self
			.execute(FsRequest::Pread {
				fd,
				len: buf.len(),
				offset,
			})?
			.into_data()?;
		Ok(copy_into(&data, buf))
	}

	pub fn pwrite(&self, fd: Fd, data: &[u8], offset: u64) -> SysResult<usize> {
		self.execute(FsRequest::Pwrite {
			fd,
			data: data.to_vec(),
			offset,
		})?
		.into_count()
	}

	/// Moves the file offset; returns the new absolute offset.
	pub fn seek(&self, fd: Fd, offset: i64, whence: Whence) -> SysResult<u64> {
		self.execute(FsRequest::Seek { fd, offset, whence })?.into_offset()
	}

	pub fn fsync(&self, fd: Fd) -> SysResult<()> {
		self.execute(FsRequest::Fsync { fd })?.into_unit()
	}

	pub fn stat(&self, path: &str) -> SysResult<FileStat> {
		self.execute(FsRequest::Stat { path: path.to_string() })?.into_stat()
	}

	pub fn fstat(&self, fd: Fd) -> SysResult<FileStat> {
		self.execute(FsRequest::Fstat { fd })?.into_stat()
	}

	pub fn access(&self, path: &str, mode: AccessMode) -> SysResult<()> {
		self.execute(FsRequest::Access {
			path: path.to_string(),
			mode,
		})?
		.into_unit()
	}

	pub fn unlink(&self, path: &str) -> SysResult<()> {
		self.execute(FsRequest::Unlink { path: path.to_string() })?.into_unit()
	}

	pub fn mkdir(&self, path: &str, mode: u32) -> SysResult<()> {
		self.execute(FsRequest::Mkdir {
			path: path.to_string(),
			mode,
		})?
		.into_unit()
	}

	pub fn rmdir(&self, path: &str) -> SysResult<()> {
		self.execute(FsRequest::Rmdir { path: path.to_string() })?.into_unit()
	}

	pub fn rename(&self, from: &str, to: &str) -> SysResult<()> {
		self.execute(FsRequest::Rename {
			from: from.to_string(),
			to: to.to_string(),
		})?
		.into_unit()
	}

	pub fn chmod(&self, path: &str, mode: u32) -> SysResult<()> {
		self.execute(FsRequest::Chmod {
			path: path.to_string(),
			mode,
		})?
		.into_unit()
	}

	pub fn fchmod(&self, fd: Fd, mode: u32) -> SysResult<()> {
		self.execute(FsRequest::Fchmod { fd, mode })?.into_unit()
	}

	pub fn truncate(&self, path: &str, len: u64) -> SysResult<()> {
		self.execute(FsRequest::Truncate {
			path: path.to_string(),
			len,
		})?
		.into_unit()
	}

	pub fn ftruncate(&self, fd: Fd, len: u64) -> SysResult<()> {
		self.execute(FsRequest::Ftruncate { fd, len })?.into_unit()
	}

	pub fn readlink(&self, path: &str) -> SysResult<String> {
		self.execute(FsRequest::Readlink { path: path.to_string() })?.into_link()
	}

	pub fn readdir(&self, fd: Fd) -> SysResult<Vec<DirEntry>> {
		self.execute(FsRequest::Readdir { fd })?.into_entries()
	}

	/// Sets access and modification times; `None` means now.
	pub fn utime(&self, path: &str, times: Option<FileTimes>) -> SysResult<()> {
		self.execute(FsRequest::Utime {
			path: path.to_string(),
			times,
		})?
		.into_unit()
	}

	pub fn fallocate(&self, fd: Fd, offset: u64, len: u64) -> SysResult<()> {
		self.execute(FsRequest::Fallocate { fd, offset, len })?.into_unit()
	}
}

impl<A: AsyncFs, S: SyncFs> std::fmt::Debug for FsProxy<A, S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FsProxy")
			.field("bridge", &self.bridge)
			.field("area", &self.area)
			.field("descriptors", &self.descriptors)
			.finish_non_exhaustive()
	}
}

fn copy_into(data: &[u8], buf: &mut [u8]) -> usize {
	let n = data.len().min(buf.len());
	buf[..n].copy_from_slice(&data[..n]);
	n
}
