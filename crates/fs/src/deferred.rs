//! Callback-driven backend over [`MemFs`].
//!
//! Each request is executed against the shared in-memory tree, but its
//! callback only fires from a later tokio task, so callers never observe a
//! synchronous answer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use threadfs_worker::Callback;

use crate::backend::{AsyncFs, SyncFs};
use crate::errno::{Errno, SysResult};
use crate::memfs::MemFs;
use crate::package::Package;
use crate::request::{FsReply, FsRequest};
use crate::types::OpenFlags;

/// [`AsyncFs`] that answers from a spawned task after an optional delay.
#[derive(Debug)]
pub struct DeferredFs {
	fs: Arc<MemFs>,
	latency: Duration,
	mounts: AtomicUsize,
}

impl DeferredFs {
	/// Creates an empty backend whose descriptors start at `fd_base`.
	pub fn new(fd_base: i32) -> Self {
		Self {
			fs: Arc::new(MemFs::new(fd_base)),
			latency: Duration::ZERO,
			mounts: AtomicUsize::new(0),
		}
	}

	/// Delays every callback by `latency`.
	pub fn with_latency(mut self, latency: Duration) -> Self {
		self.latency = latency;
		self
	}

	/// How many times [`AsyncFs::init`] ran.
	pub fn mounts(&self) -> usize {
		self.mounts.load(Ordering::Acquire)
	}

	/// The tree requests are executed against.
	pub fn fs(&self) -> &Arc<MemFs> {
		&self.fs
	}

	fn install(&self, storage: &str, package: &Package) -> SysResult<usize> {
		let root = format!("/{storage}");
		for file in &package.files {
			let target = format!("{root}/{}", file.path);
			let parts: Vec<&str> = file.path.split('/').filter(|part| !part.is_empty()).collect();
			let mut dir = root.clone();
			for part in parts.iter().take(parts.len().saturating_sub(1)) {
				dir = format!("{dir}/{part}");
				match self.fs.execute(FsRequest::Mkdir { path: dir.clone(), mode: 0o777 }) {
					Ok(_) | Err(Errno::EEXIST) => {}
					Err(errno) => return Err(errno),
				}
			}

			let fd = self
				.fs
				.execute(FsRequest::Open {
					path: target,
					flags: OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
					mode: 0o666,
				})?
				.into_fd()?;
			let written = self.fs.execute(FsRequest::Pwrite {
				fd,
				data: file.data.clone(),
				offset: 0,
			});
			self.fs.execute(FsRequest::Close { fd })?;
			written?;
		}
		Ok(package.files.len())
	}

	fn defer<T: Send + 'static>(&self, value: T, done: Callback<T>) {
		let latency = self.latency;
		match tokio::runtime::Handle::try_current() {
			Ok(handle) => {
				handle.spawn(async move {
					if latency.is_zero() {
						tokio::task::yield_now().await;
					} else {
						tokio::time::sleep(latency).await;
					}
					done.call(value);
				});
			}
			Err(_) => {
				tracing::debug!("fs.deferred.no_runtime");
				done.call(value);
			}
		}
	}
}

impl AsyncFs for DeferredFs {
	fn init(&self, storage: &str, done: Callback<SysResult<()>>) {
		let result = self
			.fs
			.execute(FsRequest::Mkdir {
				path: format!("/{storage}"),
				mode: 0o777,
			})
			.map(drop)
			.or_else(|errno| if errno == Errno::EEXIST { Ok(()) } else { Err(errno) });
		if result.is_ok() {
			let mounts = self.mounts.fetch_add(1, Ordering::AcqRel) + 1;
			tracing::info!(storage, mounts, "fs.deferred.mounted");
		}
		self.defer(result, done);
	}

	fn submit(&self, request: FsRequest, done: Callback<SysResult<FsReply>>) {
		let result = self.fs.execute(request);
		self.defer(result, done);
	}

	fn load_package(&self, storage: &str, package: Package, done: Callback<SysResult<usize>>) {
		let result = self.install(storage, &package);
		match &result {
			Ok(files) => tracing::info!(package = %package.name, files, "fs.deferred.package_loaded"),
			Err(errno) => tracing::warn!(package = %package.name, %errno, "fs.deferred.package_failed"),
		}
		self.defer(result, done);
	}
}
