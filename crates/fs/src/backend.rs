//! Backend contracts.
//!
//! [`AsyncFs`] is the asynchronous storage the bridge exists for: each call
//! returns immediately and reports through its [`Callback`] exactly once,
//! later, from whatever context the backend chooses. [`SyncFs`] is the
//! conventional storage every path outside the storage area goes to.

use threadfs_worker::Callback;

use crate::errno::SysResult;
use crate::package::Package;
use crate::request::{FsReply, FsRequest};

/// Callback-driven storage backend.
///
/// Methods are invoked on the bridge worker, inside its tokio runtime.
/// Implementations must call `done` exactly once on every path, errors
/// included; a dropped callback is reported to the caller as `EIO`.
pub trait AsyncFs: Send + Sync + 'static {
	/// One-time setup of the storage area `storage`.
	fn init(&self, storage: &str, done: Callback<SysResult<()>>);

	/// Starts `request`.
	fn submit(&self, request: FsRequest, done: Callback<SysResult<FsReply>>);

	/// Installs every file of `package` below `/<storage>`, creating missing
	/// directories and replacing existing files. Reports the number of files
	/// written.
	fn load_package(&self, storage: &str, package: Package, done: Callback<SysResult<usize>>);
}

/// Blocking storage backend.
pub trait SyncFs: Send + Sync {
	/// Runs `request` to completion.
	fn execute(&self, request: FsRequest) -> SysResult<FsReply>;
}

impl<T: SyncFs + ?Sized> SyncFs for std::sync::Arc<T> {
	fn execute(&self, request: FsRequest) -> SysResult<FsReply> {
		(**self).execute(request)
	}
}
