//! Blocking filesystem calls over an asynchronous storage backend.
//!
//! [`FsProxy`] accepts ordinary blocking calls from any thread. Calls that
//! target the configured storage area are carried to an [`AsyncFs`] backend
//! through a [`threadfs_worker::Bridge`]; all other calls go to a [`SyncFs`]
//! backend directly. [`MemFs`] and [`DeferredFs`] are in-memory
//! implementations of the two backend traits.

pub mod backend;
pub mod config;
pub mod deferred;
pub mod descriptors;
pub mod errno;
pub mod error;
pub mod memfs;
pub mod package;
pub mod path;
pub mod proxy;
pub mod request;
pub mod types;

pub use backend::{AsyncFs, SyncFs};
pub use config::Config;
pub use deferred::DeferredFs;
pub use descriptors::DescriptorTable;
pub use errno::{Errno, SysResult};
pub use error::{ConfigError, ProxyError};
pub use memfs::{MAX_FILE_SIZE, MemFs};
pub use package::{Package, PackageFile};
pub use path::{DEFAULT_MIN_FD, StorageArea};
pub use proxy::{FsProxy, Route};
pub use request::{FsReply, FsRequest, Target};
pub use types::{AccessMode, DirEntry, Fd, FileKind, FileStat, FileTimes, OpenFlags, Whence};
